/// 16.16 fixed-point matrices in the console's split integer/fraction layout
use nalgebra::{Matrix4, Vector4};

/// One unit in 16.16 fixed point
pub const FIXED_ONE: f32 = 65536.0;

/// Size of a matrix in its binary interchange form
pub const MTX_BYTES: usize = 64;

/// Convert a float to 16.16 fixed point, truncating toward zero.
///
/// Out-of-range inputs saturate at the `i32` bounds; the later 16-bit split
/// then keeps only the low half of the integer part.
#[inline]
pub fn to_fixed(value: f32) -> i32 {
    (value * FIXED_ONE) as i32
}

/// A 4×4 transform stored as two parallel 16-bit grids.
///
/// Cell `(r, c)` holds the value `int_part[r][c] << 16 | frac_part[r][c]`.
/// Rows are applied to row vectors, so translation lives in row 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mtx {
    pub int_part: [[i16; 4]; 4],
    pub frac_part: [[u16; 4]; 4],
}

impl Mtx {
    pub const ZERO: Mtx = Mtx {
        int_part: [[0; 4]; 4],
        frac_part: [[0; 4]; 4],
    };

    pub const IDENTITY: Mtx = Mtx {
        int_part: [[1, 0, 0, 0], [0, 1, 0, 0], [0, 0, 1, 0], [0, 0, 0, 1]],
        frac_part: [[0; 4]; 4],
    };

    /// Raw 16.16 value of a cell
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> i32 {
        ((self.int_part[row][col] as i32) << 16) | self.frac_part[row][col] as i32
    }

    /// Store a raw 16.16 value, splitting it across both grids
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: i32) {
        self.int_part[row][col] = (value >> 16) as i16;
        self.frac_part[row][col] = value as u16;
    }

    /// Cell value as a float
    #[inline]
    pub fn get_f32(&self, row: usize, col: usize) -> f32 {
        self.get(row, col) as f32 / FIXED_ONE
    }

    /// Float copy of the matrix, indexed `(row, col)` like the grids
    pub fn to_matrix4(&self) -> Matrix4<f32> {
        Matrix4::from_fn(|r, c| self.get_f32(r, c))
    }

    /// Convert a float matrix, truncating every cell toward zero
    pub fn from_matrix4(mf: &Matrix4<f32>) -> Self {
        let mut m = Self::ZERO;
        for r in 0..4 {
            for c in 0..4 {
                m.set(r, c, to_fixed(mf[(r, c)]));
            }
        }
        m
    }

    /// Product `self · other`, computed in floating point
    pub fn concat(&self, other: &Mtx) -> Mtx {
        Self::from_matrix4(&(self.to_matrix4() * other.to_matrix4()))
    }

    /// Apply the matrix to a row vector: `p · M`
    pub fn transform(&self, point: &Vector4<f32>) -> Vector4<f32> {
        self.to_matrix4().transpose() * point
    }

    /// Big-endian binary layout: 16 integer halfwords, then 16 fraction
    /// halfwords, both row-major.
    pub fn to_be_bytes(&self) -> [u8; MTX_BYTES] {
        let mut out = [0u8; MTX_BYTES];
        for r in 0..4 {
            for c in 0..4 {
                let i = (r * 4 + c) * 2;
                out[i..i + 2].copy_from_slice(&self.int_part[r][c].to_be_bytes());
                out[32 + i..32 + i + 2].copy_from_slice(&self.frac_part[r][c].to_be_bytes());
            }
        }
        out
    }

    pub fn from_be_bytes(bytes: &[u8; MTX_BYTES]) -> Self {
        let mut m = Self::ZERO;
        for r in 0..4 {
            for c in 0..4 {
                let i = (r * 4 + c) * 2;
                m.int_part[r][c] = i16::from_be_bytes([bytes[i], bytes[i + 1]]);
                m.frac_part[r][c] = u16::from_be_bytes([bytes[32 + i], bytes[32 + i + 1]]);
            }
        }
        m
    }
}

impl Default for Mtx {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_round_trips_negative_values() {
        let mut m = Mtx::ZERO;
        m.set(1, 2, to_fixed(-2.25));
        assert_eq!(m.int_part[1][2], -3);
        assert_eq!(m.frac_part[1][2], 0xC000);
        assert_eq!(m.get(1, 2), -147456);
        assert_eq!(m.get_f32(1, 2), -2.25);
    }

    #[test]
    fn test_to_fixed_truncates_toward_zero() {
        assert_eq!(to_fixed(1.0 / 65536.0 * 1.5), 1);
        assert_eq!(to_fixed(-1.0 / 65536.0 * 1.5), -1);
        assert_eq!(to_fixed(1e12), i32::MAX);
    }

    #[test]
    fn test_identity_binary_layout() {
        // Same words as the console library's identity constant
        let words: [u32; 16] = [
            0x0001_0000, 0x0000_0000, 0x0000_0001, 0x0000_0000,
            0x0000_0000, 0x0001_0000, 0x0000_0000, 0x0000_0001,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ];
        let mut expected = [0u8; MTX_BYTES];
        for (i, w) in words.iter().enumerate() {
            expected[i * 4..i * 4 + 4].copy_from_slice(&w.to_be_bytes());
        }
        assert_eq!(Mtx::IDENTITY.to_be_bytes(), expected);
        assert_eq!(Mtx::from_be_bytes(&expected), Mtx::IDENTITY);
    }

    #[test]
    fn test_float_conversion() {
        let mf = Matrix4::new(
            1.5, 0.0, 0.0, 0.0,
            0.0, -0.25, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            3.0, 4.0, 5.0, 1.0,
        );
        let m = Mtx::from_matrix4(&mf);
        assert_eq!(m.int_part[3], [3, 4, 5, 1]);
        assert_eq!(m.frac_part[0][0], 0x8000);
        assert_eq!(m.to_matrix4(), mf);
    }

    #[test]
    fn test_concat_with_identity() {
        let mut m = Mtx::IDENTITY;
        m.set(3, 0, to_fixed(7.5));
        assert_eq!(m.concat(&Mtx::IDENTITY), m);
        assert_eq!(Mtx::IDENTITY.concat(&m), m);
    }

    #[test]
    fn test_transform_uses_row_vectors() {
        let mut m = Mtx::IDENTITY;
        m.set(3, 1, to_fixed(2.0));
        let p = m.transform(&Vector4::new(1.0, 1.0, 1.0, 1.0));
        assert_eq!(p, Vector4::new(1.0, 3.0, 1.0, 1.0));
    }
}
