/// Table-based sine and cosine over normalized `u16` angles
use once_cell::sync::Lazy;

/// Samples per full turn
pub const TABLE_STEPS: usize = 4096;

const QUARTER: usize = TABLE_STEPS / 4;

/// Sine/cosine source for the matrix builders.
///
/// Angles are normalized: 0x10000 is one full turn, so 0x4000 is 90°.
pub trait Trig {
    fn sins(&self, angle: u16) -> f32;
    fn coss(&self, angle: u16) -> f32;
}

/// Lookup table with 4096 steps per turn.
///
/// The low four bits of an angle are dropped. Cosine reads the same table a
/// quarter turn ahead, so it carries an extra quarter of samples.
pub struct SineTable {
    values: Box<[f32]>,
}

static SHARED: Lazy<SineTable> = Lazy::new(SineTable::new);

impl SineTable {
    pub fn new() -> Self {
        // One quarter wave, mirrored so 0°, 90°, 180° and 270° come out exact.
        let quarter: Vec<f32> = (0..=QUARTER)
            .map(|i| (i as f64 * std::f64::consts::TAU / TABLE_STEPS as f64).sin() as f32)
            .collect();

        let values = (0..TABLE_STEPS + QUARTER)
            .map(|i| {
                let k = i % QUARTER;
                match (i / QUARTER) % 4 {
                    0 => quarter[k],
                    1 => quarter[QUARTER - k],
                    2 => -quarter[k],
                    _ => -quarter[QUARTER - k],
                }
            })
            .collect();

        Self { values }
    }

    /// Process-wide table, built on first use
    pub fn shared() -> &'static SineTable {
        &SHARED
    }
}

impl Default for SineTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Trig for SineTable {
    #[inline]
    fn sins(&self, angle: u16) -> f32 {
        self.values[(angle >> 4) as usize]
    }

    #[inline]
    fn coss(&self, angle: u16) -> f32 {
        self.values[(angle >> 4) as usize + QUARTER]
    }
}

/// Sine of a normalized angle from the shared table
pub fn sins(angle: u16) -> f32 {
    SineTable::shared().sins(angle)
}

/// Cosine of a normalized angle from the shared table
pub fn coss(angle: u16) -> f32 {
    SineTable::shared().coss(angle)
}

/// Degrees to a normalized angle, wrapping at one turn
pub fn degrees_to_angle(degrees: f32) -> u16 {
    (degrees / 360.0 * 65536.0).rem_euclid(65536.0) as u32 as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinal_angles_are_exact() {
        assert_eq!(sins(0), 0.0);
        assert_eq!(coss(0), 1.0);
        assert_eq!(sins(0x4000), 1.0);
        assert_eq!(coss(0x4000), 0.0);
        assert_eq!(sins(0x8000), 0.0);
        assert_eq!(coss(0x8000), -1.0);
        assert_eq!(sins(0xC000), -1.0);
        assert_eq!(coss(0xC000), 0.0);
    }

    #[test]
    fn test_low_bits_are_ignored() {
        assert_eq!(sins(0x1230), sins(0x123F));
        assert_eq!(coss(0xFFF0), coss(0xFFFF));
    }

    #[test]
    fn test_matches_float_sine() {
        for angle in (0..=u16::MAX).step_by(97) {
            let radians = (angle & !0xF) as f32 / 65536.0 * std::f32::consts::TAU;
            assert!((sins(angle) - radians.sin()).abs() < 1e-5);
            assert!((coss(angle) - radians.cos()).abs() < 1e-5);
        }
    }

    #[test]
    fn test_degrees_to_angle() {
        assert_eq!(degrees_to_angle(0.0), 0);
        assert_eq!(degrees_to_angle(90.0), 0x4000);
        assert_eq!(degrees_to_angle(-90.0), 0xC000);
        assert_eq!(degrees_to_angle(360.0), 0);
    }
}
