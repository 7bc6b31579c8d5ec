/// Fixed-point translation, scale and axis rotation builders
///
/// Every builder overwrites the whole output matrix; nothing that was in it
/// before survives.
use nalgebra::Matrix4;

use crate::fixed::{to_fixed, Mtx};
use crate::trig::Trig;

/// Rotation state around three axes, as normalized angles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationState {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

impl RotationState {
    pub fn new(x: u16, y: u16, z: u16) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Rotate by signed deltas; angles wrap at one turn
    pub fn rotate(&mut self, dx: i16, dy: i16, dz: i16) {
        self.x = self.x.wrapping_add_signed(dx);
        self.y = self.y.wrapping_add_signed(dy);
        self.z = self.z.wrapping_add_signed(dz);
    }
}

/// Matrix builders
pub struct Transform;

impl Transform {
    /// ```text
    /// [ 1, 0, 0, 0 ]
    /// [ 0, 1, 0, 0 ]
    /// [ 0, 0, 1, 0 ]
    /// [ x, y, z, 1 ]
    /// ```
    pub fn translate(m: &mut Mtx, x: f32, y: f32, z: f32) {
        *m = Mtx::IDENTITY;
        m.set(3, 0, to_fixed(x));
        m.set(3, 1, to_fixed(y));
        m.set(3, 2, to_fixed(z));
    }

    /// ```text
    /// [ x, 0, 0, 0 ]
    /// [ 0, y, 0, 0 ]
    /// [ 0, 0, z, 0 ]
    /// [ 0, 0, 0, 1 ]
    /// ```
    pub fn scale(m: &mut Mtx, x: f32, y: f32, z: f32) {
        *m = Mtx::ZERO;
        m.set(0, 0, to_fixed(x));
        m.set(1, 1, to_fixed(y));
        m.set(2, 2, to_fixed(z));
        m.int_part[3][3] = 1;
    }

    /// ```text
    /// [ 1, 0, 0, 0 ]
    /// [ 0, c, s, 0 ]
    /// [ 0,-s, c, 0 ]
    /// [ 0, 0, 0, 1 ]
    /// ```
    pub fn rotate_x<T: Trig + ?Sized>(m: &mut Mtx, trig: &T, angle: u16) {
        let (s, c) = sin_cos_fixed(trig, angle);
        *m = Mtx::IDENTITY;
        m.set(1, 1, c);
        m.set(1, 2, s);
        m.set(2, 1, -s);
        m.set(2, 2, c);
    }

    /// ```text
    /// [ c, 0,-s, 0 ]
    /// [ 0, 1, 0, 0 ]
    /// [ s, 0, c, 0 ]
    /// [ 0, 0, 0, 1 ]
    /// ```
    pub fn rotate_y<T: Trig + ?Sized>(m: &mut Mtx, trig: &T, angle: u16) {
        let (s, c) = sin_cos_fixed(trig, angle);
        *m = Mtx::IDENTITY;
        m.set(0, 0, c);
        m.set(0, 2, -s);
        m.set(2, 0, s);
        m.set(2, 2, c);
    }

    /// ```text
    /// [ c, s, 0, 0 ]
    /// [-s, c, 0, 0 ]
    /// [ 0, 0, 1, 0 ]
    /// [ 0, 0, 0, 1 ]
    /// ```
    pub fn rotate_z<T: Trig + ?Sized>(m: &mut Mtx, trig: &T, angle: u16) {
        let (s, c) = sin_cos_fixed(trig, angle);
        *m = Mtx::IDENTITY;
        m.set(0, 0, c);
        m.set(0, 1, s);
        m.set(1, 0, -s);
        m.set(1, 1, c);
    }

    /// Float Y rotation with the same layout as [`Transform::rotate_y`]
    pub fn rotate_y_f<T: Trig + ?Sized>(trig: &T, angle: u16) -> Matrix4<f32> {
        let s = trig.sins(angle);
        let c = trig.coss(angle);
        Matrix4::new(
            c, 0.0, -s, 0.0,
            0.0, 1.0, 0.0, 0.0,
            s, 0.0, c, 0.0,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Model matrix for a rotation state, applied X first, then Y, then Z
    pub fn rotation<T: Trig + ?Sized>(trig: &T, rotation: &RotationState) -> Mtx {
        let mut rx = Mtx::ZERO;
        let mut ry = Mtx::ZERO;
        let mut rz = Mtx::ZERO;
        Self::rotate_x(&mut rx, trig, rotation.x);
        Self::rotate_y(&mut ry, trig, rotation.y);
        Self::rotate_z(&mut rz, trig, rotation.z);
        rx.concat(&ry).concat(&rz)
    }
}

fn sin_cos_fixed<T: Trig + ?Sized>(trig: &T, angle: u16) -> (i32, i32) {
    (to_fixed(trig.sins(angle)), to_fixed(trig.coss(angle)))
}
