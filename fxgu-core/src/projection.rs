/// Fixed-point projection builders and the camera that drives them
use nalgebra::{Point3, Vector4};

use crate::fixed::{Mtx, FIXED_ONE};
use crate::transform::Transform;
use crate::trig::{degrees_to_angle, Trig};

/// Normalization factor returned when `near + far` leaves no headroom
pub const PERSP_NORM_MAX: u16 = 0xFFFF;

/// Build a perspective projection and its depth normalization factor.
///
/// `fovy` is the vertical field of view as a normalized angle. `scale`
/// multiplies every term, including the `-1` that moves depth into `w`.
/// Degenerate inputs are not checked: `aspect == 0` or `near == far`
/// produce whatever the float arithmetic produces.
pub fn perspective<T: Trig + ?Sized>(
    m: &mut Mtx,
    trig: &T,
    fovy: u16,
    aspect: f32,
    near: f32,
    far: f32,
    scale: f32,
) -> u16 {
    let scale = scale * FIXED_ONE;
    let half = fovy / 2;
    let cot = trig.coss(half) / trig.sins(half);

    *m = Mtx::ZERO;
    m.set(0, 0, (cot / aspect * scale) as i32);
    m.set(1, 1, (cot * scale) as i32);
    m.set(2, 2, ((near + far) / (near - far) * scale) as i32);
    m.set(2, 3, (-scale) as i32);
    m.set(3, 2, ((2.0 * near * far) / (near - far) * scale) as i32);

    perspective_norm(near, far)
}

/// Depth normalization factor for a `near`/`far` pair.
///
/// Saturates at [`PERSP_NORM_MAX`] when `near + far <= 2`, never returns 0.
pub fn perspective_norm(near: f32, far: f32) -> u16 {
    if near + far <= 2.0 {
        log::trace!("perspective norm saturated for near={near} far={far}");
        return PERSP_NORM_MAX;
    }
    let norm = ((2.0 * FIXED_ONE) / (near + far)) as u16;
    norm.max(1)
}

/// Build an orthographic projection.
///
/// Cell `[3][3]` is the scale argument itself rather than a derived 1.
#[allow(clippy::too_many_arguments)]
pub fn ortho(
    m: &mut Mtx,
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
    scale: f32,
) {
    let scale = scale * FIXED_ONE;

    *m = Mtx::ZERO;
    m.set(0, 0, (2.0 / (right - left) * scale) as i32);
    m.set(1, 1, (2.0 / (top - bottom) * scale) as i32);
    m.set(2, 2, (-2.0 / (far - near) * scale) as i32);
    m.set(3, 0, (-(right + left) / (right - left) * scale) as i32);
    m.set(3, 1, (-(top + bottom) / (top - bottom) * scale) as i32);
    m.set(3, 2, (-(far + near) / (far - near) * scale) as i32);
    m.set(3, 3, scale as i32);
}

/// Projection mode for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    Orthographic,
    Perspective,
}

/// Camera looking down -Z from `distance` units in front of the origin
#[derive(Debug, Clone)]
pub struct Camera {
    pub distance: f32,
    pub fovy: u16,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub scale: f32,
    pub mode: ProjectionMode,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            distance: 5.0,
            fovy: degrees_to_angle(45.0),
            aspect: width as f32 / height as f32,
            near: 0.1,
            far: 100.0,
            scale: 1.0,
            mode: ProjectionMode::Perspective,
        }
    }

    /// Fill the view matrix
    pub fn view_matrix(&self, m: &mut Mtx) {
        Transform::translate(m, 0.0, 0.0, -self.distance);
    }

    /// Fill the projection matrix; perspective also yields its depth
    /// normalization factor
    pub fn projection_matrix<T: Trig + ?Sized>(&self, trig: &T, m: &mut Mtx) -> Option<u16> {
        match self.mode {
            ProjectionMode::Perspective => Some(perspective(
                m, trig, self.fovy, self.aspect, self.near, self.far, self.scale,
            )),
            ProjectionMode::Orthographic => {
                // Frame the volume the perspective view shows at the target
                let half_height =
                    self.distance * trig.sins(self.fovy / 2) / trig.coss(self.fovy / 2);
                let half_width = half_height * self.aspect;
                ortho(
                    m,
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.near,
                    self.far,
                    self.scale,
                );
                None
            }
        }
    }

    /// Combined view-projection matrix and the optional normalization factor
    pub fn view_projection<T: Trig + ?Sized>(&self, trig: &T) -> (Mtx, Option<u16>) {
        let mut view = Mtx::ZERO;
        let mut projection = Mtx::ZERO;
        self.view_matrix(&mut view);
        let norm = self.projection_matrix(trig, &mut projection);
        (view.concat(&projection), norm)
    }

    /// Project a point through `model · view · projection` to screen space.
    ///
    /// Returns `None` for points behind the eye or outside the view volume.
    pub fn project_to_screen(
        &self,
        point: &Point3<f32>,
        mvp: &Mtx,
        width: u32,
        height: u32,
    ) -> Option<(f32, f32, f32)> {
        let clip = mvp.transform(&Vector4::new(point.x, point.y, point.z, 1.0));

        if clip.w.abs() < 1e-6 {
            return None;
        }

        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let depth = clip.z / clip.w;

        if !(-1.0..=1.0).contains(&ndc_x) || !(-1.0..=1.0).contains(&ndc_y) {
            return None;
        }
        if !(-1.0..=1.0).contains(&depth) {
            return None;
        }

        let screen_x = (ndc_x + 1.0) * 0.5 * width as f32;
        let screen_y = (1.0 - ndc_y) * 0.5 * height as f32;

        Some((screen_x, screen_y, depth))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}
