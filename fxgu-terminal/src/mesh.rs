/// Cube mesh for the demo
use nalgebra::Point3;

/// Indexed triangle mesh; faces wind counter-clockwise seen from outside
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Point3<f32>>,
    pub faces: Vec<[usize; 3]>,
}

impl Mesh {
    /// Axis-aligned cube centred on the origin.
    ///
    /// Corner `i` sits at +half on X, Y and Z when bits 0, 1 and 2 of `i`
    /// are set.
    pub fn cube(size: f32) -> Self {
        let half = size / 2.0;
        let axis = |i: usize, bit: usize| if i & (1 << bit) != 0 { half } else { -half };
        let vertices = (0..8)
            .map(|i| Point3::new(axis(i, 0), axis(i, 1), axis(i, 2)))
            .collect();

        let faces = vec![
            [4, 5, 7], [4, 7, 6], // +Z
            [0, 2, 3], [0, 3, 1], // -Z
            [1, 3, 7], [1, 7, 5], // +X
            [0, 4, 6], [0, 6, 2], // -X
            [2, 6, 7], [2, 7, 3], // +Y
            [0, 1, 5], [0, 5, 4], // -Y
        ];

        Self { vertices, faces }
    }

    pub fn triangle(&self, face: usize) -> [Point3<f32>; 3] {
        self.faces[face].map(|i| self.vertices[i])
    }
}
