use glam::DVec3;

/// Vector operations the tracer needs beyond what glam provides.
pub trait VectorExt {
    /// Rotates this vector `theta` radians around the (normalized) `axis`
    /// using Rodrigues' rotation formula.
    fn rotate_around(self, axis: DVec3, theta: f64) -> DVec3;

    /// Whether every component is exactly zero.
    fn is_exactly_zero(self) -> bool;
}

impl VectorExt for DVec3 {
    fn rotate_around(self, axis: DVec3, theta: f64) -> DVec3 {
        let (sin, cos) = theta.sin_cos();
        self * cos + axis.cross(self) * sin + axis * (axis.dot(self) * (1.0 - cos))
    }

    fn is_exactly_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}
