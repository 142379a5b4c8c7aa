use glam::DVec3;

/// A triangle in 3D space, optionally with per-vertex normals.
///
/// Vertices are ordered so `(p2 - p1) x (p3 - p1)` points out of the face.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub p1: DVec3,
    pub p2: DVec3,
    pub p3: DVec3,
    pub normals: Option<[DVec3; 3]>,
}

/// A ray/triangle intersection.
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    pub point: DVec3,
    /// Barycentric weights of `p1`, `p2`, `p3` at the hit point.
    pub bary: [f64; 3],
    /// Ray parameter of the hit (`point = origin + t * dir`).
    pub t: f64,
}

impl Triangle {
    pub fn new(p1: DVec3, p2: DVec3, p3: DVec3) -> Self {
        Self {
            p1,
            p2,
            p3,
            normals: None,
        }
    }

    pub fn with_normals(p1: DVec3, p2: DVec3, p3: DVec3, normals: [DVec3; 3]) -> Self {
        Self {
            p1,
            p2,
            p3,
            normals: Some(normals),
        }
    }

    /// Möller–Trumbore intersection against the forward half-line of a ray.
    ///
    /// Solves `origin + t*dir = r1*p1 + r2*p2 + r3*p3` by Cramer's rule and
    /// rejects the hit unless every barycentric weight and `t` are
    /// non-negative. Degenerate configurations (parallel ray, zero-area
    /// triangle) report a miss.
    pub fn intersect(&self, origin: DVec3, dir: DVec3) -> Option<TriangleHit> {
        let e1 = self.p2 - self.p1;
        let e2 = self.p3 - self.p1;
        let neg_dir = -dir;

        let inc = e1.dot(e2.cross(neg_dir));
        if inc == 0.0 {
            return None;
        }

        let p = origin - self.p1;

        let r2 = p.dot(e2.cross(neg_dir)) / inc;
        if !(0.0..=1.0).contains(&r2) {
            return None;
        }

        let r3 = e1.dot(p.cross(neg_dir)) / inc;
        let sum = r2 + r3;
        if !(0.0..=1.0).contains(&sum) {
            return None;
        }

        let r1 = 1.0 - r2 - r3;
        if r1 < 0.0 || r3 < 0.0 {
            return None;
        }

        let t = e1.dot(e2.cross(p)) / inc;
        if t < 0.0 {
            return None;
        }

        Some(TriangleHit {
            point: origin + dir * t,
            bary: [r1, r2, r3],
            t,
        })
    }

    /// The face normal `(p2 - p1) x (p3 - p1)`, normalized and oriented to
    /// face the side the ray came from.
    pub fn geometric_normal(&self, dir: DVec3) -> DVec3 {
        let n = (self.p2 - self.p1).cross(self.p3 - self.p1).normalize();
        if n.dot(dir) > 0.0 {
            -n
        } else {
            n
        }
    }

    /// The shading normal at a hit: barycentric interpolation of the vertex
    /// normals when present, the ray-facing geometric normal otherwise.
    pub fn normal_at(&self, bary: [f64; 3], dir: DVec3) -> DVec3 {
        match self.normals {
            Some([n1, n2, n3]) => (n1 * bary[0] + n2 * bary[1] + n3 * bary[2]).normalize(),
            None => self.geometric_normal(dir),
        }
    }
}
