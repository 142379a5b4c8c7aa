use glam::DVec3;
use serde::{Deserialize, Serialize};

/// The lowest possible extent of a bounding box in any dimension.
///
/// Degenerate geometry (axis-aligned triangles, single points) still has to
/// index into the R-tree, so every box is floored to this extent.
pub const EPS: f64 = 1e-4;

/// Normal vectors of the six sides of an axis-aligned box.
const BOX_NORMALS: [DVec3; 6] = [
    DVec3::new(1.0, 0.0, 0.0),
    DVec3::new(-1.0, 0.0, 0.0),
    DVec3::new(0.0, 1.0, 0.0),
    DVec3::new(0.0, -1.0, 0.0),
    DVec3::new(0.0, 0.0, 1.0),
    DVec3::new(0.0, 0.0, -1.0),
];

/// A rectangular axis-aligned box in 3D space.
///
/// Invariant: `max - min` is at least [`EPS`] along every axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Builds a box from two corners, flooring each extent to [`EPS`].
    pub fn from_corners(min: DVec3, max: DVec3) -> Self {
        let max = DVec3::new(
            max.x.max(min.x + EPS),
            max.y.max(min.y + EPS),
            max.z.max(min.z + EPS),
        );
        Self { min, max }
    }

    /// Builds the smallest box containing every point, or `None` when the
    /// iterator is empty.
    pub fn from_points<I: IntoIterator<Item = DVec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut min, mut max) = (first, first);
        for p in iter {
            min = min.min(p);
            max = max.max(p);
        }
        Some(Self::from_corners(min, max))
    }

    /// The smallest box containing both `self` and `other`.
    pub fn union(self, other: Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn volume(&self) -> f64 {
        let d = self.max - self.min;
        d.x * d.y * d.z
    }

    pub fn centroid(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, p: DVec3) -> bool {
        self.min.x <= p.x
            && p.x <= self.max.x
            && self.min.y <= p.y
            && p.y <= self.max.y
            && self.min.z <= p.z
            && p.z <= self.max.z
    }

    /// Translates the box by `offset`.
    pub fn translated(self, offset: DVec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Whether the forward half-line of the ray intersects this box.
    ///
    /// Tests the ray against each of the six face planes and accepts the
    /// first plane hit whose intersection point lies within the face's 2D
    /// extent on the other two axes. Boundary points count as hits, which is
    /// what the R-tree search predicate relies on.
    pub fn ray_intersects(&self, origin: DVec3, dir: DVec3) -> bool {
        for normal in BOX_NORMALS {
            let denom = dir.dot(normal);
            if denom == 0.0 {
                continue;
            }

            // The face plane passes through the min corner for the three
            // negative-facing sides and the max corner otherwise.
            let corner = if normal.dot(DVec3::ONE) < 0.0 {
                self.min
            } else {
                self.max
            };

            let t = (corner - origin).dot(normal) / denom;
            if t < 0.0 {
                continue;
            }

            let p = origin + dir * t;
            let inside = if normal.x != 0.0 {
                self.min.y <= p.y && p.y <= self.max.y && self.min.z <= p.z && p.z <= self.max.z
            } else if normal.y != 0.0 {
                self.min.x <= p.x && p.x <= self.max.x && self.min.z <= p.z && p.z <= self.max.z
            } else {
                self.min.x <= p.x && p.x <= self.max.x && self.min.y <= p.y && p.y <= self.max.y
            };
            if inside {
                return true;
            }
        }

        false
    }
}
