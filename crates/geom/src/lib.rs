//! Shared geometry for the master and workers.
//!
//! Vectors are `glam::DVec3` throughout; this crate adds the few operations
//! glam does not carry (Rodrigues rotation, exact zero test), plus triangles
//! with barycentric intersection, axis-aligned boxes with a ray predicate,
//! and a 3D R-tree used to bound intersection cost.

pub mod aabb;
pub mod rtree;
pub mod triangle;
pub mod vector;

pub use aabb::{Aabb, EPS};
pub use rtree::{Bounded, RTree};
pub use triangle::{Triangle, TriangleHit};
pub use vector::VectorExt;

/// The fixed world up vector.
pub const GLOBAL_UP: glam::DVec3 = glam::DVec3::new(0.0, 1.0, 0.0);
