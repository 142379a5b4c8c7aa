use crate::mesh::{Mesh, MeshHit};
use geom::{Aabb, Bounded};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stable identifier of an object instance within a scene.
///
/// Only the id and position travel on the wire; the receiving side
/// reassociates the mesh through its id→path and path→mesh maps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ObjectId(pub u64);

/// A rigid instance of a [`Mesh`] at a world position.
#[derive(Clone)]
pub struct Object {
    pub id: ObjectId,
    pub pos: DVec3,
    mesh: Arc<Mesh>,
}

impl Object {
    pub fn new(id: ObjectId, pos: DVec3, mesh: Arc<Mesh>) -> Self {
        Self { id, pos, mesh }
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    /// Intersects a world-space ray with this instance by translating the
    /// ray into model space and the hit point back out. Normals and
    /// materials are translation-invariant.
    pub fn intersect(&self, origin: DVec3, dir: DVec3) -> Option<MeshHit> {
        self.mesh.intersect(origin - self.pos, dir).map(|mut hit| {
            hit.point += self.pos;
            hit
        })
    }
}

impl Bounded for Object {
    fn bounds(&self) -> Aabb {
        self.mesh.bounds().translated(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_mesh() -> Arc<Mesh> {
        Arc::new(
            Mesh::from_obj_source("v 0 0 5\nv 1 0 5\nv 0 1 5\nf 1 2 3\n", None).unwrap(),
        )
    }

    #[test]
    fn intersection_translates_with_the_object() {
        let obj = Object::new(ObjectId(0), DVec3::new(10.0, 0.0, 0.0), triangle_mesh());
        let hit = obj
            .intersect(DVec3::new(10.2, 0.2, 0.0), DVec3::new(0.0, 0.0, 1.0))
            .unwrap();
        assert!((hit.point - DVec3::new(10.2, 0.2, 5.0)).length() < 1e-12);

        // The untranslated ray misses.
        assert!(obj
            .intersect(DVec3::new(0.2, 0.2, 0.0), DVec3::new(0.0, 0.0, 1.0))
            .is_none());
    }

    #[test]
    fn bounds_follow_the_position() {
        let obj = Object::new(ObjectId(1), DVec3::new(-3.0, 2.0, 1.0), triangle_mesh());
        let b = obj.bounds();
        assert!(b.contains(DVec3::new(-3.0, 2.0, 6.0)));
        assert!(!b.contains(DVec3::new(0.5, 0.5, 5.0)));
    }
}
