use crate::camera::Camera;
use crate::error::SceneError;
use crate::light::Light;
use crate::mesh::Mesh;
use crate::object::{Object, ObjectId};
use geom::RTree;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// The immutable half of the environment: mesh geometry keyed by source
/// path, and the id→path map that lets detached objects find their mesh.
///
/// Encoded exactly once per worker, at registration; read-only afterwards.
#[derive(Serialize, Deserialize)]
pub struct SceneMeshes {
    meshes: HashMap<PathBuf, Arc<Mesh>>,
    paths: HashMap<ObjectId, PathBuf>,
}

impl SceneMeshes {
    pub fn new(meshes: HashMap<PathBuf, Arc<Mesh>>, paths: HashMap<ObjectId, PathBuf>) -> Self {
        Self { meshes, paths }
    }

    pub fn mesh_for(&self, id: ObjectId) -> Option<&Arc<Mesh>> {
        self.paths.get(&id).and_then(|path| self.meshes.get(path))
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn encode(&self) -> Result<Vec<u8>, SceneError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SceneError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// The mutable half of the environment: object instances, lights, and the
/// camera. Owned exclusively by the master between frames and shipped to
/// workers as the per-frame diff.
pub struct SceneState {
    pub objs: RTree<Object>,
    pub lights: Vec<Light>,
    pub cam: Camera,
}

/// The wire form of [`SceneState`]: objects travel as `(id, pos)` only.
#[derive(Serialize, Deserialize)]
struct SceneStateWire {
    objects: Vec<(ObjectId, DVec3)>,
    lights: Vec<Light>,
    cam: Camera,
}

impl SceneState {
    pub fn encode(&self) -> Result<Vec<u8>, SceneError> {
        let wire = SceneStateWire {
            objects: self.objs.items().iter().map(|o| (o.id, o.pos)).collect(),
            lights: self.lights.clone(),
            cam: self.cam.clone(),
        };
        Ok(bincode::serialize(&wire)?)
    }

    /// Decodes a diff into a detached state awaiting [`DetachedState::link`].
    pub fn decode(bytes: &[u8]) -> Result<DetachedState, SceneError> {
        let wire: SceneStateWire = bincode::deserialize(bytes)?;
        Ok(DetachedState {
            objects: wire.objects,
            lights: wire.lights,
            cam: wire.cam,
        })
    }
}

/// A decoded diff whose objects have not been reassociated with meshes yet.
pub struct DetachedState {
    objects: Vec<(ObjectId, DVec3)>,
    lights: Vec<Light>,
    cam: Camera,
}

impl DetachedState {
    /// Reassociates every object with its mesh through the immutable
    /// environment and rebuilds the object R-tree, whose entry bounds
    /// depend on the linked meshes.
    pub fn link(self, meshes: &SceneMeshes) -> Result<SceneState, SceneError> {
        let mut objects = Vec::with_capacity(self.objects.len());
        for (id, pos) in self.objects {
            let mesh = meshes
                .mesh_for(id)
                .ok_or_else(|| SceneError::Decode(format!("unknown object id {}", id.0)))?;
            objects.push(Object::new(id, pos, Arc::clone(mesh)));
        }

        Ok(SceneState {
            objs: RTree::bulk_load(objects),
            lights: self.lights,
            cam: self.cam,
        })
    }
}

/// A complete scene: the static mesh half plus the per-frame half.
pub struct Environment {
    pub meshes: SceneMeshes,
    pub state: SceneState,
}
