use crate::camera::Camera;
use crate::colour::Rgb;
use crate::environment::{Environment, SceneMeshes, SceneState};
use crate::error::SceneError;
use crate::light::Light;
use crate::mesh::Mesh;
use crate::object::{Object, ObjectId};
use geom::RTree;
use glam::DVec3;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Deserialize)]
struct StoredVec {
    x: f64,
    y: f64,
    z: f64,
}

impl From<StoredVec> for DVec3 {
    fn from(v: StoredVec) -> Self {
        DVec3::new(v.x, v.y, v.z)
    }
}

#[derive(Deserialize)]
struct StoredColour {
    r: u8,
    g: u8,
    b: u8,
}

#[derive(Deserialize)]
struct StoredObject {
    model: String,
    pos: StoredVec,
}

#[derive(Deserialize)]
struct StoredLight {
    pos: StoredVec,
    col: StoredColour,
}

#[derive(Deserialize)]
struct StoredCamera {
    pos: StoredVec,
    dir: StoredVec,
    fov: f64,
}

#[derive(Deserialize)]
struct StoredScene {
    objs: Vec<StoredObject>,
    lights: Vec<StoredLight>,
    cam: StoredCamera,
}

/// Loads a complete environment from a JSON scene file.
///
/// Model paths resolve relative to the scene file first, then as given.
/// Meshes are content-addressed by resolved path: however many objects
/// reference a model, it is loaded once and shared.
pub fn environment_from_file(path: &Path) -> Result<Environment, SceneError> {
    let text = std::fs::read_to_string(path).map_err(|e| SceneError::io(path, e))?;
    let stored: StoredScene = serde_json::from_str(&text)?;

    let scene_dir = path.parent().unwrap_or_else(|| Path::new(""));

    let mut meshes: HashMap<PathBuf, Arc<Mesh>> = HashMap::new();
    let mut paths: HashMap<ObjectId, PathBuf> = HashMap::new();
    let mut objects = Vec::with_capacity(stored.objs.len());

    for (index, obj) in stored.objs.into_iter().enumerate() {
        let relative = scene_dir.join(&obj.model);
        let resolved = if relative.exists() {
            relative
        } else {
            PathBuf::from(&obj.model)
        };

        let mesh = match meshes.get(&resolved) {
            Some(mesh) => Arc::clone(mesh),
            None => {
                let mesh = Arc::new(Mesh::from_obj_path(&resolved)?);
                info!(
                    model = %resolved.display(),
                    faces = mesh.face_count(),
                    "loaded mesh"
                );
                meshes.insert(resolved.clone(), Arc::clone(&mesh));
                mesh
            }
        };

        let id = ObjectId(index as u64);
        paths.insert(id, resolved);
        objects.push(Object::new(id, obj.pos.into(), mesh));
    }

    let lights = stored
        .lights
        .into_iter()
        .map(|l| Light {
            pos: l.pos.into(),
            col: Rgb::from_u8(l.col.r, l.col.g, l.col.b),
        })
        .collect();

    let cam = Camera::new(stored.cam.pos.into(), stored.cam.dir.into(), stored.cam.fov)?;

    Ok(Environment {
        meshes: SceneMeshes::new(meshes, paths),
        state: SceneState {
            objs: RTree::bulk_load(objects),
            lights,
            cam,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scene-loader-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_a_scene_with_shared_meshes() {
        let dir = scratch_dir("shared");
        std::fs::write(dir.join("tri.obj"), "v 0 0 5\nv 1 0 5\nv 0 1 5\nf 1 2 3\n").unwrap();
        std::fs::write(
            dir.join("scene.json"),
            r#"{
                "objs": [
                    {"model": "tri.obj", "pos": {"x": 0, "y": 0, "z": 0}},
                    {"model": "tri.obj", "pos": {"x": 4, "y": 0, "z": 0}}
                ],
                "lights": [{"pos": {"x": 0, "y": 3, "z": 10}, "col": {"r": 176, "g": 176, "b": 176}}],
                "cam": {"pos": {"x": 1, "y": 1, "z": 5}, "dir": {"x": 0, "y": 0, "z": -1}, "fov": 1.047}
            }"#,
        )
        .unwrap();

        let env = environment_from_file(&dir.join("scene.json")).unwrap();
        assert_eq!(env.meshes.mesh_count(), 1);
        assert_eq!(env.state.objs.len(), 2);
        assert_eq!(env.state.lights.len(), 1);

        // Both instances resolve to the same shared mesh.
        let a = env.meshes.mesh_for(ObjectId(0)).unwrap();
        let b = env.meshes.mesh_for(ObjectId(1)).unwrap();
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn missing_model_is_an_io_error() {
        let dir = scratch_dir("missing");
        std::fs::write(
            dir.join("scene.json"),
            r#"{
                "objs": [{"model": "nope.obj", "pos": {"x": 0, "y": 0, "z": 0}}],
                "lights": [],
                "cam": {"pos": {"x": 0, "y": 0, "z": 0}, "dir": {"x": 0, "y": 0, "z": 1}, "fov": 1.0}
            }"#,
        )
        .unwrap();

        assert!(matches!(
            environment_from_file(&dir.join("scene.json")),
            Err(SceneError::Io { .. })
        ));
    }

    #[test]
    fn vertical_camera_is_a_geometry_error() {
        let dir = scratch_dir("vertical");
        std::fs::write(dir.join("tri.obj"), "v 0 0 5\nv 1 0 5\nv 0 1 5\nf 1 2 3\n").unwrap();
        std::fs::write(
            dir.join("scene.json"),
            r#"{
                "objs": [{"model": "tri.obj", "pos": {"x": 0, "y": 0, "z": 0}}],
                "lights": [],
                "cam": {"pos": {"x": 0, "y": 0, "z": 0}, "dir": {"x": 0, "y": 1, "z": 0}, "fov": 1.0}
            }"#,
        )
        .unwrap();

        assert!(matches!(
            environment_from_file(&dir.join("scene.json")),
            Err(SceneError::ParallelUp)
        ));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let dir = scratch_dir("malformed");
        std::fs::write(dir.join("scene.json"), "{not json").unwrap();
        assert!(matches!(
            environment_from_file(&dir.join("scene.json")),
            Err(SceneError::Json(_))
        ));
    }
}
