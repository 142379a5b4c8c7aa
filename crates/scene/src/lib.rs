//! Scene state shared by the master and workers.
//!
//! The environment is split in two: [`SceneMeshes`] holds the large, static
//! mesh geometry and is shipped to a worker exactly once at registration;
//! [`SceneState`] holds the object instances, lights, and camera, and is
//! re-encoded every frame as the diff. Workers relink a decoded diff to
//! their resident meshes before tracing.

pub mod camera;
pub mod colour;
pub mod environment;
pub mod error;
pub mod io;
pub mod light;
pub mod loader;
pub mod material;
pub mod mesh;
pub mod object;

pub use camera::{Camera, MoveDirs};
pub use colour::Rgb;
pub use environment::{DetachedState, Environment, SceneMeshes, SceneState};
pub use error::SceneError;
pub use light::Light;
pub use loader::environment_from_file;
pub use material::Material;
pub use mesh::{Mesh, MeshHit};
pub use object::{Object, ObjectId};
