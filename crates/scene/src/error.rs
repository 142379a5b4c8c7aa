use crate::io::{MtlError, ObjError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or decoding scene state.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed OBJ data: {0}")]
    Obj(#[from] ObjError),

    #[error("malformed MTL data: {0}")]
    Mtl(#[from] MtlError),

    #[error("malformed scene file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("camera direction is parallel to the global up vector")]
    ParallelUp,

    #[error("decode error: {0}")]
    Decode(String),
}

impl SceneError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<bincode::Error> for SceneError {
    fn from(err: bincode::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
