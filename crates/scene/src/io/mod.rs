//! Parsers for the on-disk formats the loader consumes.

pub mod mtl;
pub mod obj;

pub use mtl::{parse_mtl, MtlError, MtlLibrary};
pub use obj::{parse_obj, FaceVertex, ObjDocument, ObjError, ObjGroup};
