use crate::colour::Rgb;
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// A point light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub pos: DVec3,
    pub col: Rgb,
}
