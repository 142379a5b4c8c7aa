use crate::colour::Rgb;
use serde::{Deserialize, Serialize};

/// Surface properties shared by one or more mesh faces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Ambient intensity.
    pub ka: Rgb,
    /// Diffuse intensity.
    pub kd: Rgb,
    /// Specular intensity.
    pub ks: Rgb,
    /// Specular exponent.
    pub ns: f64,
}

impl Material {
    /// The material assigned to groups without a matching MTL entry.
    pub fn fallback() -> Self {
        Self {
            ka: Rgb::from_u8(0x10, 0x10, 0x10),
            kd: Rgb::from_u8(0xFF, 0xFF, 0xFF),
            ks: Rgb::from_u8(0x00, 0x00, 0x00),
            ns: 0.0,
        }
    }

    /// Exact-value dedup key (bit patterns, so -0.0 and 0.0 stay distinct
    /// the same way two loads of the same file produce identical keys).
    pub(crate) fn key(&self) -> MaterialKey {
        MaterialKey {
            ka: self.ka.channel_bits(),
            kd: self.kd.channel_bits(),
            ks: self.ks.channel_bits(),
            ns: self.ns.to_bits(),
        }
    }
}

#[derive(PartialEq, Eq, Hash)]
pub(crate) struct MaterialKey {
    ka: [u64; 3],
    kd: [u64; 3],
    ks: [u64; 3],
    ns: u64,
}
