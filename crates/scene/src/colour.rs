use serde::{Deserialize, Serialize};

/// A colour with red, green, and blue channels, each kept in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
    r: f64,
    g: f64,
    b: f64,
}

impl Rgb {
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: f64::from(r) / 255.0,
            g: f64::from(g) / 255.0,
            b: f64::from(b) / 255.0,
        }
    }

    /// Builds a colour from raw floats, clamping each channel to `[0, 1]`.
    pub fn from_floats(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: f64::from(r).clamp(0.0, 1.0),
            g: f64::from(g).clamp(0.0, 1.0),
            b: f64::from(b).clamp(0.0, 1.0),
        }
    }

    /// Channel-wise sum, saturating at 1.
    pub fn add(self, other: Rgb) -> Rgb {
        Rgb {
            r: (self.r + other.r).min(1.0),
            g: (self.g + other.g).min(1.0),
            b: (self.b + other.b).min(1.0),
        }
    }

    /// Scales every channel by `s`, clamping back into `[0, 1]`.
    pub fn scale(self, s: f64) -> Rgb {
        Rgb {
            r: (s * self.r).clamp(0.0, 1.0),
            g: (s * self.g).clamp(0.0, 1.0),
            b: (s * self.b).clamp(0.0, 1.0),
        }
    }

    /// Channel-wise product.
    pub fn mul(self, other: Rgb) -> Rgb {
        Rgb {
            r: self.r * other.r,
            g: self.g * other.g,
            b: self.b * other.b,
        }
    }

    pub fn to_u8(self) -> (u8, u8, u8) {
        (
            (255.0 * self.r) as u8,
            (255.0 * self.g) as u8,
            (255.0 * self.b) as u8,
        )
    }

    pub(crate) fn channel_bits(self) -> [u64; 3] {
        [self.r.to_bits(), self.g.to_bits(), self.b.to_bits()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_saturates() {
        let c = Rgb::from_floats(0.8, 0.5, 0.0).add(Rgb::from_floats(0.8, 0.1, 0.25));
        assert_eq!(c.to_u8(), (255, 153, 63));
    }

    #[test]
    fn from_floats_clamps() {
        let c = Rgb::from_floats(-0.5, 2.0, 0.5);
        assert_eq!(c.to_u8(), (0, 255, 127));
    }

    #[test]
    fn scale_clamps() {
        let c = Rgb::from_floats(0.5, 0.5, 0.5).scale(4.0);
        assert_eq!(c.to_u8(), (255, 255, 255));
    }

    #[test]
    fn mul_is_channel_wise() {
        let c = Rgb::from_floats(0.5, 1.0, 0.0).mul(Rgb::from_floats(0.5, 0.25, 1.0));
        let (r, g, b) = c.to_u8();
        assert_eq!((r, g, b), (63, 63, 0));
    }
}
