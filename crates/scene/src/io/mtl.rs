use crate::colour::Rgb;
use crate::material::Material;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MtlError {
    #[error("line {line}: malformed `{directive}` directive")]
    Malformed { line: usize, directive: String },

    #[error("line {line}: `{directive}` before any newmtl")]
    NoCurrentMaterial { line: usize, directive: String },
}

/// A parsed MTL material library.
#[derive(Debug, Default)]
pub struct MtlLibrary {
    materials: HashMap<String, Material>,
}

impl MtlLibrary {
    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

/// Parses the MTL subset backing [`Material`]: `newmtl`, `Ka`, `Kd`, `Ks`,
/// `Ns`. Illumination models, transparency, and texture maps are skipped.
/// Channels missing from the file keep the fallback material's values.
pub fn parse_mtl(src: &str) -> Result<MtlLibrary, MtlError> {
    let mut lib = MtlLibrary::default();
    let mut current: Option<String> = None;

    for (idx, raw) in src.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let mut fields = text.split_whitespace();
        let directive = fields.next().unwrap_or_default();
        match directive {
            "newmtl" => {
                let name = fields.next().ok_or_else(|| MtlError::Malformed {
                    line,
                    directive: "newmtl".into(),
                })?;
                lib.materials
                    .insert(name.to_string(), Material::fallback());
                current = Some(name.to_string());
            }
            "Ka" | "Kd" | "Ks" => {
                let colour = parse_rgb(fields, line, directive)?;
                let mat = current_material(&mut lib, &current, line, directive)?;
                match directive {
                    "Ka" => mat.ka = colour,
                    "Kd" => mat.kd = colour,
                    _ => mat.ks = colour,
                }
            }
            "Ns" => {
                let ns: f64 = fields
                    .next()
                    .and_then(|f| f.parse().ok())
                    .ok_or_else(|| MtlError::Malformed {
                        line,
                        directive: "Ns".into(),
                    })?;
                current_material(&mut lib, &current, line, "Ns")?.ns = ns.max(0.0);
            }
            _ => {}
        }
    }

    Ok(lib)
}

fn parse_rgb<'a>(
    mut fields: impl Iterator<Item = &'a str>,
    line: usize,
    directive: &str,
) -> Result<Rgb, MtlError> {
    let mut next = || -> Result<f32, MtlError> {
        fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| MtlError::Malformed {
                line,
                directive: directive.to_string(),
            })
    };
    Ok(Rgb::from_floats(next()?, next()?, next()?))
}

fn current_material<'a>(
    lib: &'a mut MtlLibrary,
    current: &Option<String>,
    line: usize,
    directive: &str,
) -> Result<&'a mut Material, MtlError> {
    let name = current.as_ref().ok_or_else(|| MtlError::NoCurrentMaterial {
        line,
        directive: directive.to_string(),
    })?;
    Ok(lib
        .materials
        .get_mut(name)
        .expect("current material always exists in the map"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channels_and_exponent() {
        let lib = parse_mtl(
            "# library\n\
             newmtl shiny\n\
             Ka 0.1 0.1 0.1\n\
             Kd 0.8 0.0 0.0\n\
             Ks 1.0 1.0 1.0\n\
             Ns 96.0\n",
        )
        .unwrap();
        let mat = lib.get("shiny").unwrap();
        assert_eq!(mat.kd, Rgb::from_floats(0.8, 0.0, 0.0));
        assert_eq!(mat.ns, 96.0);
    }

    #[test]
    fn missing_channels_keep_fallback_values() {
        let lib = parse_mtl("newmtl plain\nKd 0.5 0.5 0.5\n").unwrap();
        let mat = lib.get("plain").unwrap();
        assert_eq!(mat.ka, Material::fallback().ka);
        assert_eq!(mat.ns, 0.0);
    }

    #[test]
    fn channel_before_newmtl_is_an_error() {
        assert!(matches!(
            parse_mtl("Kd 1 1 1\n"),
            Err(MtlError::NoCurrentMaterial { .. })
        ));
    }

    #[test]
    fn negative_exponent_clamps_to_zero() {
        let lib = parse_mtl("newmtl m\nNs -4\n").unwrap();
        assert_eq!(lib.get("m").unwrap().ns, 0.0);
    }
}
