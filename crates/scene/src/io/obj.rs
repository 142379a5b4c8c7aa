use glam::DVec3;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjError {
    #[error("line {line}: malformed `{directive}` directive")]
    Malformed { line: usize, directive: String },

    #[error("line {line}: vertex index {index} out of range")]
    IndexOutOfRange { line: usize, index: isize },

    #[error("line {line}: face needs at least three vertices")]
    ShortFace { line: usize },
}

/// One corner of a face: indices into the document's position and normal
/// tables, already resolved to zero-based form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceVertex {
    pub position: usize,
    pub normal: Option<usize>,
}

/// A run of faces sharing one material.
#[derive(Debug, Default)]
pub struct ObjGroup {
    pub usemtl: Option<String>,
    pub faces: Vec<[FaceVertex; 3]>,
}

/// A parsed Wavefront OBJ document (positions, normals, triangulated faces).
#[derive(Debug, Default)]
pub struct ObjDocument {
    pub positions: Vec<DVec3>,
    pub normals: Vec<DVec3>,
    pub mtllib: Option<String>,
    pub groups: Vec<ObjGroup>,
}

/// Parses the Wavefront subset this renderer consumes: `v`, `vn`, `f`
/// (including `v//vn` and `v/vt/vn` corners and negative indices), `usemtl`,
/// and `mtllib`. Faces with more than three corners are triangulated as a
/// fan. Texture coordinates, smoothing groups, and object/group names are
/// skipped.
pub fn parse_obj(src: &str) -> Result<ObjDocument, ObjError> {
    let mut doc = ObjDocument::default();
    let mut current_mtl: Option<String> = None;

    for (idx, raw) in src.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let mut fields = text.split_whitespace();
        let directive = fields.next().unwrap_or_default();
        match directive {
            "v" => doc.positions.push(parse_vec3(fields, line, "v")?),
            "vn" => doc.normals.push(parse_vec3(fields, line, "vn")?),
            "mtllib" => {
                doc.mtllib = Some(
                    fields
                        .next()
                        .ok_or_else(|| malformed(line, "mtllib"))?
                        .to_string(),
                );
            }
            "usemtl" => {
                let name = fields.next().ok_or_else(|| malformed(line, "usemtl"))?;
                current_mtl = Some(name.to_string());
            }
            "f" => {
                let mut corners = Vec::with_capacity(4);
                for field in fields {
                    corners.push(parse_corner(field, line, &doc)?);
                }
                if corners.len() < 3 {
                    return Err(ObjError::ShortFace { line });
                }
                let group = group_for(&mut doc.groups, &current_mtl);
                for i in 1..corners.len() - 1 {
                    group.faces.push([corners[0], corners[i], corners[i + 1]]);
                }
            }
            // vt, g, o, s, and anything else in the format are irrelevant here.
            _ => {}
        }
    }

    Ok(doc)
}

fn malformed(line: usize, directive: &str) -> ObjError {
    ObjError::Malformed {
        line,
        directive: directive.to_string(),
    }
}

fn parse_vec3<'a>(
    mut fields: impl Iterator<Item = &'a str>,
    line: usize,
    directive: &str,
) -> Result<DVec3, ObjError> {
    let mut next = || -> Result<f64, ObjError> {
        fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| malformed(line, directive))
    };
    Ok(DVec3::new(next()?, next()?, next()?))
}

fn parse_corner(field: &str, line: usize, doc: &ObjDocument) -> Result<FaceVertex, ObjError> {
    let mut parts = field.split('/');
    let position = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| malformed(line, "f"))?;
    let position = resolve_index(position, doc.positions.len(), line)?;

    let _texture = parts.next();
    let normal = match parts.next() {
        Some(n) if !n.is_empty() => Some(resolve_index(n, doc.normals.len(), line)?),
        _ => None,
    };

    Ok(FaceVertex { position, normal })
}

/// OBJ indices are one-based; negative values count back from the end of
/// the table as populated so far.
fn resolve_index(field: &str, table_len: usize, line: usize) -> Result<usize, ObjError> {
    let index: isize = field.parse().map_err(|_| malformed(line, "f"))?;
    let resolved = if index > 0 {
        index as usize - 1
    } else if index < 0 {
        let back = (-index) as usize;
        if back > table_len {
            return Err(ObjError::IndexOutOfRange { line, index });
        }
        table_len - back
    } else {
        return Err(ObjError::IndexOutOfRange { line, index });
    };

    if resolved >= table_len {
        return Err(ObjError::IndexOutOfRange { line, index });
    }
    Ok(resolved)
}

fn group_for<'a>(groups: &'a mut Vec<ObjGroup>, usemtl: &Option<String>) -> &'a mut ObjGroup {
    let matches = groups
        .last()
        .map(|g| g.usemtl == *usemtl)
        .unwrap_or(false);
    if !matches {
        groups.push(ObjGroup {
            usemtl: usemtl.clone(),
            faces: Vec::new(),
        });
    }
    groups.last_mut().expect("group was just pushed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positions_normals_and_faces() {
        let doc = parse_obj(
            "# comment\n\
             v 0 0 5\n\
             v 1 0 5\n\
             v 0 1 5\n\
             vn 0 0 -1\n\
             f 1//1 2//1 3//1\n",
        )
        .unwrap();
        assert_eq!(doc.positions.len(), 3);
        assert_eq!(doc.normals.len(), 1);
        assert_eq!(doc.groups.len(), 1);
        assert_eq!(doc.groups[0].faces.len(), 1);
        assert_eq!(
            doc.groups[0].faces[0][0],
            FaceVertex {
                position: 0,
                normal: Some(0)
            }
        );
    }

    #[test]
    fn quads_triangulate_as_a_fan() {
        let doc = parse_obj(
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             f 1 2 3 4\n",
        )
        .unwrap();
        assert_eq!(doc.groups[0].faces.len(), 2);
        assert_eq!(doc.groups[0].faces[0].map(|c| c.position), [0, 1, 2]);
        assert_eq!(doc.groups[0].faces[1].map(|c| c.position), [0, 2, 3]);
    }

    #[test]
    fn negative_indices_resolve_from_the_end() {
        let doc = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(doc.groups[0].faces[0].map(|c| c.position), [0, 1, 2]);
    }

    #[test]
    fn usemtl_starts_a_new_group() {
        let doc = parse_obj(
            "mtllib lib.mtl\n\
             v 0 0 0\nv 1 0 0\nv 0 1 0\n\
             f 1 2 3\n\
             usemtl shiny\n\
             f 1 2 3\n",
        )
        .unwrap();
        assert_eq!(doc.mtllib.as_deref(), Some("lib.mtl"));
        assert_eq!(doc.groups.len(), 2);
        assert_eq!(doc.groups[0].usemtl, None);
        assert_eq!(doc.groups[1].usemtl.as_deref(), Some("shiny"));
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        assert!(matches!(
            parse_obj("v 0 0 0\nf 1 2 3\n"),
            Err(ObjError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn short_face_is_an_error() {
        assert!(matches!(
            parse_obj("v 0 0 0\nv 1 0 0\nf 1 2\n"),
            Err(ObjError::ShortFace { .. })
        ));
    }
}
