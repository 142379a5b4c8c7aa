use crate::error::SceneError;
use crate::io::{parse_mtl, parse_obj, MtlLibrary, ObjDocument};
use crate::material::Material;
use geom::{Aabb, Bounded, RTree, Triangle};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Indices into the owning mesh's vertex, normal, and material tables.
///
/// When the mesh carries no vertex normals the `norms` entries are unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face {
    pub verts: [u32; 3],
    pub norms: [u32; 3],
    pub mat: u32,
}

/// A face plus its eagerly computed bounding box, as stored in the R-tree.
struct FaceSlot {
    face: Face,
    bounds: Aabb,
}

impl Bounded for FaceSlot {
    fn bounds(&self) -> Aabb {
        self.bounds
    }
}

/// An intersection against a mesh or object.
#[derive(Debug, Clone, Copy)]
pub struct MeshHit {
    pub point: DVec3,
    pub normal: DVec3,
    pub material: Material,
}

/// A triangulated polygonal mesh with deduplicated vertex, normal, and
/// material tables and an R-tree over its faces.
///
/// Meshes live in model space; instancing at a world position is the
/// [`Object`](crate::Object)'s job.
pub struct Mesh {
    vertices: Vec<DVec3>,
    vertex_normals: Vec<DVec3>,
    materials: Vec<Material>,
    faces: RTree<FaceSlot>,
    bounds: Aabb,
}

impl Mesh {
    /// Loads a mesh from a Wavefront OBJ file, pulling in its material
    /// library when one is referenced. The library path is resolved relative
    /// to the OBJ file first, then as given.
    pub fn from_obj_path(path: &Path) -> Result<Self, SceneError> {
        let src = std::fs::read_to_string(path).map_err(|e| SceneError::io(path, e))?;
        let doc = parse_obj(&src)?;

        let matlib = match &doc.mtllib {
            Some(lib) => {
                let relative = path.parent().unwrap_or_else(|| Path::new("")).join(lib);
                let text = std::fs::read_to_string(&relative).or_else(|_| {
                    std::fs::read_to_string(lib)
                        .map_err(|e| SceneError::io(lib.as_str(), e))
                })?;
                Some(parse_mtl(&text)?)
            }
            None => None,
        };

        Self::from_document(doc, matlib.as_ref())
    }

    /// Builds a mesh from in-memory OBJ text and an optional material
    /// library.
    pub fn from_obj_source(src: &str, matlib: Option<&MtlLibrary>) -> Result<Self, SceneError> {
        Self::from_document(parse_obj(src)?, matlib)
    }

    fn from_document(doc: ObjDocument, matlib: Option<&MtlLibrary>) -> Result<Self, SceneError> {
        // Vertex normals are only usable when every face corner carries one.
        let use_normals = !doc.normals.is_empty()
            && doc
                .groups
                .iter()
                .flat_map(|g| g.faces.iter().flatten())
                .all(|c| c.normal.is_some());

        let mut vertices: Vec<DVec3> = Vec::new();
        let mut vertex_normals: Vec<DVec3> = Vec::new();
        let mut materials: Vec<Material> = Vec::new();
        let mut slots: Vec<FaceSlot> = Vec::new();

        let mut vertex_ids: HashMap<[u64; 3], u32> = HashMap::new();
        let mut normal_ids: HashMap<[u64; 3], u32> = HashMap::new();
        let mut material_ids = HashMap::new();

        for group in &doc.groups {
            let mat = group
                .usemtl
                .as_deref()
                .and_then(|name| matlib.and_then(|lib| lib.get(name)))
                .copied()
                .unwrap_or_else(Material::fallback);
            let mat_index = *material_ids.entry(mat.key()).or_insert_with(|| {
                materials.push(mat);
                materials.len() as u32 - 1
            });

            for corners in &group.faces {
                let mut face = Face {
                    verts: [0; 3],
                    norms: [0; 3],
                    mat: mat_index,
                };
                for (slot, corner) in face.verts.iter_mut().zip(corners) {
                    *slot = dedup(&mut vertices, &mut vertex_ids, doc.positions[corner.position]);
                }
                if use_normals {
                    for (slot, corner) in face.norms.iter_mut().zip(corners) {
                        let normal = doc.normals[corner.normal.expect("checked above")];
                        *slot = dedup(&mut vertex_normals, &mut normal_ids, normal.normalize());
                    }
                }
                let bounds = face_bounds(&vertices, &face);
                slots.push(FaceSlot { face, bounds });
            }
        }

        if vertices.is_empty() {
            return Err(SceneError::Decode("mesh has no vertices".into()));
        }

        let bounds = Aabb::from_points(vertices.iter().copied())
            .expect("vertices are non-empty");

        Ok(Self {
            vertices,
            vertex_normals,
            materials,
            faces: RTree::bulk_load(slots),
            bounds,
        })
    }

    /// The mesh-space bounding box of all vertices.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn has_vertex_normals(&self) -> bool {
        !self.vertex_normals.is_empty()
    }

    /// The nearest intersection of a mesh-space ray with any face, measured
    /// from the ray origin. Faces are pre-filtered through the R-tree by the
    /// ray/box predicate.
    pub fn intersect(&self, origin: DVec3, dir: DVec3) -> Option<MeshHit> {
        let mut nearest: Option<(f64, MeshHit)> = None;

        for slot in self
            .faces
            .search_condition(|b| b.ray_intersects(origin, dir))
        {
            let tri = self.triangle_for(&slot.face);
            if let Some(hit) = tri.intersect(origin, dir) {
                let distance = (origin - hit.point).length();
                if nearest.map(|(d, _)| distance < d).unwrap_or(true) {
                    nearest = Some((
                        distance,
                        MeshHit {
                            point: hit.point,
                            normal: tri.normal_at(hit.bary, dir),
                            material: self.materials[slot.face.mat as usize],
                        },
                    ));
                }
            }
        }

        nearest.map(|(_, hit)| hit)
    }

    fn triangle_for(&self, face: &Face) -> Triangle {
        let [a, b, c] = face.verts.map(|v| self.vertices[v as usize]);
        if self.vertex_normals.is_empty() {
            Triangle::new(a, b, c)
        } else {
            Triangle::with_normals(
                a,
                b,
                c,
                face.norms.map(|n| self.vertex_normals[n as usize]),
            )
        }
    }
}

fn dedup(table: &mut Vec<DVec3>, ids: &mut HashMap<[u64; 3], u32>, value: DVec3) -> u32 {
    let key = [value.x.to_bits(), value.y.to_bits(), value.z.to_bits()];
    *ids.entry(key).or_insert_with(|| {
        table.push(value);
        table.len() as u32 - 1
    })
}

fn face_bounds(vertices: &[DVec3], face: &Face) -> Aabb {
    Aabb::from_points(face.verts.iter().map(|&v| vertices[v as usize]))
        .expect("a face always has three vertices")
}

/// The serialized form: tables plus a flat face list. The R-tree and cached
/// bounds are rebuilt on decode.
#[derive(Serialize, Deserialize)]
struct MeshWire {
    vertices: Vec<DVec3>,
    vertex_normals: Vec<DVec3>,
    faces: Vec<Face>,
    materials: Vec<Material>,
}

impl Serialize for Mesh {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MeshWire {
            vertices: self.vertices.clone(),
            vertex_normals: self.vertex_normals.clone(),
            faces: self.faces.items().iter().map(|s| s.face).collect(),
            materials: self.materials.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Mesh {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let wire = MeshWire::deserialize(deserializer)?;
        if wire.vertices.is_empty() {
            return Err(D::Error::custom("mesh has no vertices"));
        }

        for face in &wire.faces {
            let verts_ok = face.verts.iter().all(|&v| (v as usize) < wire.vertices.len());
            let norms_ok = wire.vertex_normals.is_empty()
                || face
                    .norms
                    .iter()
                    .all(|&n| (n as usize) < wire.vertex_normals.len());
            let mat_ok = (face.mat as usize) < wire.materials.len();
            if !(verts_ok && norms_ok && mat_ok) {
                return Err(D::Error::custom("face index out of range"));
            }
        }

        let slots = wire
            .faces
            .iter()
            .map(|&face| FaceSlot {
                bounds: face_bounds(&wire.vertices, &face),
                face,
            })
            .collect();

        let bounds = Aabb::from_points(wire.vertices.iter().copied())
            .expect("vertices are non-empty");

        Ok(Mesh {
            vertices: wire.vertices,
            vertex_normals: wire.vertex_normals,
            materials: wire.materials,
            faces: RTree::bulk_load(slots),
            bounds,
        })
    }
}
