/// Indexed mesh model produced by the parser
///
/// A mesh keeps one optional table per vertex attribute kind (`vertex`) and
/// one optional face table per kind (`face_vertex_indices`). A table is `None`
/// when the source never provided that attribute, so callers can check
/// capabilities before running an operation that needs them.
use std::fmt;

use crate::error::{MeshError, MeshResult};
use crate::vector::{Vec2, Vec3};

/// The kinds of per-vertex data a mesh can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Positions,
    Normals,
    TexCoords,
    Tangents,
    Bitangents,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 5] = [
        AttributeKind::Positions,
        AttributeKind::Normals,
        AttributeKind::TexCoords,
        AttributeKind::Tangents,
        AttributeKind::Bitangents,
    ];

    /// Name used when binding the attribute to a shader input
    pub fn name(self) -> &'static str {
        match self {
            AttributeKind::Positions => "positions",
            AttributeKind::Normals => "normals",
            AttributeKind::TexCoords => "texCoords",
            AttributeKind::Tangents => "tangents",
            AttributeKind::Bitangents => "bitangents",
        }
    }

    /// Number of components per element
    pub fn arity(self) -> usize {
        match self {
            AttributeKind::TexCoords => 2,
            _ => 3,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One polygon as 0-based indices into a vertex attribute table
pub type Face = Vec<u32>;

/// Per-vertex attribute tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexAttributes {
    pub positions: Option<Vec<Vec3>>,
    pub normals: Option<Vec<Vec3>>,
    pub tex_coords: Option<Vec<Vec2>>,
    pub tangents: Option<Vec<Vec3>>,
    pub bitangents: Option<Vec<Vec3>>,
}

impl VertexAttributes {
    /// The 3-component table for `kind`, or `None` for texture coordinates
    pub fn vectors3(&self, kind: AttributeKind) -> Option<&[Vec3]> {
        match kind {
            AttributeKind::Positions => self.positions.as_deref(),
            AttributeKind::Normals => self.normals.as_deref(),
            AttributeKind::Tangents => self.tangents.as_deref(),
            AttributeKind::Bitangents => self.bitangents.as_deref(),
            AttributeKind::TexCoords => None,
        }
    }

    /// Number of elements in the table for `kind`, if present
    pub fn len(&self, kind: AttributeKind) -> Option<usize> {
        match kind {
            AttributeKind::TexCoords => self.tex_coords.as_ref().map(Vec::len),
            _ => self.vectors3(kind).map(<[Vec3]>::len),
        }
    }

    pub fn has(&self, kind: AttributeKind) -> bool {
        self.len(kind).is_some()
    }

    /// Attribute kinds that have a table
    pub fn kinds(&self) -> Vec<AttributeKind> {
        AttributeKind::ALL
            .into_iter()
            .filter(|&kind| self.has(kind))
            .collect()
    }

    /// Pack a table back-to-back, e.g. `[[1,2,3],[4,5,6]]` becomes `[1,2,3,4,5,6]`
    pub fn contiguous(&self, kind: AttributeKind) -> Option<Vec<f32>> {
        match kind {
            AttributeKind::TexCoords => self
                .tex_coords
                .as_ref()
                .map(|table| table.iter().flat_map(|v| v.iter().copied()).collect()),
            _ => self
                .vectors3(kind)
                .map(|table| table.iter().flat_map(|v| v.iter().copied()).collect()),
        }
    }
}

/// Per-face index tables, one per attribute kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceIndices {
    pub positions: Option<Vec<Face>>,
    pub normals: Option<Vec<Face>>,
    pub tex_coords: Option<Vec<Face>>,
    pub tangents: Option<Vec<Face>>,
    pub bitangents: Option<Vec<Face>>,
}

impl FaceIndices {
    pub fn get(&self, kind: AttributeKind) -> Option<&[Face]> {
        match kind {
            AttributeKind::Positions => self.positions.as_deref(),
            AttributeKind::Normals => self.normals.as_deref(),
            AttributeKind::TexCoords => self.tex_coords.as_deref(),
            AttributeKind::Tangents => self.tangents.as_deref(),
            AttributeKind::Bitangents => self.bitangents.as_deref(),
        }
    }

    pub fn has(&self, kind: AttributeKind) -> bool {
        self.get(kind).is_some()
    }

    /// Attribute kinds that have a face table
    pub fn kinds(&self) -> Vec<AttributeKind> {
        AttributeKind::ALL
            .into_iter()
            .filter(|&kind| self.has(kind))
            .collect()
    }

    /// Concatenate all faces of one table into a single index stream
    pub fn index_buffer(&self, kind: AttributeKind) -> Option<Vec<u32>> {
        self.get(kind)
            .map(|faces| faces.iter().flatten().copied().collect())
    }

    /// Like [`FaceIndices::index_buffer`], narrowed to 16-bit indices
    pub fn index_buffer_u16(&self, kind: AttributeKind) -> MeshResult<Option<Vec<u16>>> {
        let Some(faces) = self.get(kind) else {
            return Ok(None);
        };
        faces
            .iter()
            .flatten()
            .map(|&index| {
                u16::try_from(index).map_err(|_| MeshError::IndexOverflow { kind, index })
            })
            .collect::<MeshResult<Vec<u16>>>()
            .map(Some)
    }
}

/// An indexed polygon mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertex: VertexAttributes,
    pub face_vertex_indices: FaceIndices,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of faces, taken from the position face table
    pub fn face_count(&self) -> usize {
        self.face_vertex_indices
            .positions
            .as_ref()
            .map_or(0, Vec::len)
    }

    /// Attribute kinds this mesh has vertex data for
    pub fn attribute_kinds(&self) -> Vec<AttributeKind> {
        self.vertex.kinds()
    }

    /// The position table and its face table, checked to be usable for
    /// per-face computations.
    pub(crate) fn require_positions(
        &self,
        operation: &'static str,
    ) -> MeshResult<(&[Vec3], &[Face])> {
        let missing = || MeshError::MissingPrerequisite {
            operation,
            kind: AttributeKind::Positions,
        };
        let positions = self.vertex.positions.as_deref().ok_or_else(missing)?;
        let faces = self
            .face_vertex_indices
            .positions
            .as_deref()
            .ok_or_else(missing)?;
        check_faces(AttributeKind::Positions, faces, positions.len())?;
        Ok((positions, faces))
    }

    /// Check that every face table agrees with the position face table and
    /// only references existing vertex data.
    pub fn validate(&self) -> MeshResult<()> {
        let faces = &self.face_vertex_indices;

        let has_tex_coords =
            faces.has(AttributeKind::TexCoords) && self.vertex.has(AttributeKind::TexCoords);
        if (faces.has(AttributeKind::Tangents) || faces.has(AttributeKind::Bitangents))
            && !has_tex_coords
        {
            return Err(MeshError::MissingPrerequisite {
                operation: "tangent frames",
                kind: AttributeKind::TexCoords,
            });
        }

        let Some(reference) = faces.get(AttributeKind::Positions) else {
            if let Some(&kind) = faces.kinds().first() {
                return Err(MeshError::InconsistentFaces {
                    kind,
                    reason: "no position face table".to_string(),
                });
            }
            return Ok(());
        };

        for kind in faces.kinds() {
            let Some(table) = faces.get(kind) else {
                continue;
            };
            let len = self.vertex.len(kind).ok_or(MeshError::MissingPrerequisite {
                operation: "face indexing",
                kind,
            })?;
            check_faces(kind, table, len)?;
            check_matching(kind, table, reference)?;
        }

        Ok(())
    }
}

/// Every face has at least three vertices and only indexes into `0..len`
pub(crate) fn check_faces(kind: AttributeKind, faces: &[Face], len: usize) -> MeshResult<()> {
    for (face_index, face) in faces.iter().enumerate() {
        if face.len() < 3 {
            return Err(MeshError::InconsistentFaces {
                kind,
                reason: format!("face {face_index} has {} vertices", face.len()),
            });
        }
        if let Some(&index) = face.iter().find(|&&index| index as usize >= len) {
            return Err(MeshError::InconsistentFaces {
                kind,
                reason: format!(
                    "face {face_index} references index {index} but only {len} are defined"
                ),
            });
        }
    }
    Ok(())
}

/// `faces` has the same face count and per-face arity as `reference`
pub(crate) fn check_matching(
    kind: AttributeKind,
    faces: &[Face],
    reference: &[Face],
) -> MeshResult<()> {
    if faces.len() != reference.len() {
        return Err(MeshError::InconsistentFaces {
            kind,
            reason: format!("{} faces, expected {}", faces.len(), reference.len()),
        });
    }
    for (face_index, (face, reference_face)) in faces.iter().zip(reference).enumerate() {
        if face.len() != reference_face.len() {
            return Err(MeshError::InconsistentFaces {
                kind,
                reason: format!(
                    "face {face_index} has {} vertices, expected {}",
                    face.len(),
                    reference_face.len()
                ),
            });
        }
    }
    Ok(())
}
