/// De-indexing for non-indexed draw submission
///
/// Indexed draws need a single index stream shared by all attributes. When the
/// face tables differ per attribute, the mesh is flattened instead: every face
/// vertex gets its own copy of each attribute.
use crate::error::{MeshError, MeshResult};
use crate::mesh::{AttributeKind, FaceIndices, Mesh, VertexAttributes};

/// A mesh with attribute streams only, one element per face vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatMesh {
    pub vertex: VertexAttributes,
}

impl FlatMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertex.len(AttributeKind::Positions).unwrap_or(0)
    }
}

/// Expand every face table into a standalone attribute stream, face by face
/// and vertex by vertex. The source mesh is left untouched.
pub fn flatten(mesh: &Mesh) -> MeshResult<FlatMesh> {
    let source = &mesh.vertex;
    let faces = &mesh.face_vertex_indices;

    let vertex = VertexAttributes {
        positions: gather(AttributeKind::Positions, source.positions.as_deref(), faces)?,
        normals: gather(AttributeKind::Normals, source.normals.as_deref(), faces)?,
        tex_coords: gather(AttributeKind::TexCoords, source.tex_coords.as_deref(), faces)?,
        tangents: gather(AttributeKind::Tangents, source.tangents.as_deref(), faces)?,
        bitangents: gather(AttributeKind::Bitangents, source.bitangents.as_deref(), faces)?,
    };

    let flat = FlatMesh { vertex };
    log::debug!(
        "flattened {} faces into {} vertices",
        mesh.face_count(),
        flat.vertex_count()
    );
    Ok(flat)
}

fn gather<T: Copy>(
    kind: AttributeKind,
    table: Option<&[T]>,
    faces: &FaceIndices,
) -> MeshResult<Option<Vec<T>>> {
    let Some(face_table) = faces.get(kind) else {
        return Ok(None);
    };
    let table = table.ok_or(MeshError::MissingPrerequisite {
        operation: "flattening",
        kind,
    })?;

    face_table
        .iter()
        .flatten()
        .map(|&index| {
            table
                .get(index as usize)
                .copied()
                .ok_or_else(|| MeshError::InconsistentFaces {
                    kind,
                    reason: format!(
                        "index {index} is out of range for {} elements",
                        table.len()
                    ),
                })
        })
        .collect::<MeshResult<Vec<T>>>()
        .map(Some)
}
