//! objkit core library - OBJ mesh parsing and derived geometry
//!
//! This library turns Wavefront OBJ text into indexed mesh tables, derives
//! per-vertex normals and tangent frames, and de-indexes meshes for
//! non-indexed draw submission. It performs no file I/O.

pub mod bump;
pub mod error;
pub mod flatten;
pub mod geometry;
pub mod mesh;
pub mod parser;
pub mod vector;

// Re-export commonly used types
pub use error::{MeshError, MeshResult};
pub use flatten::{flatten, FlatMesh};
pub use geometry::{
    bounding_box, insert_per_face_normals, insert_per_vertex_normals,
    insert_per_vertex_tangents, normalize_bounds, Aabb,
};
pub use mesh::{AttributeKind, Face, FaceIndices, Mesh, VertexAttributes};
pub use parser::{parse_obj, parse_obj_with, ParseOptions};
