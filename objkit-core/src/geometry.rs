/// Derived per-vertex geometry: bounds normalization, normals and tangent frames
///
/// Every pass mutates the mesh in place and replaces any table of the same
/// kind that was already there. Degenerate input (zero-area faces, collapsed
/// UV triangles, isolated vertices) never produces non-finite values: zero
/// accumulations stay zero and collapsed UV triangles are skipped, using
/// [`DEGENERATE_EPSILON`] as the threshold.
///
/// Differences, cross products and sums are computed in `f64` and only the
/// final unit vectors are stored as `f32`, so any finite input stays finite.
use nalgebra::{Vector2, Vector3};

use crate::error::{MeshError, MeshResult};
use crate::mesh::{check_faces, check_matching, AttributeKind, Face, Mesh};
use crate::vector::{
    add, component_max, component_min, scale, sub, Vec2, Vec3, DEGENERATE_EPSILON,
};

/// Double-precision vector used while accumulating
pub type DVec3 = Vector3<f64>;

fn widen(v: &Vec3) -> DVec3 {
    v.map(f64::from)
}

fn narrow(v: &DVec3) -> Vec3 {
    v.map(|c| c as f32)
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn center(&self) -> Vec3 {
        scale(0.5, &add(&self.min, &self.max))
    }

    pub fn extent(&self) -> Vec3 {
        sub(&self.max, &self.min)
    }
}

/// Bounding box of a set of points, or `None` if there are none
pub fn bounding_box(positions: &[Vec3]) -> Option<Aabb> {
    let first = *positions.first()?;
    Some(positions.iter().fold(
        Aabb {
            min: first,
            max: first,
        },
        |bounds, p| Aabb {
            min: component_min(&bounds.min, p),
            max: component_max(&bounds.max, p),
        },
    ))
}

/// Center the mesh at the origin and scale it uniformly so its largest
/// dimension spans `[-1, 1]`.
///
/// A mesh whose largest extent is at most [`DEGENERATE_EPSILON`] (e.g. a
/// single point) is only re-centered.
pub fn normalize_bounds(mesh: &mut Mesh) -> MeshResult<()> {
    let missing = || MeshError::MissingPrerequisite {
        operation: "bounds normalization",
        kind: AttributeKind::Positions,
    };
    let positions = mesh.vertex.positions.as_mut().ok_or_else(missing)?;
    let bounds = bounding_box(positions).ok_or_else(missing)?;

    // Extents of finite points near f32::MAX overflow in single precision
    let (min, max) = (widen(&bounds.min), widen(&bounds.max));
    let center = (min + max) * 0.5;
    let largest = (max - min).max();
    let s = if largest > f64::from(DEGENERATE_EPSILON) {
        2.0 / largest
    } else {
        log::debug!("bounding box extent {largest} is degenerate, re-centering only");
        1.0
    };

    for position in positions.iter_mut() {
        *position = narrow(&((widen(position) - center) * s));
    }
    Ok(())
}

/// Unnormalized normal of a face from its first three vertices.
///
/// Vertices past the third are ignored, so non-planar polygons get the
/// normal of their leading triangle.
pub fn face_normal(positions: &[Vec3], face: &Face) -> DVec3 {
    let p0 = widen(&positions[face[0] as usize]);
    let p1 = widen(&positions[face[1] as usize]);
    let p2 = widen(&positions[face[2] as usize]);
    (p1 - p0).cross(&(p2 - p0))
}

/// Replace the normals with per-vertex normals averaged from incident faces.
///
/// Face normals are accumulated unnormalized, so larger faces weigh more.
/// The normal face table becomes a copy of the position face table.
pub fn insert_per_vertex_normals(mesh: &mut Mesh) -> MeshResult<()> {
    let (positions, faces) = mesh.require_positions("per-vertex normals")?;

    let mut sums = vec![DVec3::zeros(); positions.len()];
    for face in faces {
        let n = face_normal(positions, face);
        for &vi in face {
            sums[vi as usize] += n;
        }
    }

    let (normals, degenerate) = normalize_all(&sums);
    if degenerate > 0 {
        log::debug!("{degenerate} vertices have no usable normal");
    }

    let face_table = faces.to_vec();
    mesh.vertex.normals = Some(normals);
    mesh.face_vertex_indices.normals = Some(face_table);
    Ok(())
}

/// Replace the normals with one flat normal per face.
///
/// Each face appends its own unit normal to the normal table, and every
/// vertex of that face indexes it.
pub fn insert_per_face_normals(mesh: &mut Mesh) -> MeshResult<()> {
    let (positions, faces) = mesh.require_positions("per-face normals")?;

    let mut normals = Vec::with_capacity(faces.len());
    let mut face_table = Vec::with_capacity(faces.len());
    for face in faces {
        face_table.push(vec![normals.len() as u32; face.len()]);
        normals.push(unit(&face_normal(positions, face)));
    }

    mesh.vertex.normals = Some(normals);
    mesh.face_vertex_indices.normals = Some(face_table);
    Ok(())
}

/// Tangent and bitangent of one face, or `None` if its UV triangle is degenerate.
///
/// Solves `[T B] * [dUV1 dUV2] = [dP1 dP2]` for the object-space directions
/// of increasing U and V.
fn face_tangent_frame(
    positions: &[Vec3],
    tex_coords: &[Vec2],
    face: &Face,
    tex_face: &Face,
) -> Option<(DVec3, DVec3)> {
    let p0 = widen(&positions[face[0] as usize]);
    let dp1 = widen(&positions[face[1] as usize]) - p0;
    let dp2 = widen(&positions[face[2] as usize]) - p0;

    let uv = |i: u32| -> Vector2<f64> { tex_coords[i as usize].map(f64::from) };
    let uv0 = uv(tex_face[0]);
    let duv1 = uv(tex_face[1]) - uv0;
    let duv2 = uv(tex_face[2]) - uv0;

    // Relative to the edge lengths, so small but well-shaped UV triangles survive
    let det = duv1.x * duv2.y - duv2.x * duv1.y;
    if det.abs() <= f64::from(DEGENERATE_EPSILON) * duv1.norm() * duv2.norm() {
        return None;
    }

    let r = 1.0 / det;
    let tangent = (dp1 * duv2.y - dp2 * duv1.y) * r;
    let bitangent = (dp2 * duv1.x - dp1 * duv2.x) * r;
    let finite = |v: &DVec3| v.iter().all(|c| c.is_finite());
    (finite(&tangent) && finite(&bitangent)).then_some((tangent, bitangent))
}

/// Insert per-vertex tangents and bitangents averaged from incident faces.
///
/// Requires texture coordinates and their face table. Faces whose UV
/// triangle is degenerate contribute nothing. Both new face tables are copies
/// of the position face table.
pub fn insert_per_vertex_tangents(mesh: &mut Mesh) -> MeshResult<()> {
    const OPERATION: &str = "tangent derivation";

    let (positions, faces) = mesh.require_positions(OPERATION)?;
    let missing = || MeshError::MissingPrerequisite {
        operation: OPERATION,
        kind: AttributeKind::TexCoords,
    };
    let tex_coords = mesh.vertex.tex_coords.as_deref().ok_or_else(missing)?;
    let tex_faces = mesh
        .face_vertex_indices
        .tex_coords
        .as_deref()
        .ok_or_else(missing)?;
    check_faces(AttributeKind::TexCoords, tex_faces, tex_coords.len())?;
    check_matching(AttributeKind::TexCoords, tex_faces, faces)?;

    let mut tangent_sums = vec![DVec3::zeros(); positions.len()];
    let mut bitangent_sums = vec![DVec3::zeros(); positions.len()];
    let mut skipped = 0;

    for (face, tex_face) in faces.iter().zip(tex_faces) {
        let Some((tangent, bitangent)) = face_tangent_frame(positions, tex_coords, face, tex_face)
        else {
            skipped += 1;
            continue;
        };
        for &vi in face {
            tangent_sums[vi as usize] += tangent;
            bitangent_sums[vi as usize] += bitangent;
        }
    }

    if skipped > 0 {
        log::debug!("skipped {skipped} faces with degenerate texture coordinates");
    }
    let (tangents, _) = normalize_all(&tangent_sums);
    let (bitangents, _) = normalize_all(&bitangent_sums);

    let face_table = faces.to_vec();
    mesh.vertex.tangents = Some(tangents);
    mesh.vertex.bitangents = Some(bitangents);
    mesh.face_vertex_indices.tangents = Some(face_table.clone());
    mesh.face_vertex_indices.bitangents = Some(face_table);
    Ok(())
}

fn is_degenerate(v: &DVec3) -> bool {
    let norm = v.norm();
    !(norm.is_finite() && norm > f64::from(DEGENERATE_EPSILON))
}

/// Unit-length `f32` copy of `v`. Degenerate vectors are returned unscaled,
/// or as zero if they are not finite.
fn unit(v: &DVec3) -> Vec3 {
    let norm = v.norm();
    if !norm.is_finite() {
        Vec3::zeros()
    } else if norm > f64::from(DEGENERATE_EPSILON) {
        narrow(&(v / norm))
    } else {
        narrow(v)
    }
}

/// Unit-length copies of accumulated sums, and how many were too short to normalize
fn normalize_all(sums: &[DVec3]) -> (Vec<Vec3>, usize) {
    let degenerate = sums.iter().filter(|sum| is_degenerate(sum)).count();
    (sums.iter().map(unit).collect(), degenerate)
}
