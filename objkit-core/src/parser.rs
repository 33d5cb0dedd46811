/// Wavefront OBJ text parser
///
/// Reads `v`, `vn`, `vt` and `f` records into an indexed [`Mesh`]. Every other
/// record kind (groups, materials, smoothing, ...) is skipped, as is anything
/// after a `#`.
use std::fmt;

use nalgebra::SVector;
use nom::{
    bytes::complete::take_till1,
    character::complete::{char, digit1, space0, space1},
    combinator::{map_res, opt},
    multi::many1,
    number::complete::float,
    sequence::preceded,
    IResult,
};

use crate::error::{MeshError, MeshResult};
use crate::mesh::{AttributeKind, Face, FaceIndices, Mesh, VertexAttributes};

/// Parser configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Split quads into two triangles and reject faces with other vertex counts
    pub triangulate: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { triangulate: true }
    }
}

/// Parse OBJ text, triangulating quads
pub fn parse_obj(input: &str) -> MeshResult<Mesh> {
    parse_obj_with(input, &ParseOptions::default())
}

/// Parse OBJ text with explicit options
pub fn parse_obj_with(input: &str, options: &ParseOptions) -> MeshResult<Mesh> {
    let mut vertex = VertexAttributes::default();
    let mut face_records = Vec::new();
    let mut dropped_components = 0;

    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    for (line_index, raw_line) in input.lines().enumerate() {
        let line = line_index + 1;
        let content = raw_line.split_once('#').map_or(raw_line, |(data, _)| data);
        if content.trim().is_empty() {
            continue;
        }

        let (fields, tag) = keyword(content)
            .map_err(|_| MeshError::malformed(line, "unreadable record"))?;

        match tag {
            "v" => {
                let values = complete(numbers(fields), line, tag)?;
                let position = to_vector::<3>(&values, line, tag, &mut dropped_components)?;
                vertex.positions.get_or_insert_with(Vec::new).push(position);
            }
            "vn" => {
                let values = complete(numbers(fields), line, tag)?;
                let normal = to_vector::<3>(&values, line, tag, &mut dropped_components)?;
                vertex.normals.get_or_insert_with(Vec::new).push(normal);
            }
            "vt" => {
                let values = complete(numbers(fields), line, tag)?;
                let tex_coord = to_vector::<2>(&values, line, tag, &mut dropped_components)?;
                vertex.tex_coords.get_or_insert_with(Vec::new).push(tex_coord);
            }
            "f" => {
                let vertices = complete(face_vertices(fields), line, tag)?;
                face_records.push(FaceRecord { line, vertices });
            }
            _ => {}
        }
    }

    if dropped_components > 0 {
        log::warn!("ignored extra components on {dropped_components} vertex records");
    }

    let face_records = if options.triangulate {
        triangulate(face_records)?
    } else {
        face_records
            .into_iter()
            .map(|record| {
                if record.vertices.len() < 3 {
                    Err(MeshError::UnsupportedTopology {
                        line: record.line,
                        arity: record.vertices.len(),
                    })
                } else {
                    Ok(record)
                }
            })
            .collect::<MeshResult<Vec<_>>>()?
    };

    let face_vertex_indices = build_face_indices(&face_records, &vertex)?;
    let mesh = Mesh {
        vertex,
        face_vertex_indices,
    };
    mesh.validate()?;

    log::debug!(
        "parsed OBJ: {} positions, {} normals, {} texture coordinates, {} faces",
        mesh.vertex.len(AttributeKind::Positions).unwrap_or(0),
        mesh.vertex.len(AttributeKind::Normals).unwrap_or(0),
        mesh.vertex.len(AttributeKind::TexCoords).unwrap_or(0),
        mesh.face_count()
    );

    Ok(mesh)
}

/// One `position[/texcoord][/normal]` field of a face record, 1-based as written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FaceVertex {
    position: u32,
    tex_coord: Option<u32>,
    normal: Option<u32>,
}

impl FaceVertex {
    fn layout(&self) -> FaceLayout {
        FaceLayout {
            tex_coords: self.tex_coord.is_some(),
            normals: self.normal.is_some(),
        }
    }
}

/// Which optional indices the face vertices of a file carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FaceLayout {
    tex_coords: bool,
    normals: bool,
}

impl fmt::Display for FaceLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.tex_coords, self.normals) {
            (false, false) => f.write_str("v"),
            (true, false) => f.write_str("v/vt"),
            (false, true) => f.write_str("v//vn"),
            (true, true) => f.write_str("v/vt/vn"),
        }
    }
}

#[derive(Debug, Clone)]
struct FaceRecord {
    line: usize,
    vertices: Vec<FaceVertex>,
}

fn keyword(input: &str) -> IResult<&str, &str> {
    preceded(space0, take_till1(|c: char| c.is_whitespace()))(input)
}

fn numbers(input: &str) -> IResult<&str, Vec<f32>> {
    many1(preceded(space1, float))(input)
}

fn index(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse::<u32>)(input)
}

fn face_vertex(input: &str) -> IResult<&str, FaceVertex> {
    let (input, position) = index(input)?;
    let (input, tex_coord) = opt(preceded(char('/'), opt(index)))(input)?;
    let (input, normal) = match tex_coord {
        Some(_) => opt(preceded(char('/'), opt(index)))(input)?,
        None => (input, None),
    };
    Ok((
        input,
        FaceVertex {
            position,
            tex_coord: tex_coord.flatten(),
            normal: normal.flatten(),
        },
    ))
}

fn face_vertices(input: &str) -> IResult<&str, Vec<FaceVertex>> {
    many1(preceded(space1, face_vertex))(input)
}

/// Require that a record parser succeeded and left nothing but whitespace behind
fn complete<T>(result: IResult<&str, T>, line: usize, tag: &str) -> MeshResult<T> {
    match result {
        Ok((rest, value)) if rest.trim().is_empty() => Ok(value),
        Ok((rest, _)) => Err(MeshError::malformed(
            line,
            format!("unexpected `{}` in `{tag}` record", rest.trim()),
        )),
        Err(_) => Err(MeshError::malformed(
            line,
            format!("`{tag}` record has no valid fields"),
        )),
    }
}

fn to_vector<const D: usize>(
    values: &[f32],
    line: usize,
    tag: &str,
    dropped_components: &mut usize,
) -> MeshResult<SVector<f32, D>> {
    if values.len() < D {
        return Err(MeshError::malformed(
            line,
            format!("`{tag}` needs {D} values, found {}", values.len()),
        ));
    }
    if values.iter().any(|value| !value.is_finite()) {
        return Err(MeshError::malformed(
            line,
            format!("`{tag}` has a non-finite value"),
        ));
    }
    if values.len() > D {
        *dropped_components += 1;
    }
    Ok(SVector::from_column_slice(&values[..D]))
}

/// Fan-split quads into `[0, 1, 2]` and `[0, 2, 3]`; triangles pass through.
fn triangulate(records: Vec<FaceRecord>) -> MeshResult<Vec<FaceRecord>> {
    let face_lines = records.len();
    let mut quads = 0;
    let mut triangles = Vec::with_capacity(records.len());

    for record in records {
        match record.vertices.len() {
            3 => triangles.push(record),
            4 => {
                quads += 1;
                let v = &record.vertices;
                triangles.push(FaceRecord {
                    line: record.line,
                    vertices: vec![v[0], v[1], v[2]],
                });
                triangles.push(FaceRecord {
                    line: record.line,
                    vertices: vec![v[0], v[2], v[3]],
                });
            }
            arity => {
                return Err(MeshError::UnsupportedTopology {
                    line: record.line,
                    arity,
                })
            }
        }
    }

    log::debug!("converted {quads} quad faces (out of {face_lines}) into triangles");
    Ok(triangles)
}

/// Convert a 1-based index to 0-based, checking it against the table it points into
fn resolve(line: usize, kind: AttributeKind, index: u32, len: usize) -> MeshResult<u32> {
    if index == 0 {
        return Err(MeshError::malformed(line, "face indices start at 1, found 0"));
    }
    if index as usize > len {
        return Err(MeshError::IndexOutOfRange {
            line,
            kind,
            index,
            len,
        });
    }
    Ok(index - 1)
}

/// Build the face tables. The first vertex of the first face decides which
/// optional tables exist; every other face vertex must have the same layout.
fn build_face_indices(
    records: &[FaceRecord],
    vertex: &VertexAttributes,
) -> MeshResult<FaceIndices> {
    let Some(layout) = records
        .first()
        .and_then(|record| record.vertices.first())
        .map(FaceVertex::layout)
    else {
        return Ok(FaceIndices::default());
    };

    let mut positions = Vec::with_capacity(records.len());
    let mut tex_coords = layout.tex_coords.then(|| Vec::with_capacity(records.len()));
    let mut normals = layout.normals.then(|| Vec::with_capacity(records.len()));

    let len = |kind| vertex.len(kind).unwrap_or(0);

    for record in records {
        let line = record.line;
        let mut position_face = Face::with_capacity(record.vertices.len());
        let mut tex_coord_face = Face::with_capacity(record.vertices.len());
        let mut normal_face = Face::with_capacity(record.vertices.len());

        for face_vertex in &record.vertices {
            if face_vertex.layout() != layout {
                return Err(MeshError::malformed(
                    line,
                    format!(
                        "face vertex has layout {} but the first face uses {layout}",
                        face_vertex.layout()
                    ),
                ));
            }

            position_face.push(resolve(
                line,
                AttributeKind::Positions,
                face_vertex.position,
                len(AttributeKind::Positions),
            )?);
            if let Some(index) = face_vertex.tex_coord {
                tex_coord_face.push(resolve(
                    line,
                    AttributeKind::TexCoords,
                    index,
                    len(AttributeKind::TexCoords),
                )?);
            }
            if let Some(index) = face_vertex.normal {
                normal_face.push(resolve(
                    line,
                    AttributeKind::Normals,
                    index,
                    len(AttributeKind::Normals),
                )?);
            }
        }

        positions.push(position_face);
        if let Some(table) = tex_coords.as_mut() {
            table.push(tex_coord_face);
        }
        if let Some(table) = normals.as_mut() {
            table.push(normal_face);
        }
    }

    Ok(FaceIndices {
        positions: Some(positions),
        normals,
        tex_coords,
        tangents: None,
        bitangents: None,
    })
}

#[cfg(test)]
mod tests {
    use std::fmt::Write;

    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::vector::{Vec2, Vec3};

    const QUAD: &str = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";

    #[test]
    fn test_quad_is_fan_split() {
        let mesh = parse_obj(QUAD).unwrap();
        assert_eq!(
            mesh.face_vertex_indices.positions,
            Some(vec![vec![0, 1, 2], vec![0, 2, 3]])
        );
        assert_eq!(mesh.vertex.positions.as_ref().map(Vec::len), Some(4));
        assert!(mesh.vertex.normals.is_none());
        assert!(mesh.vertex.tex_coords.is_none());
        assert!(mesh.face_vertex_indices.normals.is_none());
        assert!(mesh.face_vertex_indices.tex_coords.is_none());
    }

    #[test]
    fn test_quad_kept_without_triangulation() {
        let options = ParseOptions { triangulate: false };
        let mesh = parse_obj_with(QUAD, &options).unwrap();
        assert_eq!(mesh.face_vertex_indices.positions, Some(vec![vec![0, 1, 2, 3]]));
    }

    #[test]
    fn test_pentagon() {
        let text = "v 0 0 0\nv 1 0 0\nv 2 1 0\nv 1 2 0\nv 0 1 0\nf 1 2 3 4 5\n";
        assert_eq!(
            parse_obj(text),
            Err(MeshError::UnsupportedTopology { line: 6, arity: 5 })
        );

        let options = ParseOptions { triangulate: false };
        let mesh = parse_obj_with(text, &options).unwrap();
        assert_eq!(mesh.face_vertex_indices.positions, Some(vec![vec![0, 1, 2, 3, 4]]));
    }

    #[test]
    fn test_degenerate_face() {
        let text = "v 0 0 0\nv 1 0 0\nf 1 2\n";
        let options = ParseOptions { triangulate: false };
        assert_eq!(
            parse_obj_with(text, &options),
            Err(MeshError::UnsupportedTopology { line: 3, arity: 2 })
        );
    }

    #[test]
    fn test_full_face_layout() {
        let text = "\
# a textured, lit triangle
mtllib scene.mtl
o Triangle
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 0.0 1.0
vn 0.0 0.0 1.0
usemtl default
s off
f 1/1/1 2/2/1 3/3/1
";
        let mesh = parse_obj(text).unwrap();
        assert_eq!(mesh.face_vertex_indices.positions, Some(vec![vec![0, 1, 2]]));
        assert_eq!(mesh.face_vertex_indices.tex_coords, Some(vec![vec![0, 1, 2]]));
        assert_eq!(mesh.face_vertex_indices.normals, Some(vec![vec![0, 0, 0]]));
        assert_eq!(mesh.vertex.tex_coords.as_ref().map(Vec::len), Some(3));
        assert_eq!(mesh.vertex.normals, Some(vec![Vec3::new(0.0, 0.0, 1.0)]));
    }

    #[test]
    fn test_normals_without_tex_coords() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n";
        let mesh = parse_obj(text).unwrap();
        assert!(mesh.face_vertex_indices.tex_coords.is_none());
        assert_eq!(mesh.face_vertex_indices.normals, Some(vec![vec![0, 0, 0]]));
    }

    #[test]
    fn test_mixed_face_layouts_are_rejected() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/1 2/1 3/1\nf 1 2 3\n";
        assert!(matches!(
            parse_obj(text),
            Err(MeshError::Malformed { line: 6, .. })
        ));
    }

    #[test]
    fn test_numeric_forms() {
        let text = "v -1.5 .25 1e-2\nv 2. -0 +3\nv 1 1 1 1\nvt 0.5 0.5 0\n";
        let mesh = parse_obj(text).unwrap();
        assert_eq!(
            mesh.vertex.positions,
            Some(vec![
                Vec3::new(-1.5, 0.25, 0.01),
                Vec3::new(2.0, 0.0, 3.0),
                Vec3::new(1.0, 1.0, 1.0),
            ])
        );
        assert_eq!(mesh.vertex.tex_coords, Some(vec![Vec2::new(0.5, 0.5)]));
        assert!(mesh.face_vertex_indices.positions.is_none());
    }

    #[test]
    fn test_inline_comments_and_tabs() {
        let text = "v\t0 0 0 # origin\nv 1 0 0\nv 0 1 0\nf 1 2 3 # the only face\n";
        let mesh = parse_obj(text).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.vertex.positions.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn test_malformed_numbers() {
        assert!(matches!(
            parse_obj("v 0 0 0\nv 1 zero 0\n"),
            Err(MeshError::Malformed { line: 2, .. })
        ));
        assert!(matches!(
            parse_obj("vn 0 1\n"),
            Err(MeshError::Malformed { line: 1, .. })
        ));
        assert!(matches!(
            parse_obj("v\n"),
            Err(MeshError::Malformed { line: 1, .. })
        ));
        assert!(matches!(
            parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 x\n"),
            Err(MeshError::Malformed { line: 4, .. })
        ));
        assert!(matches!(
            parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 -3\n"),
            Err(MeshError::Malformed { line: 4, .. })
        ));
    }

    #[test]
    fn test_face_index_bounds() {
        assert!(matches!(
            parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n"),
            Err(MeshError::Malformed { line: 4, .. })
        ));
        assert_eq!(
            parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 4\n"),
            Err(MeshError::IndexOutOfRange {
                line: 4,
                kind: AttributeKind::Positions,
                index: 4,
                len: 3,
            })
        );
        assert_eq!(
            parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/1 2/1 3/1\n"),
            Err(MeshError::IndexOutOfRange {
                line: 4,
                kind: AttributeKind::TexCoords,
                index: 1,
                len: 0,
            })
        );
    }

    #[test]
    fn test_empty_input() {
        let mesh = parse_obj("").unwrap();
        assert_eq!(mesh, Mesh::default());
        assert!(mesh.attribute_kinds().is_empty());
    }

    #[test]
    fn test_byte_order_mark() {
        let text = "\u{feff}v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj(text).unwrap();
        assert_eq!(mesh.vertex.positions.as_ref().map(Vec::len), Some(3));
        assert_eq!(mesh.vertex.positions.as_ref().unwrap()[0], Vec3::zeros());
        assert_eq!(mesh.face_vertex_indices.positions, Some(vec![vec![0, 1, 2]]));
    }

    type Corner = (u32, u32);

    /// Position count, texture coordinate count and faces of `p/t` corners, 1-based
    fn gen_obj() -> impl Strategy<Value = (usize, usize, Vec<Vec<Corner>>)> {
        (1..12usize, 1..12usize).prop_flat_map(|(positions, tex_coords)| {
            let corner = (1..=positions as u32, 1..=tex_coords as u32);
            let face = proptest::collection::vec(corner, 3..=4);
            (
                Just(positions),
                Just(tex_coords),
                proptest::collection::vec(face, 0..16),
            )
        })
    }

    fn obj_text(positions: usize, tex_coords: usize, faces: &[Vec<Corner>]) -> String {
        let mut text = String::new();
        for i in 0..positions {
            writeln!(text, "v {i} {} 0", i % 3).unwrap();
        }
        for i in 0..tex_coords {
            writeln!(text, "vt {} 0.5", i as f32 / 16.0).unwrap();
        }
        for face in faces {
            text.push('f');
            for (p, t) in face {
                write!(text, " {p}/{t}").unwrap();
            }
            text.push('\n');
        }
        text
    }

    proptest! {
        #[test]
        fn test_generated_faces_stay_in_bounds(obj in gen_obj()) {
            let (positions, tex_coords, faces) = obj;
            let mesh = parse_obj(&obj_text(positions, tex_coords, &faces)).unwrap();

            let quads = faces.iter().filter(|face| face.len() == 4).count();
            prop_assert_eq!(mesh.face_count(), faces.len() + quads);

            let tables = [
                (AttributeKind::Positions, positions),
                (AttributeKind::TexCoords, tex_coords),
            ];
            for (kind, len) in tables {
                let table = mesh.face_vertex_indices.get(kind);
                prop_assert_eq!(table.is_some(), !faces.is_empty());
                for face in table.into_iter().flatten() {
                    prop_assert_eq!(face.len(), 3);
                    prop_assert!(face.iter().all(|&index| (index as usize) < len));
                }
            }
        }
    }
}
