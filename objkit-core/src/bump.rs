/// Bump (height) map to normal map conversion
use nalgebra::DMatrix;

use crate::vector::{Vec3, DEGENERATE_EPSILON};

/// How height differences are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FiniteDifference {
    #[default]
    Forward,
    Central,
}

/// Compute a normal for every cell of a height map.
///
/// The normal is `(-dh/dr, -dh/dc, 1)`, the cross product of the row and
/// column tangents, where `h = bumpiness * bump`. Border cells that a
/// difference cannot reach keep a zero slope in that direction. Normals are
/// not unit length.
pub fn normal_map_from_bump(
    bump: &DMatrix<f32>,
    bumpiness: f32,
    style: FiniteDifference,
) -> DMatrix<Vec3> {
    let (rows, cols) = bump.shape();
    let h = bump * bumpiness;
    let mut normals = DMatrix::from_element(rows, cols, Vec3::new(0.0, 0.0, 1.0));

    match style {
        FiniteDifference::Forward => {
            for r in 0..rows.saturating_sub(1) {
                for c in 1..cols.saturating_sub(1) {
                    normals[(r, c)].x = h[(r, c)] - h[(r + 1, c)];
                }
            }
            for r in 1..rows.saturating_sub(1) {
                for c in 0..cols.saturating_sub(1) {
                    normals[(r, c)].y = h[(r, c)] - h[(r, c + 1)];
                }
            }
        }
        FiniteDifference::Central => {
            for r in 1..rows.saturating_sub(1) {
                for c in 1..cols.saturating_sub(1) {
                    let n = &mut normals[(r, c)];
                    n.x = 0.5 * (h[(r - 1, c)] - h[(r + 1, c)]);
                    n.y = 0.5 * (h[(r, c - 1)] - h[(r, c + 1)]);
                }
            }
        }
    }

    normals
}

/// Pack normals into 8-bit RGB.
///
/// All normals are divided by the largest absolute component in the map,
/// clipped to `[-1, 1]` and mapped to `[0, 255]`.
pub fn encode_normal_map(normals: &DMatrix<Vec3>) -> DMatrix<[u8; 3]> {
    let largest = normals.iter().map(|n| n.amax()).fold(0.0_f32, f32::max);
    let scale = if largest > DEGENERATE_EPSILON { largest } else { 1.0 };

    let encode = |c: f32| {
        let unit = (c / scale).clamp(-1.0, 1.0);
        (0.5 * (unit + 1.0) * 255.0).clamp(0.0, 255.0) as u8
    };
    normals.map(|n| [encode(n.x), encode(n.y), encode(n.z)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Height increases by one per row
    fn ramp(rows: usize, cols: usize) -> DMatrix<f32> {
        DMatrix::from_fn(rows, cols, |r, _| r as f32)
    }

    #[test]
    fn test_flat_map() {
        let normals = normal_map_from_bump(&DMatrix::zeros(4, 4), 1.0, FiniteDifference::Forward);
        assert!(normals.iter().all(|n| *n == Vec3::new(0.0, 0.0, 1.0)));

        let encoded = encode_normal_map(&normals);
        assert!(encoded.iter().all(|rgb| *rgb == [127, 127, 255]));
    }

    #[test]
    fn test_forward_differences() {
        let normals = normal_map_from_bump(&ramp(4, 4), 2.0, FiniteDifference::Forward);

        assert_relative_eq!(normals[(0, 1)], Vec3::new(-2.0, 0.0, 1.0));
        assert_relative_eq!(normals[(2, 2)], Vec3::new(-2.0, 0.0, 1.0));
        // Last row and border columns have no forward row difference
        assert_relative_eq!(normals[(3, 1)], Vec3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(normals[(1, 0)], Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_central_differences() {
        let normals = normal_map_from_bump(&ramp(4, 5), 1.0, FiniteDifference::Central);

        assert_relative_eq!(normals[(1, 1)], Vec3::new(-1.0, 0.0, 1.0));
        assert_relative_eq!(normals[(2, 3)], Vec3::new(-1.0, 0.0, 1.0));
        assert_relative_eq!(normals[(0, 2)], Vec3::new(0.0, 0.0, 1.0));

        let columns = DMatrix::from_fn(3, 3, |_, c| c as f32);
        let normals = normal_map_from_bump(&columns, 1.0, FiniteDifference::Central);
        assert_relative_eq!(normals[(1, 1)], Vec3::new(0.0, -1.0, 1.0));
    }

    #[test]
    fn test_encoding_scales_by_largest_component() {
        let normals = normal_map_from_bump(&ramp(3, 3), 4.0, FiniteDifference::Forward);
        let encoded = encode_normal_map(&normals);

        // (-4, 0, 1) / 4 = (-1, 0, 0.25)
        assert_eq!(encoded[(0, 1)], [0, 127, 159]);
        assert_eq!(encoded[(2, 2)], [127, 127, 159]);
    }

    #[test]
    fn test_tiny_maps() {
        let single = DMatrix::from_element(1, 1, 3.0);
        let normals = normal_map_from_bump(&single, 1.0, FiniteDifference::Central);
        assert_eq!(normals.shape(), (1, 1));
        assert_eq!(normals[(0, 0)], Vec3::new(0.0, 0.0, 1.0));

        let empty = normal_map_from_bump(&DMatrix::zeros(0, 0), 1.0, FiniteDifference::Forward);
        assert_eq!(encode_normal_map(&empty).len(), 0);
    }
}
