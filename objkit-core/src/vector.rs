/// Small fixed-size vector helpers used by the parser and geometry passes
use nalgebra::{SVector, Vector2, Vector3};

pub type Vec2 = Vector2<f32>;
pub type Vec3 = Vector3<f32>;

/// Norms, determinants and extents at or below this value are treated as degenerate.
///
/// Degenerate values are clamped or skipped instead of producing non-finite results.
pub const DEGENERATE_EPSILON: f32 = 1e-5;

pub fn add<const D: usize>(a: &SVector<f32, D>, b: &SVector<f32, D>) -> SVector<f32, D> {
    a + b
}

pub fn sub<const D: usize>(a: &SVector<f32, D>, b: &SVector<f32, D>) -> SVector<f32, D> {
    a - b
}

pub fn scale<const D: usize>(s: f32, v: &SVector<f32, D>) -> SVector<f32, D> {
    v * s
}

pub fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    a.cross(b)
}

/// Scale `v` to unit length.
///
/// Vectors whose norm is at most [`DEGENERATE_EPSILON`] are returned unscaled,
/// so a zero vector stays zero rather than becoming NaN. Vectors with finite
/// components whose norm overflows are scaled down first.
pub fn normalized<const D: usize>(v: &SVector<f32, D>) -> SVector<f32, D> {
    let norm = v.norm();
    if norm.is_infinite() && v.amax().is_finite() {
        let shrunk = v / v.amax();
        shrunk / shrunk.norm()
    } else if norm > DEGENERATE_EPSILON && norm.is_finite() {
        v / norm
    } else {
        *v
    }
}

/// Component-wise minimum
pub fn component_min<const D: usize>(a: &SVector<f32, D>, b: &SVector<f32, D>) -> SVector<f32, D> {
    a.inf(b)
}

/// Component-wise maximum
pub fn component_max<const D: usize>(a: &SVector<f32, D>, b: &SVector<f32, D>) -> SVector<f32, D> {
    a.sup(b)
}
