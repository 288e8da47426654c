//! Affine transform recovery between coordinate frames.
//!
//! The detector describes the hand region as a triangular "L" frame (a corner plus
//! two edge directions). Mapping that frame onto a fixed target triangle yields the
//! affine transform between padded image coordinates and the canonical square crop.

use nalgebra::{Matrix3, Point2};

use crate::error::PalmError;

/// Solves for the affine transform (as a homogeneous 3×3 matrix) that maps the
/// `src` triangle onto the `dst` triangle.
///
/// Fails with [`PalmError::DegenerateGeometry`] when the source points are
/// collinear (or coincide), since no unique affine map exists then. Solving the
/// system instead of silently inverting keeps NaNs out of downstream coordinates.
pub fn from_triangles(
    src: &[Point2<f32>; 3],
    dst: &[Point2<f32>; 3],
) -> Result<Matrix3<f32>, PalmError> {
    let s = homogeneous_columns(src);
    let d = homogeneous_columns(dst);

    let s_inv = s
        .try_inverse()
        .ok_or(PalmError::DegenerateGeometry("collinear triangle points"))?;

    Ok(d * s_inv)
}

/// Inverts an affine transform produced by [`from_triangles`].
pub fn invert(m: &Matrix3<f32>) -> Result<Matrix3<f32>, PalmError> {
    m.try_inverse()
        .ok_or(PalmError::DegenerateGeometry("singular affine matrix"))
}

/// Applies a homogeneous 2D transform to a point.
pub fn apply(m: &Matrix3<f32>, point: Point2<f32>) -> Point2<f32> {
    m.transform_point(&point)
}

fn homogeneous_columns(points: &[Point2<f32>; 3]) -> Matrix3<f32> {
    Matrix3::new(
        points[0].x,
        points[1].x,
        points[2].x,
        points[0].y,
        points[1].y,
        points[2].y,
        1.0,
        1.0,
        1.0,
    )
}
