//! Math utilities and types
//!
//! Thin aliases over nalgebra so geometry code reads in terms of the
//! vector sizes it actually handles.

pub use nalgebra::{Vector2, Vector3, Vector4};

/// 2D vector type (texture coordinates)
pub type Vec2 = Vector2<f32>;

/// 3D vector type (positions, normals)
pub type Vec3 = Vector3<f32>;

/// 4D vector type (material colors with alpha)
pub type Vec4 = Vector4<f32>;

/// Tolerance used when deciding whether an accumulated normal has length
pub const NORMAL_EPSILON: f32 = 1.0e-12;

/// Normalized cross product of two triangle edges
///
/// Returns `None` when the edges are parallel or either edge has zero length,
/// i.e. when the triangle has no defined facing.
pub fn face_normal(a: &Vec3, b: &Vec3, c: &Vec3) -> Option<Vec3> {
    let ab = b - a;
    let ac = c - a;
    let cross = ab.cross(&ac);
    let length = cross.norm();
    if length > 0.0 && length.is_finite() {
        Some(cross / length)
    } else {
        None
    }
}

/// Arithmetic mean of a set of points, `None` when the set is empty
pub fn mean<'a, I>(points: I) -> Option<Vec3>
where
    I: IntoIterator<Item = &'a Vec3>,
{
    let mut sum = Vec3::zeros();
    let mut count = 0usize;
    for point in points {
        sum += point;
        count += 1;
    }
    (count > 0).then(|| sum / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_face_normal_counter_clockwise() {
        let n = face_normal(
            &Vec3::new(0.0, 0.0, 0.0),
            &Vec3::new(1.0, 0.0, 0.0),
            &Vec3::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(n, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_face_normal_degenerate() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert!(face_normal(&p, &p, &p).is_none());

        // Collinear points
        assert!(face_normal(
            &Vec3::new(0.0, 0.0, 0.0),
            &Vec3::new(1.0, 1.0, 1.0),
            &Vec3::new(2.0, 2.0, 2.0),
        )
        .is_none());
    }

    #[test]
    fn test_mean() {
        let points = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 4.0, -6.0)];
        assert_relative_eq!(mean(&points).unwrap(), Vec3::new(1.0, 2.0, -3.0));
        assert!(mean(&[] as &[Vec3]).is_none());
    }
}
