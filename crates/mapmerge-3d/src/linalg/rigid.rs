//! Rigid alignment utilities (Kabsch / Umeyama without scale)

use glam::{DMat3, DVec3};

use super::svd::svd3;
use crate::error::Point3dError;
use crate::transforms::RigidTransform;

/// Compute the centroids of two sets of points.
///
/// PRECONDITION: both sets are non-empty and have the same length.
pub fn compute_centroids(points1: &[[f64; 3]], points2: &[[f64; 3]]) -> (DVec3, DVec3) {
    let mut centroid1 = DVec3::ZERO;
    let mut centroid2 = DVec3::ZERO;

    for (p1, p2) in points1.iter().zip(points2.iter()) {
        centroid1 += DVec3::from_array(*p1);
        centroid2 += DVec3::from_array(*p2);
    }

    centroid1 /= points1.len() as f64;
    centroid2 /= points2.len() as f64;

    (centroid1, centroid2)
}

/// Least-squares rigid transform mapping `points_in_src` onto `points_in_dst`.
///
/// Closed-form Kabsch solution: with `H = Σ (src - μs)(dst - μd)ᵀ = U S Vᵀ` the
/// rotation is `R = V Uᵀ` (with the last column of `V` flipped when that would
/// produce a reflection) and `t = μd - R μs`.
///
/// # Errors
///
/// Fails if the slices differ in length or hold fewer than 3 points.
pub fn fit_rigid_transform(
    points_in_src: &[[f64; 3]],
    points_in_dst: &[[f64; 3]],
) -> Result<RigidTransform, Point3dError> {
    if points_in_src.len() != points_in_dst.len() {
        return Err(Point3dError::MismatchedArrayLengths {
            left_name: "source points",
            left_len: points_in_src.len(),
            right_name: "target points",
            right_len: points_in_dst.len(),
        });
    }
    if points_in_src.len() < 3 {
        return Err(Point3dError::InsufficientPoints {
            required: 3,
            actual: points_in_src.len(),
        });
    }

    let (src_centroid, dst_centroid) = compute_centroids(points_in_src, points_in_dst);

    // H = Σ[(src - src_mean) * (dst - dst_mean)^T]
    let mut h = DMat3::ZERO;
    for (p_in_src, p_in_dst) in points_in_src.iter().zip(points_in_dst.iter()) {
        let src_centered = DVec3::from_array(*p_in_src) - src_centroid;
        let dst_centered = DVec3::from_array(*p_in_dst) - dst_centroid;
        h += DMat3::from_cols(
            src_centered * dst_centered.x,
            src_centered * dst_centered.y,
            src_centered * dst_centered.z,
        );
    }

    let svd = svd3(&h);
    let u = *svd.u();
    let v = *svd.v();

    let mut r = v * u.transpose();
    if r.determinant() < 0.0 {
        let v_corrected = DMat3::from_cols(v.x_axis, v.y_axis, -v.z_axis);
        r = v_corrected * u.transpose();
    }

    let t = dst_centroid - r * src_centroid;

    Ok(RigidTransform::from_parts(r, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::axis_angle_to_rotation_matrix;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn create_random_points(rng: &mut StdRng, num_points: usize) -> Vec<[f64; 3]> {
        (0..num_points)
            .map(|_| [rng.random(), rng.random(), rng.random()])
            .collect()
    }

    #[test]
    fn test_compute_centroids() {
        let points1 = vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let points2 = vec![[7.0, 8.0, 9.0], [10.0, 11.0, 12.0]];
        let (centroid1, centroid2) = compute_centroids(&points1, &points2);
        assert_relative_eq!(centroid1.x, 2.5);
        assert_relative_eq!(centroid1.y, 3.5);
        assert_relative_eq!(centroid1.z, 4.5);
        assert_relative_eq!(centroid2.x, 8.5);
        assert_relative_eq!(centroid2.y, 9.5);
        assert_relative_eq!(centroid2.z, 10.5);
    }

    #[test]
    fn test_fit_identity() -> Result<(), Point3dError> {
        let mut rng = StdRng::seed_from_u64(0);
        let points = create_random_points(&mut rng, 30);
        let transform = fit_rigid_transform(&points, &points)?;
        assert!(transform.is_identity(1e-9));
        Ok(())
    }

    #[test]
    fn test_fit_random_transforms() -> Result<(), Point3dError> {
        let mut rng = StdRng::seed_from_u64(7);
        let points_src = create_random_points(&mut rng, 30);

        for _ in 0..10 {
            let axis = [rng.random(), rng.random(), rng.random::<f64>() + 0.1];
            let rotation = axis_angle_to_rotation_matrix(&axis, rng.random::<f64>() * 3.0)?;
            let expected = RigidTransform::from_rotation_translation(
                rotation,
                [rng.random(), rng.random(), rng.random()],
            );
            let points_dst = expected.transform_points(&points_src);

            let estimated = fit_rigid_transform(&points_src, &points_dst)?;
            assert!(
                estimated.abs_diff_eq(&expected, 1e-8),
                "expected {:?}, got {:?}",
                expected,
                estimated
            );
        }
        Ok(())
    }

    #[test]
    fn test_fit_coplanar_points() -> Result<(), Point3dError> {
        let points_src = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
            [3.0, 1.0, 0.0],
        ];
        let rotation = axis_angle_to_rotation_matrix(&[1.0, 1.0, 0.0], 0.5)?;
        let expected = RigidTransform::from_rotation_translation(rotation, [0.0, 1.0, -1.0]);
        let points_dst = expected.transform_points(&points_src);

        let estimated = fit_rigid_transform(&points_src, &points_dst)?;
        assert!(estimated.abs_diff_eq(&expected, 1e-8));
        assert_relative_eq!(estimated.rotation().determinant(), 1.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        assert!(matches!(
            fit_rigid_transform(&[[0.0; 3]; 2], &[[0.0; 3]; 2]),
            Err(Point3dError::InsufficientPoints { .. })
        ));
        assert!(matches!(
            fit_rigid_transform(&[[0.0; 3]; 3], &[[0.0; 3]; 4]),
            Err(Point3dError::MismatchedArrayLengths { .. })
        ));
    }
}
