use glam::DVec3;
use mapmerge_3d::kdtree::PointIndex;
use mapmerge_3d::{PointCloud, RigidTransform};

use crate::error::RegistrationError;

/// Mean distance from the transformed source points to their closest target point.
///
/// Each distance is clipped to `max_distance`, so source points without a counterpart in
/// the target contribute `max_distance`. Lower is better.
///
/// # Errors
///
/// Fails if the source cloud is empty or `max_distance` is not positive.
pub fn transform_score(
    source: &PointCloud,
    target: &PointCloud,
    transform: &RigidTransform,
    max_distance: f64,
) -> Result<f64, RegistrationError> {
    if source.is_empty() {
        return Err(RegistrationError::EmptyPointCloud("source"));
    }
    if !(max_distance.is_finite() && max_distance > 0.0) {
        return Err(RegistrationError::InvalidParameter(
            "max_distance must be positive",
        ));
    }

    let kdtree = PointIndex::new(target.points());
    let sum = source
        .points()
        .iter()
        .map(|p| {
            let q = transform.transform_point(p);
            kdtree
                .nearest(&q)
                .map_or(max_distance, |nn| nn.squared_distance.sqrt().min(max_distance))
        })
        .sum::<f64>();

    Ok(sum / source.len() as f64)
}

/// Confidence of a registration from its score: the reciprocal of the error.
///
/// # Errors
///
/// A score that is zero, negative or not finite has no meaningful confidence.
pub fn confidence_from_score(score: f64) -> Result<f64, RegistrationError> {
    if !(score.is_finite() && score > 0.0) {
        return Err(RegistrationError::NonPositiveScore(score));
    }
    Ok(1.0 / score)
}

/// Root mean square distance between paired points under `transform`.
pub fn pairwise_rmse(source: &[[f64; 3]], target: &[[f64; 3]], transform: &RigidTransform) -> f64 {
    let n = source.len().min(target.len());
    if n == 0 {
        return 0.0;
    }
    let sum_sq = source
        .iter()
        .zip(target.iter())
        .map(|(s, t)| {
            DVec3::from_array(transform.transform_point(s)).distance_squared(DVec3::from_array(*t))
        })
        .sum::<f64>();
    (sum_sq / n as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_score() -> Result<(), RegistrationError> {
        let source = PointCloud::from_points(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let target = PointCloud::from_points(vec![[0.0, 0.1, 0.0], [10.0, 0.0, 0.0]]);

        // 0.1 for the first point, the second is clipped at 0.5
        let score = transform_score(&source, &target, &RigidTransform::IDENTITY, 0.5)?;
        assert_relative_eq!(score, 0.3, epsilon = 1e-12);

        let shift = RigidTransform::from_translation([0.0, 0.1, 0.0]);
        let score = transform_score(&source, &target, &shift, 0.5)?;
        assert_relative_eq!(score, 0.25, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_transform_score_empty() -> Result<(), RegistrationError> {
        let source = PointCloud::from_points(vec![[0.0, 0.0, 0.0]]);
        let score = transform_score(&source, &PointCloud::default(), &RigidTransform::IDENTITY, 2.0)?;
        assert_eq!(score, 2.0);
        assert!(transform_score(&PointCloud::default(), &source, &RigidTransform::IDENTITY, 2.0)
            .is_err());
        Ok(())
    }

    #[test]
    fn test_confidence_from_score() -> Result<(), RegistrationError> {
        assert_relative_eq!(confidence_from_score(0.05)?, 20.0);
        assert_eq!(
            confidence_from_score(0.0),
            Err(RegistrationError::NonPositiveScore(0.0))
        );
        assert!(confidence_from_score(f64::NAN).is_err());
        Ok(())
    }

    #[test]
    fn test_pairwise_rmse() {
        let source = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let target = vec![[0.0, 0.0, 1.0], [1.0, 0.0, 1.0]];
        assert_relative_eq!(pairwise_rmse(&source, &target, &RigidTransform::IDENTITY), 1.0);
        let up = RigidTransform::from_translation([0.0, 0.0, 1.0]);
        assert_relative_eq!(pairwise_rmse(&source, &target, &up), 0.0);
    }
}
