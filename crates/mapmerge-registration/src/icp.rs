use glam::DVec3;
use mapmerge_3d::kdtree::PointIndex;
use mapmerge_3d::linalg::fit_rigid_transform;
use mapmerge_3d::{PointCloud, RigidTransform};

use crate::error::RegistrationError;

/// Minimum cosine of the incremental rotation angle to consider the rotation converged.
const ROTATION_COS_THRESHOLD: f64 = 0.99999;

/// Result of the ICP algorithm.
///
/// The transformation is from the source to the target frame and already includes the
/// initial guess.
#[derive(Debug, Clone)]
pub struct IcpResult {
    /// Estimated transform.
    pub transform: RigidTransform,
    /// Whether the incremental transform fell below the convergence thresholds.
    pub converged: bool,
    /// The total number of iterations performed.
    pub num_iterations: usize,
    /// Last computed RMSE over the accepted correspondences.
    pub rmse: f64,
}

/// Structure to define the ICP parameters.
#[derive(Debug, Clone)]
pub struct IcpParams {
    /// Pairs further apart than this are ignored.
    pub max_correspondence_distance: f64,
    /// Pairs with a residual above this after the first fit are rejected and the fit repeated.
    pub outlier_rejection_threshold: f64,
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Maximum squared translation of the incremental transform to be considered converged.
    pub transformation_epsilon: f64,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_correspondence_distance: 1.0,
            outlier_rejection_threshold: 0.05,
            max_iterations: 100,
            transformation_epsilon: 1e-8,
        }
    }
}

/// Iterative Closest Point (ICP) algorithm using point to point distance.
///
/// # Arguments
///
/// * `source` - Source point cloud.
/// * `target` - Target point cloud.
/// * `initial_guess` - Transform from source to target to start from.
/// * `params` - Correspondence rejection and convergence parameters.
///
/// # Returns
///
/// The refined transform composed with the initial guess, plus diagnostics.
pub fn icp_refine(
    source: &PointCloud,
    target: &PointCloud,
    initial_guess: &RigidTransform,
    params: &IcpParams,
) -> Result<IcpResult, RegistrationError> {
    if source.is_empty() {
        return Err(RegistrationError::EmptyPointCloud("source"));
    }
    if target.is_empty() {
        return Err(RegistrationError::EmptyPointCloud("target"));
    }

    let mut result = IcpResult {
        transform: *initial_guess,
        converged: false,
        num_iterations: 0,
        rmse: f64::INFINITY,
    };

    // build kdtree for target points to speed up the nearest neighbor search
    let kdtree = PointIndex::new(target.points());

    let mut current_source = initial_guess.transform_points(source.points());
    let mut incremental = RigidTransform::IDENTITY;

    let max_dist_sq = params.max_correspondence_distance * params.max_correspondence_distance;
    let outlier_sq = params.outlier_rejection_threshold * params.outlier_rejection_threshold;

    for i in 0..params.max_iterations {
        let (mut src_match, mut dst_match) =
            find_correspondences(&current_source, target.points(), &kdtree, max_dist_sq);

        log::debug!("Iteration: {}, correspondences: {}", i, src_match.len());

        if src_match.len() < 3 {
            log::warn!("icp: not enough correspondences ({})", src_match.len());
            break;
        }

        let mut delta = fit_rigid_transform(&src_match, &dst_match)?;

        // reject pairs that still disagree with the fitted motion and refit
        let keep = src_match
            .iter()
            .zip(dst_match.iter())
            .map(|(s, d)| residual_sq(&delta, s, d) <= outlier_sq)
            .collect::<Vec<_>>();
        let num_kept = keep.iter().filter(|&&k| k).count();
        if num_kept >= 3 && num_kept < keep.len() {
            src_match = filter(&src_match, &keep);
            dst_match = filter(&dst_match, &keep);
            delta = fit_rigid_transform(&src_match, &dst_match)?;
        }

        current_source = delta.transform_points(&current_source);
        incremental = delta * incremental;

        let sum_sq = src_match
            .iter()
            .zip(dst_match.iter())
            .map(|(s, d)| residual_sq(&delta, s, d))
            .sum::<f64>();
        result.rmse = (sum_sq / src_match.len() as f64).sqrt();
        result.num_iterations += 1;

        let translation_sq = delta.translation().length_squared();
        let rotation_cos = delta.rotation_angle().cos();
        if translation_sq <= params.transformation_epsilon && rotation_cos >= ROTATION_COS_THRESHOLD
        {
            log::debug!("ICP converged in {} iterations with error {}", i + 1, result.rmse);
            result.converged = true;
            break;
        }
    }

    result.transform = incremental * *initial_guess;

    if !result.converged {
        log::debug!("ICP did not converge, rmse {}", result.rmse);
    }

    Ok(result)
}

fn residual_sq(transform: &RigidTransform, src: &[f64; 3], dst: &[f64; 3]) -> f64 {
    DVec3::from_array(transform.transform_point(src)).distance_squared(DVec3::from_array(*dst))
}

fn filter(points: &[[f64; 3]], keep: &[bool]) -> Vec<[f64; 3]> {
    points
        .iter()
        .zip(keep.iter())
        .filter_map(|(p, &k)| k.then_some(*p))
        .collect()
}

/// Pair each source point with its nearest target point, dropping pairs beyond the distance.
fn find_correspondences(
    source: &[[f64; 3]],
    target: &[[f64; 3]],
    kdtree: &PointIndex,
    max_dist_sq: f64,
) -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
    let mut src_match = Vec::with_capacity(source.len());
    let mut dst_match = Vec::with_capacity(source.len());
    for p in source {
        if let Some(nn) = kdtree.nearest(p) {
            if nn.squared_distance <= max_dist_sq {
                src_match.push(*p);
                dst_match.push(target[nn.index]);
            }
        }
    }
    (src_match, dst_match)
}
