use glam::DVec3;
use mapmerge_3d::linalg::fit_rigid_transform;
use mapmerge_3d::RigidTransform;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

use crate::correspondence::Correspondence;
use crate::error::RegistrationError;

const SAMPLE_SIZE: usize = 3;

/// Parameters for RANSAC over correspondences.
#[derive(Debug, Clone)]
pub struct RansacParams {
    /// Maximum number of RANSAC iterations.
    pub max_iterations: usize,
    /// Distance threshold to classify a correspondence as an inlier.
    pub inlier_threshold: f64,
    /// Desired probability that at least one sample set is outlier-free.
    pub confidence: f64,
    /// Optional fixed seed for reproducible sampling.
    pub random_seed: Option<u64>,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            inlier_threshold: 0.05,
            confidence: 0.99,
            random_seed: None,
        }
    }
}

/// RANSAC result.
#[derive(Debug, Clone, PartialEq)]
pub struct RansacResult {
    /// Transform refitted on all inliers, `None` when no model was found.
    pub transform: Option<RigidTransform>,
    /// Inlier correspondences, empty when no model was found.
    pub inliers: Vec<Correspondence>,
}

impl RansacResult {
    fn failed() -> Self {
        Self {
            transform: None,
            inliers: Vec::new(),
        }
    }
}

/// Estimate the rigid transform from source to target keypoints that agrees with the
/// most correspondences, then refit it by least squares on the inliers.
///
/// A failure to find any non-degenerate model is reported as `transform == None`.
///
/// # Errors
///
/// Fails if a correspondence indexes outside the keypoint slices.
pub fn estimate_transform_from_correspondences(
    source_keypoints: &[[f64; 3]],
    target_keypoints: &[[f64; 3]],
    correspondences: &[Correspondence],
    params: &RansacParams,
) -> Result<RansacResult, RegistrationError> {
    for c in correspondences {
        if c.source_idx >= source_keypoints.len() {
            return Err(RegistrationError::CorrespondenceOutOfBounds {
                index: c.source_idx,
                len: source_keypoints.len(),
            });
        }
        if c.target_idx >= target_keypoints.len() {
            return Err(RegistrationError::CorrespondenceOutOfBounds {
                index: c.target_idx,
                len: target_keypoints.len(),
            });
        }
    }

    let n = correspondences.len();
    if n < SAMPLE_SIZE {
        log::warn!("ransac: {} correspondences, need at least {}", n, SAMPLE_SIZE);
        return Ok(RansacResult::failed());
    }

    let mut rng: StdRng = match params.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let src_of = |c: &Correspondence| source_keypoints[c.source_idx];
    let dst_of = |c: &Correspondence| target_keypoints[c.target_idx];
    let threshold_sq = params.inlier_threshold * params.inlier_threshold;

    let classify = |transform: &RigidTransform| -> Vec<usize> {
        correspondences
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                let p = DVec3::from_array(transform.transform_point(&src_of(c)));
                p.distance_squared(DVec3::from_array(dst_of(c))) <= threshold_sq
            })
            .map(|(i, _)| i)
            .collect()
    };

    let mut indices: Vec<usize> = (0..n).collect();
    let mut best_inliers: Vec<usize> = Vec::new();

    let mut iter = 0;
    let mut required_iters = params.max_iterations;

    while iter < required_iters {
        iter += 1;

        let (sample, _) = indices.partial_shuffle(&mut rng, SAMPLE_SIZE);
        let src_min = sample
            .iter()
            .map(|&i| src_of(&correspondences[i]))
            .collect::<Vec<_>>();
        let dst_min = sample
            .iter()
            .map(|&i| dst_of(&correspondences[i]))
            .collect::<Vec<_>>();

        if is_degenerate(&src_min) || is_degenerate(&dst_min) {
            continue;
        }

        let model = match fit_rigid_transform(&src_min, &dst_min) {
            Ok(model) => model,
            Err(_) => continue,
        };

        let inliers = classify(&model);
        if inliers.len() > best_inliers.len() {
            best_inliers = inliers;
            required_iters = required_iters.min(adaptive_iterations(
                best_inliers.len(),
                n,
                params.confidence,
                params.max_iterations,
            ));
        }
    }

    log::debug!(
        "ransac: {} iterations, {} of {} inliers",
        iter,
        best_inliers.len(),
        n
    );

    if best_inliers.len() < SAMPLE_SIZE {
        log::warn!("ransac: failed to find a model");
        return Ok(RansacResult::failed());
    }

    let inliers = best_inliers
        .iter()
        .map(|&i| correspondences[i])
        .collect::<Vec<_>>();
    let src_in = inliers.iter().map(src_of).collect::<Vec<_>>();
    let dst_in = inliers.iter().map(dst_of).collect::<Vec<_>>();

    let transform = fit_rigid_transform(&src_in, &dst_in)?;

    Ok(RansacResult {
        transform: Some(transform),
        inliers,
    })
}

/// Three points that are (nearly) collinear do not constrain a rotation.
fn is_degenerate(points: &[[f64; 3]]) -> bool {
    let a = DVec3::from_array(points[0]);
    let b = DVec3::from_array(points[1]);
    let c = DVec3::from_array(points[2]);
    let ab = b - a;
    let ac = c - a;
    let scale = ab.length_squared().max(ac.length_squared());
    scale <= f64::EPSILON || ab.cross(ac).length_squared() <= 1e-12 * scale * scale
}

/// Number of iterations needed to draw one all-inlier sample with the given confidence.
fn adaptive_iterations(
    num_inliers: usize,
    num_total: usize,
    confidence: f64,
    max_iterations: usize,
) -> usize {
    let w = num_inliers as f64 / num_total as f64;
    let ws = w.powi(SAMPLE_SIZE as i32);
    if ws >= 1.0 - 1e-12 {
        return 1;
    }
    if ws <= 1e-12 {
        return max_iterations;
    }
    let log_conf = (1.0 - confidence).max(1e-12).ln();
    let est = (log_conf / (1.0 - ws).ln()).ceil();
    if est.is_finite() && est > 0.0 {
        (est as usize).min(max_iterations)
    } else {
        max_iterations
    }
}
