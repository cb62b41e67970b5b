use glam::DVec3;
use mapmerge_3d::kdtree::PointIndex;
use mapmerge_3d::linalg::fit_rigid_transform;
use mapmerge_3d::RigidTransform;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::correspondence::check_descriptor_pair;
use crate::descriptors::{knn_search, DescriptorSet};
use crate::error::RegistrationError;

const NUM_SAMPLES: usize = 3;
const MAX_SAMPLE_ATTEMPTS: usize = 100;

/// Parameters of the initial alignment search.
#[derive(Debug, Clone)]
pub struct InitialAlignmentParams {
    /// Minimum distance between any two sampled source keypoints.
    pub min_sample_distance: f64,
    /// Truncation distance of the alignment error.
    pub max_correspondence_distance: f64,
    /// Number of sampled hypotheses.
    pub max_iterations: usize,
    /// Number of feature-space neighbours a sample may be paired with.
    pub k_correspondences: usize,
    /// Optional fixed seed for reproducible sampling.
    pub random_seed: Option<u64>,
}

impl Default for InitialAlignmentParams {
    fn default() -> Self {
        Self {
            min_sample_distance: 0.05,
            max_correspondence_distance: 1.0,
            max_iterations: 1000,
            k_correspondences: 10,
            random_seed: None,
        }
    }
}

/// Result of the initial alignment.
#[derive(Debug, Clone)]
pub struct InitialAlignmentResult {
    /// Best transform found, identity if no hypothesis could be evaluated.
    pub transform: RigidTransform,
    /// Whether at least one hypothesis was evaluated.
    pub converged: bool,
    /// Mean squared distance of aligned source keypoints within the correspondence distance.
    pub fitness: f64,
}

/// Coarse alignment of the source keypoints onto the target keypoints without initial guess.
///
/// Every iteration draws three well separated source keypoints, pairs each with a random
/// one of its nearest target descriptors, fits a rigid transform and scores it with a
/// truncated quadratic error over all source keypoints. The lowest-error transform wins.
///
/// # Errors
///
/// Fails on empty or mismatched descriptor sets and when keypoints and descriptors
/// are not parallel-indexed.
pub fn estimate_transform_from_descriptors(
    source_keypoints: &[[f64; 3]],
    source_descriptors: &DescriptorSet,
    target_keypoints: &[[f64; 3]],
    target_descriptors: &DescriptorSet,
    params: &InitialAlignmentParams,
) -> Result<InitialAlignmentResult, RegistrationError> {
    check_descriptor_pair(source_descriptors, target_descriptors)?;
    for (keypoints, descriptors) in [
        (source_keypoints, source_descriptors),
        (target_keypoints, target_descriptors),
    ] {
        if keypoints.len() != descriptors.len() {
            return Err(RegistrationError::KeypointDescriptorMismatch {
                keypoints: keypoints.len(),
                descriptors: descriptors.len(),
            });
        }
    }
    if params.k_correspondences == 0 {
        return Err(RegistrationError::InvalidParameter(
            "k_correspondences must be at least 1",
        ));
    }

    let mut rng: StdRng = match params.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let target_index = PointIndex::new(target_keypoints);
    let candidates = knn_search(source_descriptors, target_descriptors, params.k_correspondences);
    let max_dist_sq = params.max_correspondence_distance * params.max_correspondence_distance;

    let mut best: Option<(RigidTransform, f64)> = None;

    if source_keypoints.len() >= NUM_SAMPLES {
        for _ in 0..params.max_iterations {
            let Some(samples) =
                select_samples(source_keypoints, params.min_sample_distance, &mut rng)
            else {
                continue;
            };

            let src = samples
                .iter()
                .map(|&i| source_keypoints[i])
                .collect::<Vec<_>>();
            let dst = samples
                .iter()
                .map(|&i| {
                    let neighbors = &candidates[i];
                    target_keypoints[neighbors[rng.random_range(0..neighbors.len())].index]
                })
                .collect::<Vec<_>>();

            let Ok(transform) = fit_rigid_transform(&src, &dst) else {
                continue;
            };

            let error =
                truncated_error(source_keypoints, &target_index, &transform, max_dist_sq);
            if best.map_or(true, |(_, best_error)| error < best_error) {
                best = Some((transform, error));
            }
        }
    }

    let converged = best.is_some();
    let transform = best.map_or(RigidTransform::IDENTITY, |(t, _)| t);
    let fitness = fitness_score(source_keypoints, &target_index, &transform, max_dist_sq);

    log::debug!(
        "initial alignment converged: {}, fitness: {}",
        converged,
        fitness
    );

    Ok(InitialAlignmentResult {
        transform,
        converged,
        fitness,
    })
}

/// Draw three source indices with pairwise distance at least `min_sample_distance`.
fn select_samples(
    points: &[[f64; 3]],
    min_sample_distance: f64,
    rng: &mut StdRng,
) -> Option<[usize; NUM_SAMPLES]> {
    let min_dist_sq = min_sample_distance * min_sample_distance;
    let mut samples = [0usize; NUM_SAMPLES];
    let mut selected = 0;

    for _ in 0..MAX_SAMPLE_ATTEMPTS {
        let candidate = rng.random_range(0..points.len());
        let p = DVec3::from_array(points[candidate]);
        let far_enough = samples[..selected].iter().all(|&s| {
            s != candidate && p.distance_squared(DVec3::from_array(points[s])) >= min_dist_sq
        });
        if far_enough {
            samples[selected] = candidate;
            selected += 1;
            if selected == NUM_SAMPLES {
                return Some(samples);
            }
        }
    }
    None
}

fn truncated_error(
    source: &[[f64; 3]],
    target_index: &PointIndex,
    transform: &RigidTransform,
    max_dist_sq: f64,
) -> f64 {
    source
        .iter()
        .filter_map(|p| target_index.nearest(&transform.transform_point(p)))
        .map(|nn| (nn.squared_distance / max_dist_sq).min(1.0))
        .sum()
}

fn fitness_score(
    source: &[[f64; 3]],
    target_index: &PointIndex,
    transform: &RigidTransform,
    max_dist_sq: f64,
) -> f64 {
    let (sum, count) = source
        .iter()
        .filter_map(|p| target_index.nearest(&transform.transform_point(p)))
        .filter(|nn| nn.squared_distance <= max_dist_sq)
        .fold((0.0, 0usize), |(sum, count), nn| {
            (sum + nn.squared_distance, count + 1)
        });
    if count == 0 {
        f64::MAX
    } else {
        sum / count as f64
    }
}
