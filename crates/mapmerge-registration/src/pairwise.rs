use std::fmt;
use std::str::FromStr;

use mapmerge_3d::{PointCloud, RigidTransform};
use serde::{Deserialize, Serialize};

use crate::correspondence::find_feature_correspondences;
use crate::descriptors::DescriptorSet;
use crate::error::RegistrationError;
use crate::icp::{icp_refine, IcpParams};
use crate::initial_alignment::{estimate_transform_from_descriptors, InitialAlignmentParams};
use crate::ransac::{estimate_transform_from_correspondences, RansacParams};
use crate::score::{confidence_from_score, pairwise_rmse, transform_score};

/// Primary strategy for the pairwise transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    /// Reciprocal descriptor matching followed by RANSAC.
    #[default]
    Matching,
    /// Sample consensus initial alignment.
    SacIa,
}

impl EstimationMethod {
    /// Canonical lowercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            EstimationMethod::Matching => "matching",
            EstimationMethod::SacIa => "sac_ia",
        }
    }
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EstimationMethod {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "matching" => Ok(EstimationMethod::Matching),
            "sac_ia" => Ok(EstimationMethod::SacIa),
            _ => Err(RegistrationError::UnknownName {
                what: "estimation method",
                name: s.to_string(),
            }),
        }
    }
}

/// Parameters of the pairwise registration.
#[derive(Debug, Clone)]
pub struct PairwiseParams {
    /// Primary strategy.
    pub method: EstimationMethod,
    /// Whether to refine the primary estimate with ICP on the full clouds.
    pub refine: bool,
    /// RANSAC inlier distance, ICP outlier rejection distance and SAC-IA sample separation.
    pub inlier_threshold: f64,
    /// Maximum distance of corresponding points in SAC-IA, ICP and the transform score.
    pub max_correspondence_distance: f64,
    /// Iteration budget of SAC-IA and ICP.
    pub max_iterations: usize,
    /// Iteration budget of the correspondence RANSAC.
    pub ransac_max_iterations: usize,
    /// Number of nearest descriptors visited by the reciprocal matcher.
    pub matching_k: usize,
    /// ICP convergence threshold.
    pub transform_epsilon: f64,
    /// Optional fixed seed for the sampling strategies.
    pub random_seed: Option<u64>,
}

impl Default for PairwiseParams {
    fn default() -> Self {
        Self {
            method: EstimationMethod::Matching,
            refine: true,
            inlier_threshold: 0.5,
            max_correspondence_distance: 1.0,
            max_iterations: 100,
            ransac_max_iterations: 1000,
            matching_k: 5,
            transform_epsilon: 1e-2,
            random_seed: None,
        }
    }
}

/// The per-map data consumed by the pairwise registration.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationInput<'a> {
    /// Down-sampled map points.
    pub points: &'a PointCloud,
    /// Keypoints detected on `points`.
    pub keypoints: &'a PointCloud,
    /// Descriptors, parallel-indexed with `keypoints`.
    pub descriptors: &'a DescriptorSet,
}

impl RegistrationInput<'_> {
    fn check(&self) -> Result<(), RegistrationError> {
        if self.keypoints.len() != self.descriptors.len() {
            return Err(RegistrationError::KeypointDescriptorMismatch {
                keypoints: self.keypoints.len(),
                descriptors: self.descriptors.len(),
            });
        }
        Ok(())
    }
}

/// Outcome of registering one pair of maps.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseRegistration {
    /// Transform from the source to the target frame, `None` if no strategy produced one.
    pub transform: Option<RigidTransform>,
    /// Transform score of `transform`.
    pub score: Option<f64>,
    /// Confidence of the estimate, `0.0` on failure.
    pub confidence: f64,
}

impl PairwiseRegistration {
    /// A failed registration.
    pub fn failed() -> Self {
        Self {
            transform: None,
            score: None,
            confidence: 0.0,
        }
    }
}

/// Estimate the transform from `source` to `target` with the configured strategy,
/// optionally refined by ICP.
///
/// Returns `Ok(None)` when the primary strategy could not find a model.
pub fn estimate_transform(
    source: &RegistrationInput,
    target: &RegistrationInput,
    params: &PairwiseParams,
) -> Result<Option<RigidTransform>, RegistrationError> {
    source.check()?;
    target.check()?;

    let transform = match params.method {
        EstimationMethod::Matching => {
            let correspondences = find_feature_correspondences(
                source.descriptors,
                target.descriptors,
                params.matching_k,
            )?;
            let ransac = RansacParams {
                max_iterations: params.ransac_max_iterations,
                inlier_threshold: params.inlier_threshold,
                random_seed: params.random_seed,
                ..Default::default()
            };
            let result = estimate_transform_from_correspondences(
                source.keypoints.points(),
                target.keypoints.points(),
                &correspondences,
                &ransac,
            )?;
            if let Some(transform) = &result.transform {
                let src = result
                    .inliers
                    .iter()
                    .map(|c| source.keypoints.points()[c.source_idx])
                    .collect::<Vec<_>>();
                let dst = result
                    .inliers
                    .iter()
                    .map(|c| target.keypoints.points()[c.target_idx])
                    .collect::<Vec<_>>();
                log::debug!(
                    "matching: {} correspondences, {} inliers, inlier rmse {}",
                    correspondences.len(),
                    result.inliers.len(),
                    pairwise_rmse(&src, &dst, transform)
                );
            }
            result.transform
        }
        EstimationMethod::SacIa => {
            let sac_ia = InitialAlignmentParams {
                min_sample_distance: params.inlier_threshold,
                max_correspondence_distance: params.max_correspondence_distance,
                max_iterations: params.max_iterations,
                random_seed: params.random_seed,
                ..Default::default()
            };
            let result = estimate_transform_from_descriptors(
                source.keypoints.points(),
                source.descriptors,
                target.keypoints.points(),
                target.descriptors,
                &sac_ia,
            )?;
            Some(result.transform)
        }
    };

    let Some(transform) = transform else {
        return Ok(None);
    };

    if !params.refine {
        return Ok(Some(transform));
    }

    let icp = IcpParams {
        max_correspondence_distance: params.max_correspondence_distance,
        outlier_rejection_threshold: params.inlier_threshold,
        max_iterations: params.max_iterations,
        transformation_epsilon: params.transform_epsilon,
    };
    let result = icp_refine(source.points, target.points, &transform, &icp)?;
    log::debug!(
        "icp: converged {}, {} iterations, rmse {}",
        result.converged,
        result.num_iterations,
        result.rmse
    );

    Ok(Some(result.transform))
}

/// Register a pair of maps and grade the result.
///
/// Strategy failures and degenerate scores give a zero-confidence result instead of an error;
/// input contract violations are returned as errors.
pub fn register_pair(
    source: &RegistrationInput,
    target: &RegistrationInput,
    params: &PairwiseParams,
) -> Result<PairwiseRegistration, RegistrationError> {
    let Some(transform) = estimate_transform(source, target, params)? else {
        log::warn!("{} estimation found no transform", params.method);
        return Ok(PairwiseRegistration::failed());
    };

    let score = transform_score(
        source.points,
        target.points,
        &transform,
        params.max_correspondence_distance,
    )?;

    let confidence = match confidence_from_score(score) {
        Ok(confidence) => confidence,
        Err(e) => {
            log::warn!("rejecting registration: {}", e);
            0.0
        }
    };

    Ok(PairwiseRegistration {
        transform: Some(transform),
        score: Some(score),
        confidence,
    })
}
