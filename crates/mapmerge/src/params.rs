use std::path::Path;

use mapmerge_registration::{DescriptorKind, EstimationMethod, PairwiseParams};
use serde::{Deserialize, Serialize};

use crate::error::MapMergeError;
use crate::features::KeypointKind;

/// Parameters of the map merging pipeline.
///
/// Every field has a default, so a configuration file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapMergeParams {
    /// Voxel size used to resample the maps before registration.
    pub resolution: f64,
    /// Radius of the local descriptors and of the outlier filter.
    pub descriptor_radius: f64,
    /// Minimum number of neighbours within `descriptor_radius` for a point to be kept.
    pub outliers_min_neighbours: usize,
    /// Radius of the surface normal estimation and of the keypoint detector.
    pub normal_radius: f64,
    /// Keypoint detector.
    pub keypoint_type: KeypointKind,
    /// Response threshold of the keypoint detector.
    pub keypoint_threshold: f64,
    /// Local descriptor.
    pub descriptor_type: DescriptorKind,
    /// Primary pairwise strategy.
    pub estimation_method: EstimationMethod,
    /// Refine pairwise estimates with ICP.
    pub refine_transform: bool,
    /// Inlier distance of the sample consensus and ICP outlier rejection.
    pub inlier_threshold: f64,
    /// Maximum distance of corresponding points.
    pub max_correspondence_distance: f64,
    /// Iteration budget of SAC-IA and ICP.
    pub max_iterations: usize,
    /// Iteration budget of the correspondence RANSAC.
    pub ransac_max_iterations: usize,
    /// Number of nearest descriptors considered by the reciprocal matcher.
    pub matching_k: usize,
    /// ICP convergence threshold.
    pub transform_epsilon: f64,
    /// Minimum confidence of a pairwise estimate to enter the transform graph.
    pub confidence_threshold: f64,
    /// Voxel size of the merged map.
    pub output_resolution: f64,
    /// Seed of the sampling strategies.
    pub ransac_seed: u64,
}

impl Default for MapMergeParams {
    fn default() -> Self {
        let resolution = 0.1;
        let inlier_threshold = resolution * 5.0;
        Self {
            resolution,
            descriptor_radius: resolution * 8.0,
            outliers_min_neighbours: 100,
            normal_radius: resolution * 6.0,
            keypoint_type: KeypointKind::Sift,
            keypoint_threshold: 5.0,
            descriptor_type: DescriptorKind::Pfh,
            estimation_method: EstimationMethod::Matching,
            refine_transform: true,
            inlier_threshold,
            max_correspondence_distance: inlier_threshold * 2.0,
            max_iterations: 100,
            ransac_max_iterations: 1000,
            matching_k: 5,
            transform_epsilon: 1e-2,
            confidence_threshold: 10.0,
            output_resolution: 0.05,
            ransac_seed: 42,
        }
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), MapMergeError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MapMergeError::InvalidConfig(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

impl MapMergeParams {
    /// Check that every value is in range.
    pub fn validate(&self) -> Result<(), MapMergeError> {
        check_positive("resolution", self.resolution)?;
        check_positive("descriptor_radius", self.descriptor_radius)?;
        check_positive("normal_radius", self.normal_radius)?;
        check_positive("inlier_threshold", self.inlier_threshold)?;
        check_positive("max_correspondence_distance", self.max_correspondence_distance)?;
        check_positive("output_resolution", self.output_resolution)?;
        if self.max_iterations == 0 {
            return Err(MapMergeError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.ransac_max_iterations == 0 {
            return Err(MapMergeError::InvalidConfig(
                "ransac_max_iterations must be at least 1".to_string(),
            ));
        }
        if self.matching_k == 0 {
            return Err(MapMergeError::InvalidConfig(
                "matching_k must be at least 1".to_string(),
            ));
        }
        if !(self.transform_epsilon.is_finite() && self.transform_epsilon >= 0.0) {
            return Err(MapMergeError::InvalidConfig(format!(
                "transform_epsilon must be non-negative, got {}",
                self.transform_epsilon
            )));
        }
        if self.confidence_threshold.is_nan() {
            return Err(MapMergeError::InvalidConfig(
                "confidence_threshold must be a number".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate parameters from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, MapMergeError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Read, parse and validate parameters from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MapMergeError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The subset of parameters used by the pairwise registration.
    pub fn pairwise_params(&self) -> PairwiseParams {
        PairwiseParams {
            method: self.estimation_method,
            refine: self.refine_transform,
            inlier_threshold: self.inlier_threshold,
            max_correspondence_distance: self.max_correspondence_distance,
            max_iterations: self.max_iterations,
            ransac_max_iterations: self.ransac_max_iterations,
            matching_k: self.matching_k,
            transform_epsilon: self.transform_epsilon,
            random_seed: Some(self.ransac_seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() -> Result<(), MapMergeError> {
        let params = MapMergeParams::default();
        params.validate()?;
        assert_relative_eq!(params.descriptor_radius, 0.8);
        assert_relative_eq!(params.normal_radius, 0.6, epsilon = 1e-12);
        assert_relative_eq!(params.inlier_threshold, 0.5);
        assert_relative_eq!(params.max_correspondence_distance, 1.0);
        assert_eq!(params.outliers_min_neighbours, 100);
        assert_eq!(params.descriptor_type, DescriptorKind::Pfh);
        assert_eq!(params.estimation_method, EstimationMethod::Matching);
        Ok(())
    }

    #[test]
    fn test_from_json_partial() -> Result<(), MapMergeError> {
        let params = MapMergeParams::from_json_str(
            r#"{
                "resolution": 0.2,
                "descriptor_type": "fpfh",
                "estimation_method": "sac_ia",
                "keypoint_type": "harris",
                "refine_transform": false
            }"#,
        )?;
        assert_eq!(params.resolution, 0.2);
        assert_eq!(params.descriptor_type, DescriptorKind::Fpfh);
        assert_eq!(params.estimation_method, EstimationMethod::SacIa);
        assert_eq!(params.keypoint_type, KeypointKind::Harris);
        assert!(!params.refine_transform);
        // untouched fields keep their defaults
        assert_eq!(params.matching_k, 5);
        assert_eq!(params.confidence_threshold, 10.0);
        Ok(())
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(
            MapMergeParams::from_json_str(r#"{"resolution": -1.0}"#),
            Err(MapMergeError::InvalidConfig(_))
        ));
        assert!(matches!(
            MapMergeParams::from_json_str(r#"{"descriptor_type": "sift"}"#),
            Err(MapMergeError::Json(_))
        ));
        assert!(matches!(
            MapMergeParams::from_json_str(r#"{"unknown_option": 1}"#),
            Err(MapMergeError::Json(_))
        ));
        assert!(matches!(
            MapMergeParams::from_json_str(r#"{"matching_k": 0}"#),
            Err(MapMergeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_json_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("params.json");
        let params = MapMergeParams {
            confidence_threshold: 3.5,
            ..Default::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&params)?)?;
        assert_eq!(MapMergeParams::from_json_file(&path)?, params);

        assert!(matches!(
            MapMergeParams::from_json_file(dir.path().join("missing.json")),
            Err(MapMergeError::Io(_))
        ));
        Ok(())
    }

    #[test]
    fn test_pairwise_params() {
        let params = MapMergeParams::default();
        let pairwise = params.pairwise_params();
        assert_eq!(pairwise.method, EstimationMethod::Matching);
        assert_eq!(pairwise.random_seed, Some(42));
        assert_eq!(pairwise.matching_k, 5);
        assert_eq!(pairwise.max_iterations, 100);
        assert_eq!(pairwise.ransac_max_iterations, 1000);

        let params = MapMergeParams::from_json_str(r#"{"ransac_max_iterations": 250}"#)
            .map(|p| p.pairwise_params());
        assert!(params.is_ok_and(|p| p.ransac_max_iterations == 250 && p.max_iterations == 100));
        assert!(matches!(
            MapMergeParams::from_json_str(r#"{"ransac_max_iterations": 0}"#),
            Err(MapMergeError::InvalidConfig(_))
        ));
    }
}
