use std::fmt;
use std::str::FromStr;

use mapmerge_3d::kdtree::remove_radius_outliers;
use mapmerge_3d::voxel_grid::voxel_downsample;
use mapmerge_3d::PointCloud;
use mapmerge_registration::{DescriptorKind, DescriptorSet, RegistrationInput};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::MapMergeError;
use crate::params::MapMergeParams;

/// Keypoint detectors understood by the feature stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeypointKind {
    /// Scale invariant extrema of a curvature response.
    Sift,
    /// Corner response of the surface normals.
    Harris,
}

impl KeypointKind {
    /// Canonical name of the detector.
    pub fn name(&self) -> &'static str {
        match self {
            KeypointKind::Sift => "sift",
            KeypointKind::Harris => "harris",
        }
    }
}

impl fmt::Display for KeypointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeypointKind {
    type Err = MapMergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sift" => Ok(KeypointKind::Sift),
            "harris" => Ok(KeypointKind::Harris),
            _ => Err(MapMergeError::UnknownName {
                what: "keypoint kind",
                name: s.to_string(),
            }),
        }
    }
}

/// Point cloud processing collaborators of the merging pipeline.
///
/// Down-sampling and outlier removal come with default implementations; normals,
/// keypoints and descriptors are supplied by the implementor.
pub trait FeatureExtractor: Sync {
    /// Resample `cloud` on a voxel grid of side `resolution`.
    fn downsample(&self, cloud: &PointCloud, resolution: f64) -> Result<PointCloud, MapMergeError> {
        Ok(voxel_downsample(cloud, resolution)?)
    }

    /// Drop points with fewer than `min_neighbors` neighbours within `radius`.
    fn remove_outliers(
        &self,
        cloud: &PointCloud,
        radius: f64,
        min_neighbors: usize,
    ) -> Result<PointCloud, MapMergeError> {
        Ok(remove_radius_outliers(cloud, radius, min_neighbors))
    }

    /// One unit normal per point of `cloud`.
    fn compute_surface_normals(
        &self,
        cloud: &PointCloud,
        radius: f64,
    ) -> Result<Vec<[f64; 3]>, MapMergeError>;

    /// Detect keypoints on `cloud`.
    fn detect_keypoints(
        &self,
        cloud: &PointCloud,
        normals: &[[f64; 3]],
        kind: KeypointKind,
        threshold: f64,
        radius: f64,
        resolution: f64,
    ) -> Result<PointCloud, MapMergeError>;

    /// Describe every keypoint with a descriptor of `kind`, computed over `cloud`.
    fn compute_local_descriptors(
        &self,
        cloud: &PointCloud,
        normals: &[[f64; 3]],
        keypoints: &PointCloud,
        kind: DescriptorKind,
        radius: f64,
    ) -> Result<DescriptorSet, MapMergeError>;
}

/// The processed form of one map, ready for registration.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFeatures {
    /// Down-sampled map without outliers.
    pub points: PointCloud,
    /// Normals of `points`.
    pub normals: Vec<[f64; 3]>,
    /// Detected keypoints.
    pub keypoints: PointCloud,
    /// One descriptor per keypoint.
    pub descriptors: DescriptorSet,
}

impl MapFeatures {
    /// Borrow the features as registration input.
    pub fn input(&self) -> RegistrationInput<'_> {
        RegistrationInput {
            points: &self.points,
            keypoints: &self.keypoints,
            descriptors: &self.descriptors,
        }
    }
}

fn extract_map_features<E: FeatureExtractor + ?Sized>(
    extractor: &E,
    map: &PointCloud,
    index: usize,
    params: &MapMergeParams,
) -> Result<MapFeatures, MapMergeError> {
    let points = extractor.downsample(map, params.resolution)?;
    let points = extractor.remove_outliers(
        &points,
        params.descriptor_radius,
        params.outliers_min_neighbours,
    )?;

    let normals = extractor.compute_surface_normals(&points, params.normal_radius)?;
    if normals.len() != points.len() {
        return Err(MapMergeError::FeatureExtraction {
            map: index,
            message: format!("{} normals for {} points", normals.len(), points.len()),
        });
    }

    let keypoints = extractor.detect_keypoints(
        &points,
        &normals,
        params.keypoint_type,
        params.keypoint_threshold,
        params.normal_radius,
        params.resolution,
    )?;
    let descriptors = extractor.compute_local_descriptors(
        &points,
        &normals,
        &keypoints,
        params.descriptor_type,
        params.descriptor_radius,
    )?;
    if descriptors.len() != keypoints.len() {
        return Err(MapMergeError::FeatureExtraction {
            map: index,
            message: format!(
                "{} descriptors for {} keypoints",
                descriptors.len(),
                keypoints.len()
            ),
        });
    }
    if descriptors.kind() != params.descriptor_type {
        return Err(MapMergeError::FeatureExtraction {
            map: index,
            message: format!(
                "expected {} descriptors, got {}",
                params.descriptor_type,
                descriptors.kind()
            ),
        });
    }

    log::debug!(
        "map {}: {} -> {} points, {} keypoints",
        index,
        map.len(),
        points.len(),
        keypoints.len()
    );

    Ok(MapFeatures {
        points,
        normals,
        keypoints,
        descriptors,
    })
}

/// Run the feature stage on every map, in parallel.
///
/// The stages are down-sampling, outlier removal, normals, keypoints and descriptors.
/// The output is parallel to `maps`.
pub fn compute_map_features<E: FeatureExtractor + ?Sized>(
    extractor: &E,
    maps: &[PointCloud],
    params: &MapMergeParams,
) -> Result<Vec<MapFeatures>, MapMergeError> {
    maps.par_iter()
        .enumerate()
        .map(|(index, map)| extract_map_features(extractor, map, index, params))
        .collect()
}
