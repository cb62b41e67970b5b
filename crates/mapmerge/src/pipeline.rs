use mapmerge_3d::PointCloud;
use mapmerge_graph::{compute_global_transforms, GlobalTransforms, SpanningTree, TransformEstimate};
use mapmerge_registration::register_pair;
use rayon::prelude::*;

use crate::compose::compose_maps;
use crate::error::MapMergeError;
use crate::features::{compute_map_features, FeatureExtractor, MapFeatures};
use crate::params::MapMergeParams;

/// Diagnostics of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    /// Pose of every map in the frame of `reference`.
    pub global_transforms: GlobalTransforms,
    /// One estimate per registered pair, in canonical pair order.
    pub estimates: Vec<TransformEstimate>,
    /// Estimates that entered the transform graph.
    pub accepted: Vec<TransformEstimate>,
    /// Estimates dropped by the confidence threshold.
    pub rejected: Vec<TransformEstimate>,
    /// Spanning tree used for the pose propagation.
    pub spanning_tree: SpanningTree,
    /// The map whose frame is the global frame.
    pub reference: usize,
}

/// Register every pair `(i, j)` with `i < j` whose maps both have keypoints.
///
/// Pairs are registered in parallel; the output follows the canonical pair order.
pub fn estimate_pairwise_transforms(
    features: &[MapFeatures],
    params: &MapMergeParams,
) -> Result<Vec<TransformEstimate>, MapMergeError> {
    let pairs = (0..features.len())
        .flat_map(|i| ((i + 1)..features.len()).map(move |j| (i, j)))
        .filter(|&(i, j)| !features[i].keypoints.is_empty() && !features[j].keypoints.is_empty())
        .collect::<Vec<_>>();

    log::info!("registering {} map pairs", pairs.len());

    let pairwise = params.pairwise_params();
    pairs
        .par_iter()
        .map(|&(i, j)| -> Result<TransformEstimate, MapMergeError> {
            let result = register_pair(&features[i].input(), &features[j].input(), &pairwise)?;
            log::info!(
                "pair ({}, {}): score {:?}, confidence {}",
                i,
                j,
                result.score,
                result.confidence
            );
            Ok(TransformEstimate::new(i, j, result.transform, result.confidence))
        })
        .collect()
}

/// Estimate the pose of every map in a common frame.
///
/// Runs the feature stage, registers all pairs and solves the transform graph.
pub fn estimate_maps_transforms<E: FeatureExtractor + ?Sized>(
    extractor: &E,
    maps: &[PointCloud],
    params: &MapMergeParams,
) -> Result<MergeReport, MapMergeError> {
    params.validate()?;
    if maps.is_empty() {
        return Err(MapMergeError::NoMaps);
    }

    let features = compute_map_features(extractor, maps, params)?;
    let estimates = estimate_pairwise_transforms(&features, params)?;
    let consensus = compute_global_transforms(&estimates, maps.len(), params.confidence_threshold)?;

    Ok(MergeReport {
        global_transforms: consensus.global_transforms,
        estimates,
        accepted: consensus.accepted,
        rejected: consensus.rejected,
        spanning_tree: consensus.spanning_tree,
        reference: consensus.reference,
    })
}

/// Merge `maps` into one map at `params.output_resolution`.
///
/// Maps that could not be registered are left out of the merged map; see
/// [`MergeReport::global_transforms`].
pub fn merge_maps<E: FeatureExtractor + ?Sized>(
    extractor: &E,
    maps: &[PointCloud],
    params: &MapMergeParams,
) -> Result<(PointCloud, MergeReport), MapMergeError> {
    let report = estimate_maps_transforms(extractor, maps, params)?;
    let merged = compose_maps(maps, &report.global_transforms, params.output_resolution)?;
    log::info!(
        "merged {} of {} maps into {} points",
        report.global_transforms.num_registered(),
        maps.len(),
        merged.len()
    );
    Ok((merged, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::KeypointKind;
    use mapmerge_3d::RigidTransform;
    use mapmerge_registration::{DescriptorKind, DescriptorSet};

    /// Extractor that finds no keypoints at all.
    struct Featureless;

    impl FeatureExtractor for Featureless {
        fn compute_surface_normals(
            &self,
            cloud: &PointCloud,
            _radius: f64,
        ) -> Result<Vec<[f64; 3]>, MapMergeError> {
            Ok(vec![[0.0, 0.0, 1.0]; cloud.len()])
        }

        fn detect_keypoints(
            &self,
            _cloud: &PointCloud,
            _normals: &[[f64; 3]],
            _kind: KeypointKind,
            _threshold: f64,
            _radius: f64,
            _resolution: f64,
        ) -> Result<PointCloud, MapMergeError> {
            Ok(PointCloud::default())
        }

        fn compute_local_descriptors(
            &self,
            _cloud: &PointCloud,
            _normals: &[[f64; 3]],
            _keypoints: &PointCloud,
            kind: DescriptorKind,
            _radius: f64,
        ) -> Result<DescriptorSet, MapMergeError> {
            Ok(DescriptorSet::empty(kind))
        }
    }

    fn params() -> MapMergeParams {
        MapMergeParams {
            outliers_min_neighbours: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_maps() {
        assert!(matches!(
            estimate_maps_transforms(&Featureless, &[], &params()),
            Err(MapMergeError::NoMaps)
        ));
    }

    #[test]
    fn test_invalid_params() {
        let params = MapMergeParams {
            output_resolution: -1.0,
            ..params()
        };
        let map = PointCloud::from_points(vec![[0.0; 3]]);
        assert!(matches!(
            merge_maps(&Featureless, &[map], &params),
            Err(MapMergeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_featureless_maps_are_not_paired() -> Result<(), MapMergeError> {
        let maps = vec![
            PointCloud::from_points(vec![[0.0, 0.0, 0.0]]),
            PointCloud::from_points(vec![[5.0, 0.0, 0.0]]),
        ];
        let (merged, report) = merge_maps(&Featureless, &maps, &params())?;

        assert!(report.estimates.is_empty());
        assert_eq!(report.reference, 0);
        assert_eq!(
            report.global_transforms,
            GlobalTransforms::from(vec![Some(RigidTransform::IDENTITY), None])
        );
        // only the reference map is kept
        assert_eq!(merged.points(), &[[0.0, 0.0, 0.0]]);
        Ok(())
    }
}
