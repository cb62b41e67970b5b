use mapmerge_3d::voxel_grid::voxel_downsample;
use mapmerge_3d::PointCloud;
use mapmerge_graph::GlobalTransforms;

use crate::error::MapMergeError;

/// Merge `maps` into one cloud in the reference frame.
///
/// Every registered map is moved by its global transform and appended; unregistered maps
/// are skipped. The combined cloud is then down-sampled to `resolution`.
///
/// # Errors
///
/// Fails if `maps` and `transforms` differ in length or `resolution` is not positive.
pub fn compose_maps(
    maps: &[PointCloud],
    transforms: &GlobalTransforms,
    resolution: f64,
) -> Result<PointCloud, MapMergeError> {
    if maps.len() != transforms.len() {
        return Err(MapMergeError::MismatchedTransforms {
            maps: maps.len(),
            transforms: transforms.len(),
        });
    }

    let mut merged = PointCloud::default();
    for (index, (map, transform)) in maps.iter().zip(transforms.iter()).enumerate() {
        match transform {
            Some(transform) => merged.append(&map.transformed(transform)),
            None => log::debug!("map {} is not registered, skipping", index),
        }
    }

    Ok(voxel_downsample(&merged, resolution)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapmerge_3d::{Point3dError, RigidTransform};

    #[test]
    fn test_compose_two_maps() -> Result<(), MapMergeError> {
        let map0 = PointCloud::from_points(vec![[0.5, 0.5, 0.5]]);
        let map1 = PointCloud::from_points(vec![[0.5, 0.5, 0.5]]);
        let transforms = GlobalTransforms::from(vec![
            Some(RigidTransform::IDENTITY),
            Some(RigidTransform::from_translation([2.0, 0.0, 0.0])),
        ]);

        let merged = compose_maps(&[map0, map1], &transforms, 1.0)?;
        assert_eq!(merged.points(), &[[0.5, 0.5, 0.5], [2.5, 0.5, 0.5]]);
        Ok(())
    }

    #[test]
    fn test_compose_overlap_is_merged() -> Result<(), MapMergeError> {
        let map = PointCloud::from_points(vec![[0.25, 0.25, 0.25]]);
        let transforms = GlobalTransforms::from(vec![
            Some(RigidTransform::IDENTITY),
            Some(RigidTransform::from_translation([0.5, 0.5, 0.5])),
        ]);

        let merged = compose_maps(&[map.clone(), map], &transforms, 1.0)?;
        assert_eq!(merged.points(), &[[0.5, 0.5, 0.5]]);
        Ok(())
    }

    fn scattered_maps() -> Vec<PointCloud> {
        (0..3)
            .map(|k| {
                let offset = 10.0 * k as f64;
                PointCloud::from_points(vec![
                    [offset + 0.1, 0.2, 0.3],
                    [offset + 0.2, 0.1, 0.3],
                    [offset + 2.5, 1.5, 0.5],
                    [offset + 4.0, 0.5, 3.5],
                ])
            })
            .collect()
    }

    #[test]
    fn test_compose_all_unregistered() -> Result<(), MapMergeError> {
        let maps = scattered_maps();
        let merged = compose_maps(&maps, &GlobalTransforms::unregistered(maps.len()), 0.5)?;
        assert!(merged.is_empty());
        Ok(())
    }

    #[test]
    fn test_compose_single_registered_map() -> Result<(), MapMergeError> {
        let maps = scattered_maps();
        let transforms =
            GlobalTransforms::from(vec![None, Some(RigidTransform::IDENTITY), None]);

        let merged = compose_maps(&maps, &transforms, 0.5)?;
        assert_eq!(merged, voxel_downsample(&maps[1], 0.5)?);
        // the first two points share a voxel
        assert_eq!(merged.len(), 3);
        Ok(())
    }

    #[test]
    fn test_compose_errors() {
        let map = PointCloud::from_points(vec![[0.0; 3]]);
        assert!(matches!(
            compose_maps(&[map.clone()], &GlobalTransforms::unregistered(2), 1.0),
            Err(MapMergeError::MismatchedTransforms {
                maps: 1,
                transforms: 2
            })
        ));
        assert!(matches!(
            compose_maps(&[map], &GlobalTransforms::unregistered(1), 0.0),
            Err(MapMergeError::Point3d(Point3dError::InvalidResolution(_)))
        ));
    }
}
