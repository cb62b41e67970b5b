use std::collections::BTreeMap;

use glam::DVec3;

use crate::error::Point3dError;
use crate::pointcloud::PointCloud;

#[derive(Debug, Default, Clone)]
struct Voxel {
    point_sum: DVec3,
    normal_sum: DVec3,
    color_sum: [u32; 3],
    count: usize,
}

/// A voxel grid for organizing and downsampling point clouds.
///
/// Voxels are indexed by `floor(p / leaf_size)` and stored in a sorted map, so
/// the output order of [`VoxelGrid::downsample`] only depends on the occupied
/// voxels and not on the insertion order.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    leaf_size: f64,
    grid: BTreeMap<[i64; 3], Voxel>,
    has_normals: bool,
    has_colors: bool,
}

impl VoxelGrid {
    /// Create a new VoxelGrid with the specified cubic leaf size.
    pub fn new(leaf_size: f64) -> Result<Self, Point3dError> {
        if !(leaf_size.is_finite() && leaf_size > 0.0) {
            return Err(Point3dError::InvalidResolution(leaf_size));
        }
        Ok(Self {
            leaf_size,
            grid: BTreeMap::new(),
            has_normals: true,
            has_colors: true,
        })
    }

    /// The leaf size of the grid.
    pub fn leaf_size(&self) -> f64 {
        self.leaf_size
    }

    /// Number of occupied voxels.
    pub fn num_voxels(&self) -> usize {
        self.grid.len()
    }

    /// Add points from a point cloud to the voxel grid.
    ///
    /// Normals and colors are only averaged if every added cloud carries them.
    pub fn add_points(&mut self, pointcloud: &PointCloud) {
        if pointcloud.is_empty() {
            return;
        }
        self.has_normals &= pointcloud.normals().is_some();
        self.has_colors &= pointcloud.colors().is_some();

        let normals = pointcloud.normals();
        let colors = pointcloud.colors();

        for (i, point) in pointcloud.points().iter().enumerate() {
            let index = self.compute_voxel_index(point);
            let voxel = self.grid.entry(index).or_default();
            voxel.point_sum += DVec3::from_array(*point);
            if let Some(n) = normals.and_then(|n| n.get(i)) {
                voxel.normal_sum += DVec3::from_array(*n);
            }
            if let Some(c) = colors.and_then(|c| c.get(i)) {
                voxel.color_sum[0] += c[0] as u32;
                voxel.color_sum[1] += c[1] as u32;
                voxel.color_sum[2] += c[2] as u32;
            }
            voxel.count += 1;
        }
    }

    /// Compute the voxel index for a given point.
    fn compute_voxel_index(&self, point: &[f64; 3]) -> [i64; 3] {
        [
            (point[0] / self.leaf_size).floor() as i64,
            (point[1] / self.leaf_size).floor() as i64,
            (point[2] / self.leaf_size).floor() as i64,
        ]
    }

    /// Downsample the point cloud by averaging points in each voxel.
    pub fn downsample(&self) -> PointCloud {
        let num_voxels = self.grid.len();
        let mut points = Vec::with_capacity(num_voxels);
        let mut normals = Vec::with_capacity(if self.has_normals { num_voxels } else { 0 });
        let mut colors = Vec::with_capacity(if self.has_colors { num_voxels } else { 0 });

        for voxel in self.grid.values() {
            let n = voxel.count as f64;
            points.push((voxel.point_sum / n).to_array());
            if self.has_normals {
                normals.push(voxel.normal_sum.normalize_or_zero().to_array());
            }
            if self.has_colors {
                let count = voxel.count as u32;
                colors.push([
                    (voxel.color_sum[0] / count) as u8,
                    (voxel.color_sum[1] / count) as u8,
                    (voxel.color_sum[2] / count) as u8,
                ]);
            }
        }

        let is_empty = points.is_empty();
        PointCloud::new(
            points,
            (self.has_colors && !is_empty).then_some(colors),
            (self.has_normals && !is_empty).then_some(normals),
        )
    }
}

/// Downsample a point cloud on a cubic voxel grid of side `resolution`.
///
/// Every occupied voxel is replaced by the centroid of its points.
pub fn voxel_downsample(cloud: &PointCloud, resolution: f64) -> Result<PointCloud, Point3dError> {
    let mut grid = VoxelGrid::new(resolution)?;
    grid.add_points(cloud);
    Ok(grid.downsample())
}
