
use crate::transforms::RigidTransform;

/// A point cloud with points, colors, and normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Option<Vec<[u8; 3]>>,
    // The normals of the points.
    normals: Option<Vec<[f64; 3]>>,
}

impl PointCloud {
    /// Create a new point cloud from points, colors (optional), and normals (optional).
    ///
    /// PRECONDITION: colors and normals, when given, are parallel to the points.
    pub fn new(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Self {
        Self {
            points,
            colors,
            normals,
        }
    }

    /// Create a point cloud holding only positions.
    pub fn from_points(points: Vec<[f64; 3]>) -> Self {
        Self::new(points, None, None)
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&[[u8; 3]]> {
        self.colors.as_deref()
    }

    /// Get as reference the normals of the points in the point cloud.
    pub fn normals(&self) -> Option<&[[f64; 3]]> {
        self.normals.as_deref()
    }

    /// Apply a rigid transform to every point (and rotate the normals).
    ///
    /// Colors are carried over unchanged.
    pub fn transformed(&self, transform: &RigidTransform) -> PointCloud {
        let points = transform.transform_points(&self.points);
        let normals = self.normals.as_ref().map(|normals| {
            normals
                .iter()
                .map(|n| transform.rotate_vector(n))
                .collect::<Vec<_>>()
        });
        PointCloud::new(points, self.colors.clone(), normals)
    }

    /// Append the points of `other` to this cloud.
    ///
    /// An attribute (colors or normals) survives only if both clouds carry it,
    /// or if this cloud was empty before appending.
    pub fn append(&mut self, other: &PointCloud) {
        if self.points.is_empty() {
            self.colors = other.colors.clone();
            self.normals = other.normals.clone();
            self.points.extend_from_slice(&other.points);
            return;
        }

        self.colors = match (self.colors.take(), other.colors()) {
            (Some(mut mine), Some(theirs)) => {
                mine.extend_from_slice(theirs);
                Some(mine)
            }
            _ => None,
        };
        self.normals = match (self.normals.take(), other.normals()) {
            (Some(mut mine), Some(theirs)) => {
                mine.extend_from_slice(theirs);
                Some(mine)
            }
            _ => None,
        };
        self.points.extend_from_slice(&other.points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pointcloud() {
        let pointcloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            Some(vec![[255, 0, 0], [0, 255, 0]]),
            Some(vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]),
        );

        assert_eq!(pointcloud.len(), 2);
        assert_eq!(pointcloud.points().len(), 2);
        assert_eq!(pointcloud.colors().map(|c| c.len()), Some(2));
        assert_eq!(pointcloud.normals().map(|n| n.len()), Some(2));
        assert_eq!(pointcloud.points()[1], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_transformed_rotates_normals() -> Result<(), Box<dyn std::error::Error>> {
        let rotation = crate::transforms::axis_angle_to_rotation_matrix(
            &[0.0, 0.0, 1.0],
            std::f64::consts::FRAC_PI_2,
        )?;
        let transform = RigidTransform::from_rotation_translation(rotation, [1.0, 0.0, 0.0]);

        let cloud = PointCloud::new(vec![[1.0, 0.0, 0.0]], None, Some(vec![[1.0, 0.0, 0.0]]));
        let moved = cloud.transformed(&transform);

        let p = moved.points()[0];
        assert_relative_eq!(p[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 1.0, epsilon = 1e-12);

        let n = moved.normals().map(|n| n[0]).unwrap_or_default();
        assert_relative_eq!(n[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(n[1], 1.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_append_drops_partial_attributes() {
        let mut cloud = PointCloud::new(vec![[0.0; 3]], Some(vec![[1, 2, 3]]), None);
        cloud.append(&PointCloud::new(vec![[1.0; 3]], Some(vec![[4, 5, 6]]), None));
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.colors().map(|c| c.len()), Some(2));

        cloud.append(&PointCloud::from_points(vec![[2.0; 3]]));
        assert_eq!(cloud.len(), 3);
        assert!(cloud.colors().is_none());
    }
}
