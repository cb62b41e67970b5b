use std::ops::Mul;

use glam::{DMat3, DMat4, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::Point3dError;

/// Tolerance used when checking that a matrix is a proper rigid transform.
const RIGID_TOLERANCE: f64 = 1e-6;

/// A rigid transform (rotation + translation) in 3D.
///
/// Applying the transform to a point computes `R * p + t`. Composition with `*`
/// follows the matrix convention: `(a * b).transform_point(p) == a.transform_point(b.transform_point(p))`.
///
/// There is no sentinel value: code that needs to express "no transform" uses
/// `Option<RigidTransform>`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[[f64; 4]; 4]", try_from = "[[f64; 4]; 4]")]
pub struct RigidTransform {
    rotation: DMat3,
    translation: DVec3,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: DMat3::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Create a transform from a row-major rotation matrix and a translation vector.
    ///
    /// PRECONDITION: `rotation` is orthonormal with determinant 1.
    pub fn from_rotation_translation(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation: DMat3::from_cols_array_2d(&rotation).transpose(),
            translation: DVec3::from_array(translation),
        }
    }

    /// Create a transform from glam types.
    ///
    /// PRECONDITION: `rotation` is orthonormal with determinant 1.
    pub fn from_parts(rotation: DMat3, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// A pure translation.
    pub fn from_translation(translation: [f64; 3]) -> Self {
        Self::from_parts(DMat3::IDENTITY, DVec3::from_array(translation))
    }

    /// Create a transform from a row-major homogeneous 4x4 matrix.
    ///
    /// The matrix must have a `[0, 0, 0, 1]` last row and an orthonormal rotation
    /// block with determinant 1. In particular the all-zero matrix is rejected.
    pub fn from_matrix(matrix: &[[f64; 4]; 4]) -> Result<Self, Point3dError> {
        let last_row = matrix[3];
        if last_row[0].abs() > RIGID_TOLERANCE
            || last_row[1].abs() > RIGID_TOLERANCE
            || last_row[2].abs() > RIGID_TOLERANCE
            || (last_row[3] - 1.0).abs() > RIGID_TOLERANCE
        {
            return Err(Point3dError::NotRigid("last row must be [0, 0, 0, 1]"));
        }

        let rows = [
            [matrix[0][0], matrix[0][1], matrix[0][2]],
            [matrix[1][0], matrix[1][1], matrix[1][2]],
            [matrix[2][0], matrix[2][1], matrix[2][2]],
        ];
        let rotation = DMat3::from_cols_array_2d(&rows).transpose();

        let gram = rotation.transpose() * rotation;
        if !gram.abs_diff_eq(DMat3::IDENTITY, RIGID_TOLERANCE) {
            return Err(Point3dError::NotRigid("rotation block is not orthonormal"));
        }
        if (rotation.determinant() - 1.0).abs() > RIGID_TOLERANCE {
            return Err(Point3dError::NotRigid("rotation block is a reflection"));
        }

        Ok(Self {
            rotation,
            translation: DVec3::new(matrix[0][3], matrix[1][3], matrix[2][3]),
        })
    }

    /// The transform as a row-major homogeneous 4x4 matrix.
    pub fn to_matrix(&self) -> [[f64; 4]; 4] {
        let r = self.rotation_array();
        let t = self.translation;
        [
            [r[0][0], r[0][1], r[0][2], t.x],
            [r[1][0], r[1][1], r[1][2], t.y],
            [r[2][0], r[2][1], r[2][2], t.z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// The transform as a glam homogeneous matrix.
    pub fn to_dmat4(&self) -> DMat4 {
        DMat4::from_cols(
            self.rotation.x_axis.extend(0.0),
            self.rotation.y_axis.extend(0.0),
            self.rotation.z_axis.extend(0.0),
            self.translation.extend(1.0),
        )
    }

    /// The rotation block.
    #[inline]
    pub fn rotation(&self) -> DMat3 {
        self.rotation
    }

    /// The translation vector.
    #[inline]
    pub fn translation(&self) -> DVec3 {
        self.translation
    }

    /// The rotation block as a row-major array.
    pub fn rotation_array(&self) -> [[f64; 3]; 3] {
        self.rotation.transpose().to_cols_array_2d()
    }

    /// The inverse transform: `R' = R^T`, `t' = -R^T * t`.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Transform a single point.
    #[inline]
    pub fn transform_point(&self, point: &[f64; 3]) -> [f64; 3] {
        (self.rotation * DVec3::from_array(*point) + self.translation).to_array()
    }

    /// Rotate a direction vector (no translation).
    #[inline]
    pub fn rotate_vector(&self, vector: &[f64; 3]) -> [f64; 3] {
        (self.rotation * DVec3::from_array(*vector)).to_array()
    }

    /// Transform a set of points.
    pub fn transform_points(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        points.iter().map(|p| self.transform_point(p)).collect()
    }

    /// The rotation angle in radians, in `[0, pi]`.
    pub fn rotation_angle(&self) -> f64 {
        let cos_angle = 0.5 * (self.rotation.x_axis.x + self.rotation.y_axis.y + self.rotation.z_axis.z - 1.0);
        cos_angle.clamp(-1.0, 1.0).acos()
    }

    /// Element-wise comparison of the homogeneous matrices.
    pub fn abs_diff_eq(&self, other: &Self, max_abs_diff: f64) -> bool {
        self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
            && self.translation.abs_diff_eq(other.translation, max_abs_diff)
    }

    /// Whether the transform is the identity up to `max_abs_diff`.
    pub fn is_identity(&self, max_abs_diff: f64) -> bool {
        self.abs_diff_eq(&Self::IDENTITY, max_abs_diff)
    }
}

impl Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        RigidTransform {
            rotation: self.rotation * rhs.rotation,
            translation: self.rotation * rhs.translation + self.translation,
        }
    }
}

impl From<RigidTransform> for [[f64; 4]; 4] {
    fn from(transform: RigidTransform) -> Self {
        transform.to_matrix()
    }
}

impl TryFrom<[[f64; 4]; 4]> for RigidTransform {
    type Error = Point3dError;

    fn try_from(matrix: [[f64; 4]; 4]) -> Result<Self, Self::Error> {
        RigidTransform::from_matrix(&matrix)
    }
}

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation. It does not need to be normalized.
/// * `angle` - The angle of rotation.
///
/// # Returns
///
/// The row-major rotation matrix.
///
/// Example:
///
/// ```
/// use mapmerge_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let axis = [1.0, 0.0, 0.0];
/// let angle = std::f64::consts::PI / 2.0;
/// let rotation = axis_angle_to_rotation_matrix(&axis, angle).unwrap();
/// assert!((rotation[1][2] + 1.0).abs() < 1e-12);
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], Point3dError> {
    let axis = DVec3::from_array(*axis);
    if axis.length() < 1e-10 {
        return Err(Point3dError::ZeroRotationAxis);
    }
    let rotation = DMat3::from_axis_angle(axis.normalize(), angle);
    Ok(rotation.transpose().to_cols_array_2d())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_transform() -> Result<RigidTransform, Point3dError> {
        let rotation = axis_angle_to_rotation_matrix(&[0.3, -0.2, 1.0], 0.7)?;
        Ok(RigidTransform::from_rotation_translation(
            rotation,
            [1.0, -2.0, 0.5],
        ))
    }

    #[test]
    fn test_axis_angle_to_rotation_matrix() -> Result<(), Box<dyn std::error::Error>> {
        let axis = [1.0, 0.0, 0.0];
        let angle = std::f64::consts::PI / 2.0;
        let rotation = axis_angle_to_rotation_matrix(&axis, angle)?;
        let expected = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rotation[i][j], expected[i][j], epsilon = 1e-12);
            }
        }
        assert_eq!(
            axis_angle_to_rotation_matrix(&[0.0; 3], 1.0),
            Err(Point3dError::ZeroRotationAxis)
        );
        Ok(())
    }

    #[test]
    fn test_inverse_roundtrip() -> Result<(), Point3dError> {
        let transform = sample_transform()?;
        assert!((transform * transform.inverse()).is_identity(1e-12));
        assert!((transform.inverse() * transform).is_identity(1e-12));

        let p = [0.4, 5.0, -1.0];
        let back = transform.inverse().transform_point(&transform.transform_point(&p));
        for i in 0..3 {
            assert_relative_eq!(back[i], p[i], epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_composition_order() -> Result<(), Point3dError> {
        let a = sample_transform()?;
        let b = RigidTransform::from_translation([0.0, 3.0, 0.0]);
        let p = [1.0, 1.0, 1.0];
        let composed = (a * b).transform_point(&p);
        let chained = a.transform_point(&b.transform_point(&p));
        for i in 0..3 {
            assert_relative_eq!(composed[i], chained[i], epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_matrix_roundtrip() -> Result<(), Point3dError> {
        let transform = sample_transform()?;
        let matrix = transform.to_matrix();
        let restored = RigidTransform::from_matrix(&matrix)?;
        assert!(restored.abs_diff_eq(&transform, 1e-12));

        let homogeneous = transform.to_dmat4();
        let p = transform.transform_point(&[1.0, 2.0, 3.0]);
        let q = homogeneous.transform_point3(DVec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(p[0], q.x, epsilon = 1e-12);
        assert_relative_eq!(p[1], q.y, epsilon = 1e-12);
        assert_relative_eq!(p[2], q.z, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_zero_matrix_is_not_rigid() {
        assert!(RigidTransform::from_matrix(&[[0.0; 4]; 4]).is_err());

        let mut reflection = RigidTransform::IDENTITY.to_matrix();
        reflection[2][2] = -1.0;
        assert!(RigidTransform::from_matrix(&reflection).is_err());
    }

    #[test]
    fn test_rotation_angle() -> Result<(), Point3dError> {
        let rotation = axis_angle_to_rotation_matrix(&[0.0, 1.0, 0.0], 0.25)?;
        let transform = RigidTransform::from_rotation_translation(rotation, [0.0; 3]);
        assert_relative_eq!(transform.rotation_angle(), 0.25, epsilon = 1e-12);
        assert_relative_eq!(RigidTransform::IDENTITY.rotation_angle(), 0.0);
        Ok(())
    }
}
