/// Error types for the 3d module.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Point3dError {
    /// The rotation axis has (close to) zero length.
    #[error("cannot compute rotation matrix from a zero vector")]
    ZeroRotationAxis,

    /// The matrix is not a proper rigid transform.
    #[error("matrix is not a rigid transform: {0}")]
    NotRigid(&'static str),

    /// A grid resolution or leaf size must be strictly positive and finite.
    #[error("invalid resolution {0}, expected a positive finite value")]
    InvalidResolution(f64),

    /// Two parallel arrays have different lengths.
    #[error("Mismatched array lengths: {left_name} ({left_len}) != {right_name} ({right_len})")]
    MismatchedArrayLengths {
        /// Label for the left-hand slice
        left_name: &'static str,
        /// Length of the left-hand slice
        left_len: usize,
        /// Label for the right-hand slice
        right_name: &'static str,
        /// Length of the right-hand slice
        right_len: usize,
    },

    /// Not enough points to fit the requested model.
    #[error("at least {required} points are required, got {actual}")]
    InsufficientPoints {
        /// Minimum number of points
        required: usize,
        /// Number of points provided
        actual: usize,
    },
}
