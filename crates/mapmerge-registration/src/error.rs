use mapmerge_3d::Point3dError;

use crate::descriptors::DescriptorKind;

/// Errors raised by the registration primitives.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    /// A descriptor set holds no descriptors.
    #[error("{0} descriptors must contain at least one descriptor")]
    EmptyDescriptors(&'static str),

    /// A point cloud holds no points.
    #[error("{0} point cloud is empty")]
    EmptyPointCloud(&'static str),

    /// Two descriptor sets of different kinds were compared.
    #[error("cannot match {left} descriptors against {right} descriptors")]
    MismatchedDescriptorKinds {
        /// Kind of the first set
        left: DescriptorKind,
        /// Kind of the second set
        right: DescriptorKind,
    },

    /// The raw descriptor buffer does not split into whole descriptors.
    #[error("descriptor buffer of length {len} is not a multiple of the {kind} dimension {dimension}")]
    InvalidDescriptorLength {
        /// Descriptor kind
        kind: DescriptorKind,
        /// Buffer length
        len: usize,
        /// Expected dimension of one descriptor
        dimension: usize,
    },

    /// Keypoints and descriptors are not parallel-indexed.
    #[error("{keypoints} keypoints but {descriptors} descriptors")]
    KeypointDescriptorMismatch {
        /// Number of keypoints
        keypoints: usize,
        /// Number of descriptors
        descriptors: usize,
    },

    /// A correspondence refers to a point that does not exist.
    #[error("correspondence index {index} out of bounds for {len} points")]
    CorrespondenceOutOfBounds {
        /// Offending index
        index: usize,
        /// Number of points
        len: usize,
    },

    /// A parameter is outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// A registration score must be strictly positive to be turned into a confidence.
    #[error("transform score {0} is not strictly positive")]
    NonPositiveScore(f64),

    /// An unknown name was given for a descriptor kind or estimation method.
    #[error("unknown {what}: {name}")]
    UnknownName {
        /// What was being parsed
        what: &'static str,
        /// The name that failed to parse
        name: String,
    },

    /// Error from the geometry primitives.
    #[error(transparent)]
    Point3d(#[from] Point3dError),
}
