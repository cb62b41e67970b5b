use mapmerge_3d::Point3dError;
use mapmerge_graph::GraphError;
use mapmerge_registration::RegistrationError;

/// Errors raised by the map merging pipeline.
#[derive(thiserror::Error, Debug)]
pub enum MapMergeError {
    /// Nothing to merge.
    #[error("at least one map is required")]
    NoMaps,

    /// Maps and transforms are not parallel-indexed.
    #[error("{maps} maps but {transforms} transforms")]
    MismatchedTransforms {
        /// Number of maps
        maps: usize,
        /// Number of transforms
        transforms: usize,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An unknown name was given for a keypoint kind.
    #[error("unknown {what}: {name}")]
    UnknownName {
        /// What was being parsed
        what: &'static str,
        /// The name that failed to parse
        name: String,
    },

    /// A feature extraction collaborator failed.
    #[error("feature extraction failed for map {map}: {message}")]
    FeatureExtraction {
        /// Index of the map
        map: usize,
        /// Description of the failure
        message: String,
    },

    /// Failed to read a configuration file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Failed to parse a configuration.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Error from the geometry primitives.
    #[error(transparent)]
    Point3d(#[from] Point3dError),

    /// Error from the pairwise registration.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Error from the transform graph.
    #[error(transparent)]
    Graph(#[from] GraphError),
}
