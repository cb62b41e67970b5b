#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Map composition in the reference frame.
pub mod compose;

/// Error types for the pipeline.
pub mod error;

/// Feature extraction collaborators and the per-map feature stage.
pub mod features;

/// Pipeline configuration.
pub mod params;

/// All-pairs registration and global pose estimation.
pub mod pipeline;

pub use compose::compose_maps;
pub use error::MapMergeError;
pub use features::{compute_map_features, FeatureExtractor, KeypointKind, MapFeatures};
pub use params::MapMergeParams;
pub use pipeline::{estimate_maps_transforms, estimate_pairwise_transforms, merge_maps, MergeReport};

#[doc(inline)]
pub use mapmerge_3d as geometry;

#[doc(inline)]
pub use mapmerge_graph as graph;

#[doc(inline)]
pub use mapmerge_registration as registration;
