#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Reciprocal descriptor matching.
pub mod correspondence;

/// Descriptor kinds and descriptor sets.
pub mod descriptors;

/// Error types for the registration module.
pub mod error;

/// Point to point ICP refinement.
pub mod icp;

/// Sample consensus initial alignment (SAC-IA) on keypoints and descriptors.
pub mod initial_alignment;

/// Pairwise registration orchestration.
pub mod pairwise;

/// RANSAC rejection of putative correspondences with a rigid model.
pub mod ransac;

/// Registration quality scores.
pub mod score;

pub use correspondence::{find_feature_correspondences, Correspondence};
pub use descriptors::{DescriptorKind, DescriptorSet};
pub use error::RegistrationError;
pub use pairwise::{
    estimate_transform, register_pair, EstimationMethod, PairwiseParams, PairwiseRegistration,
    RegistrationInput,
};
