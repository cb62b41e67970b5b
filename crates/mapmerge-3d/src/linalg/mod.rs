/// Rigid body alignment utilities (Kabsch)
pub mod rigid;

/// Singular Value Decomposition for 3x3 matrices
pub mod svd;

pub use rigid::{compute_centroids, fit_rigid_transform};
