#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for the 3d module.
pub mod error;

/// Nearest-neighbour search over 3D points.
pub mod kdtree;

/// Linear algebra utilities.
pub mod linalg;

/// Point cloud container.
pub mod pointcloud;

/// 3D rigid transforms.
pub mod transforms;

/// Voxel grid down-sampling.
pub mod voxel_grid;

pub use error::Point3dError;
pub use pointcloud::PointCloud;
pub use transforms::RigidTransform;
