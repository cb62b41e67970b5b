#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for the graph module.
pub mod error;

/// Pairwise transform estimates, the edges of the graph.
pub mod estimate;

/// Confidence filtering, connected components and spanning trees.
pub mod graph;

/// Global pose propagation along the spanning tree.
pub mod propagation;

/// Disjoint-set forest.
pub mod union_find;

pub use error::GraphError;
pub use estimate::TransformEstimate;
pub use graph::{
    filter_edges, largest_connected_component, max_spanning_tree, Component, SpanningTree,
};
pub use propagation::{
    compute_global_transforms, propagate_global_transforms, Consensus, GlobalTransforms,
};
