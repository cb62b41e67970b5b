/// Errors raised while building the transform graph.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// The graph has no nodes.
    #[error("the transform graph has no nodes")]
    NoNodes,

    /// An edge refers to a node outside the graph.
    #[error("node {node} out of bounds for {num_nodes} nodes")]
    NodeOutOfBounds {
        /// Offending node index
        node: usize,
        /// Number of nodes in the graph
        num_nodes: usize,
    },

    /// Edges must be stored with `source_idx < target_idx`.
    #[error("edge ({source_idx}, {target_idx}) is not in canonical order")]
    NonCanonicalEdge {
        /// Stored source index
        source_idx: usize,
        /// Stored target index
        target_idx: usize,
    },

    /// No usable transform connects the two nodes.
    #[error("no transform between nodes {from} and {to}")]
    MissingEdge {
        /// Start node
        from: usize,
        /// End node
        to: usize,
    },

    /// The propagation root is not part of the tree.
    #[error("node {0} is not part of the spanning tree")]
    RootNotInTree(usize),
}
