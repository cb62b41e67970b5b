use mapmerge_3d::RigidTransform;
use serde::{Deserialize, Serialize};

/// A pairwise transform between two maps: an edge of the transform graph.
///
/// `transform` maps points of `source_idx` into the frame of `target_idx`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformEstimate {
    /// Index of the source map, always lower than `target_idx`.
    pub source_idx: usize,
    /// Index of the target map.
    pub target_idx: usize,
    /// Estimated transform, `None` if the registration failed.
    pub transform: Option<RigidTransform>,
    /// Confidence of the estimate, higher is better.
    pub confidence: f64,
}

impl TransformEstimate {
    /// Create an estimate.
    pub fn new(
        source_idx: usize,
        target_idx: usize,
        transform: Option<RigidTransform>,
        confidence: f64,
    ) -> Self {
        Self {
            source_idx,
            target_idx,
            transform,
            confidence,
        }
    }

    /// Whether the edge connects `a` and `b`, in either direction.
    pub fn connects(&self, a: usize, b: usize) -> bool {
        (self.source_idx == a && self.target_idx == b)
            || (self.source_idx == b && self.target_idx == a)
    }

    /// The transform mapping points of `to` into the frame of `from`.
    ///
    /// The stored transform maps source into target, so it is inverted when `from` is the
    /// stored source. Returns `None` if the edge does not join the two nodes or has no
    /// transform.
    pub fn oriented(&self, from: usize, to: usize) -> Option<RigidTransform> {
        let transform = self.transform?;
        if self.source_idx == from && self.target_idx == to {
            Some(transform.inverse())
        } else if self.source_idx == to && self.target_idx == from {
            Some(transform)
        } else {
            None
        }
    }
}
