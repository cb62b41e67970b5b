use mapmerge_3d::{Point3dError, RigidTransform};
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::estimate::TransformEstimate;
use crate::graph::{filter_edges, largest_connected_component, max_spanning_tree, SpanningTree};

/// One optional pose per map, relative to the reference map.
///
/// `Some(t)` maps points of the map into the reference frame; `None` marks a map that
/// could not be registered.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalTransforms(Vec<Option<RigidTransform>>);

impl GlobalTransforms {
    /// A table of `num_nodes` unregistered maps.
    pub fn unregistered(num_nodes: usize) -> Self {
        Self(vec![None; num_nodes])
    }

    /// Number of maps.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The pose of map `index`, if registered.
    pub fn get(&self, index: usize) -> Option<&RigidTransform> {
        self.0.get(index).and_then(Option::as_ref)
    }

    /// Set the pose of map `index`.
    pub fn set(&mut self, index: usize, transform: RigidTransform) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = Some(transform);
        }
    }

    /// Iterate over all entries in map order.
    pub fn iter(&self) -> impl Iterator<Item = Option<&RigidTransform>> {
        self.0.iter().map(Option::as_ref)
    }

    /// Number of registered maps.
    pub fn num_registered(&self) -> usize {
        self.0.iter().filter(|t| t.is_some()).count()
    }

    /// Export as homogeneous matrices, with the all-zero matrix for unregistered maps.
    pub fn to_matrices(&self) -> Vec<[[f64; 4]; 4]> {
        self.0
            .iter()
            .map(|t| t.map_or([[0.0; 4]; 4], |t| t.to_matrix()))
            .collect()
    }

    /// Import homogeneous matrices, reading the all-zero matrix as unregistered.
    pub fn from_matrices(matrices: &[[[f64; 4]; 4]]) -> Result<Self, Point3dError> {
        matrices
            .iter()
            .map(|m| {
                if m.iter().flatten().all(|&v| v == 0.0) {
                    Ok(None)
                } else {
                    RigidTransform::from_matrix(m).map(Some)
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl From<Vec<Option<RigidTransform>>> for GlobalTransforms {
    fn from(transforms: Vec<Option<RigidTransform>>) -> Self {
        Self(transforms)
    }
}

impl std::ops::Index<usize> for GlobalTransforms {
    type Output = Option<RigidTransform>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// Chain the tree edges from `root` into one pose per map.
///
/// The root gets the identity; every tree edge `(from, to)` visited breadth-first sets
/// `global[to] = global[from] * T`, where `T` maps points of `to` into the frame of `from`.
/// Maps outside the tree stay unregistered.
pub fn propagate_global_transforms(
    tree: &SpanningTree,
    root: usize,
    estimates: &[TransformEstimate],
    num_nodes: usize,
) -> Result<GlobalTransforms, GraphError> {
    if !tree.contains(root) {
        return Err(GraphError::RootNotInTree(root));
    }
    if root >= num_nodes {
        return Err(GraphError::NodeOutOfBounds {
            node: root,
            num_nodes,
        });
    }

    let mut global = GlobalTransforms::unregistered(num_nodes);
    global.set(root, RigidTransform::IDENTITY);

    let mut result = Ok(());
    tree.walk_breadth_first(root, |from, to| {
        if result.is_err() {
            return;
        }
        let edge = estimates
            .iter()
            .find_map(|e| e.oriented(from, to))
            .ok_or(GraphError::MissingEdge { from, to });
        match (edge, global.get(from).copied()) {
            (Ok(edge), Some(pose)) => global.set(to, pose * edge),
            (Err(e), _) => result = Err(e),
            (Ok(_), None) => result = Err(GraphError::MissingEdge { from, to }),
        }
    });
    result?;

    Ok(global)
}

/// Outcome of the multi-view consensus over all pairwise estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct Consensus {
    /// Pose of every map relative to `reference`.
    pub global_transforms: GlobalTransforms,
    /// Estimates that passed the confidence threshold.
    pub accepted: Vec<TransformEstimate>,
    /// Estimates below the threshold or without a transform.
    pub rejected: Vec<TransformEstimate>,
    /// Maximum confidence spanning tree of the largest component.
    pub spanning_tree: SpanningTree,
    /// The map used as reference frame.
    pub reference: usize,
}

/// Turn pairwise estimates into globally consistent poses.
///
/// Filters the estimates by confidence, keeps the largest connected component, builds its
/// maximum spanning tree and propagates poses from the lowest tree center.
pub fn compute_global_transforms(
    estimates: &[TransformEstimate],
    num_nodes: usize,
    confidence_threshold: f64,
) -> Result<Consensus, GraphError> {
    let (accepted, rejected) = filter_edges(estimates, confidence_threshold);
    log::info!(
        "{} of {} pairwise estimates above confidence {}",
        accepted.len(),
        estimates.len(),
        confidence_threshold
    );

    let component = largest_connected_component(num_nodes, &accepted)?;
    let spanning_tree = max_spanning_tree(num_nodes, &component)?;

    let centers = spanning_tree.centers();
    let reference = *centers.first().ok_or(GraphError::NoNodes)?;

    let global_transforms =
        propagate_global_transforms(&spanning_tree, reference, &component.edges, num_nodes)?;

    log::info!(
        "reference map {}, {} of {} maps registered",
        reference,
        global_transforms.num_registered(),
        num_nodes
    );

    Ok(Consensus {
        global_transforms,
        accepted,
        rejected,
        spanning_tree,
        reference,
    })
}
