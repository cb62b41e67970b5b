use std::collections::VecDeque;

use crate::error::GraphError;
use crate::estimate::TransformEstimate;
use crate::union_find::UnionFind;

/// Split the estimates into accepted and rejected edges.
///
/// An edge is accepted if it carries a transform and its confidence is at least
/// `confidence_threshold`. Input order is kept in both outputs.
pub fn filter_edges(
    estimates: &[TransformEstimate],
    confidence_threshold: f64,
) -> (Vec<TransformEstimate>, Vec<TransformEstimate>) {
    estimates
        .iter()
        .copied()
        .partition(|e| e.transform.is_some() && e.confidence >= confidence_threshold)
}

/// Check that every edge is canonical and refers to existing nodes.
pub fn validate_edges(num_nodes: usize, edges: &[TransformEstimate]) -> Result<(), GraphError> {
    for edge in edges {
        if edge.source_idx >= edge.target_idx {
            return Err(GraphError::NonCanonicalEdge {
                source_idx: edge.source_idx,
                target_idx: edge.target_idx,
            });
        }
        if edge.target_idx >= num_nodes {
            return Err(GraphError::NodeOutOfBounds {
                node: edge.target_idx,
                num_nodes,
            });
        }
    }
    Ok(())
}

/// A connected set of nodes with the edges joining them.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Node indices, ascending.
    pub nodes: Vec<usize>,
    /// Edges with both ends in `nodes`, in input order.
    pub edges: Vec<TransformEstimate>,
}

/// The connected component with the most nodes.
///
/// Ties go to the component holding the lowest node index. Without edges this is the
/// singleton `{0}`.
pub fn largest_connected_component(
    num_nodes: usize,
    edges: &[TransformEstimate],
) -> Result<Component, GraphError> {
    if num_nodes == 0 {
        return Err(GraphError::NoNodes);
    }
    validate_edges(num_nodes, edges)?;

    let mut uf = UnionFind::new(num_nodes);
    for edge in edges {
        uf.union(edge.source_idx, edge.target_idx);
    }

    // strict comparison keeps the lowest node on ties
    let mut best = 0;
    let mut best_size = 0;
    for node in 0..num_nodes {
        let size = uf.set_size(node);
        if size > best_size {
            best = node;
            best_size = size;
        }
    }

    let root = uf.find(best);
    let nodes = (0..num_nodes)
        .filter(|&n| uf.find(n) == root)
        .collect::<Vec<_>>();
    let edges = edges
        .iter()
        .filter(|e| uf.find(e.source_idx) == root)
        .copied()
        .collect::<Vec<_>>();

    Ok(Component { nodes, edges })
}

/// A spanning tree over one connected component.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanningTree {
    nodes: Vec<usize>,
    edges: Vec<TransformEstimate>,
    adjacency: Vec<Vec<usize>>,
}

impl SpanningTree {
    /// Nodes of the tree, ascending.
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Tree edges, in order of selection.
    pub fn edges(&self) -> &[TransformEstimate] {
        &self.edges
    }

    /// Sum of the edge confidences.
    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.confidence).sum()
    }

    /// Whether `node` belongs to the tree.
    pub fn contains(&self, node: usize) -> bool {
        self.nodes.binary_search(&node).is_ok()
    }

    /// Tree neighbours of `node`, ascending.
    pub fn neighbors(&self, node: usize) -> &[usize] {
        self.adjacency.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Breadth-first walk from `root`, calling `visit(from, to)` for every tree edge in
    /// discovery order. Neighbours are visited by ascending index.
    pub fn walk_breadth_first<F>(&self, root: usize, mut visit: F)
    where
        F: FnMut(usize, usize),
    {
        if !self.contains(root) {
            return;
        }
        let mut visited = vec![false; self.adjacency.len()];
        let mut queue = VecDeque::from([root]);
        visited[root] = true;

        while let Some(from) = queue.pop_front() {
            for &to in self.neighbors(from) {
                if !visited[to] {
                    visited[to] = true;
                    visit(from, to);
                    queue.push_back(to);
                }
            }
        }
    }

    /// Hop distance from `root` to every node, `None` for nodes not in the tree.
    fn distances_from(&self, root: usize) -> Vec<Option<usize>> {
        let mut distances = vec![None; self.adjacency.len()];
        distances[root] = Some(0);
        self.walk_breadth_first(root, |from, to| {
            distances[to] = distances[from].map(|d| d + 1);
        });
        distances
    }

    /// The node farthest from `root`, lowest index on ties.
    fn farthest_from(&self, root: usize) -> (usize, Vec<Option<usize>>) {
        let distances = self.distances_from(root);
        let mut best = root;
        let mut best_distance = 0;
        for (node, d) in distances.iter().enumerate() {
            if let Some(d) = *d {
                if d > best_distance {
                    best = node;
                    best_distance = d;
                }
            }
        }
        (best, distances)
    }

    /// Nodes of minimum eccentricity: the one or two middle nodes of a longest path.
    ///
    /// Returned ascending; a single node tree is its own center.
    pub fn centers(&self) -> Vec<usize> {
        let Some(&start) = self.nodes.first() else {
            return Vec::new();
        };

        // two BFS passes find the endpoints of a diameter
        let (u, _) = self.farthest_from(start);
        let (v, distances) = self.farthest_from(u);

        // walk back from v to u along decreasing distance
        let mut path = vec![v];
        let mut current = v;
        while current != u {
            let Some(d) = distances[current] else {
                break;
            };
            let Some(&prev) = self
                .neighbors(current)
                .iter()
                .find(|&&n| distances[n] == Some(d - 1))
            else {
                break;
            };
            path.push(prev);
            current = prev;
        }

        let len = path.len() - 1;
        let mut centers = if len % 2 == 0 {
            vec![path[len / 2]]
        } else {
            vec![path[len / 2], path[len / 2 + 1]]
        };
        centers.sort_unstable();
        centers
    }
}

/// Maximum total confidence spanning tree of a connected component (Kruskal).
///
/// Edges are taken by descending confidence; equal confidences keep their input order.
pub fn max_spanning_tree(
    num_nodes: usize,
    component: &Component,
) -> Result<SpanningTree, GraphError> {
    validate_edges(num_nodes, &component.edges)?;
    if let Some(&node) = component.nodes.iter().find(|&&n| n >= num_nodes) {
        return Err(GraphError::NodeOutOfBounds { node, num_nodes });
    }

    let mut sorted = component.edges.clone();
    // stable sort, ties stay in discovery order
    sorted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut uf = UnionFind::new(num_nodes);
    let mut adjacency = vec![Vec::new(); num_nodes];
    let mut edges = Vec::with_capacity(component.nodes.len().saturating_sub(1));

    for edge in sorted {
        if edges.len() + 1 >= component.nodes.len() {
            break;
        }
        if uf.union(edge.source_idx, edge.target_idx) {
            adjacency[edge.source_idx].push(edge.target_idx);
            adjacency[edge.target_idx].push(edge.source_idx);
            edges.push(edge);
        }
    }
    for neighbors in adjacency.iter_mut() {
        neighbors.sort_unstable();
    }

    let mut nodes = component.nodes.clone();
    nodes.sort_unstable();

    log::debug!(
        "spanning tree: {} nodes, {} edges",
        nodes.len(),
        edges.len()
    );

    Ok(SpanningTree {
        nodes,
        edges,
        adjacency,
    })
}
