use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;

use crate::pointcloud::PointCloud;

/// A neighbour returned by [`PointIndex`] queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the point in the indexed slice.
    pub index: usize,
    /// Squared euclidean distance to the query.
    pub squared_distance: f64,
}

/// Nearest-neighbour index over a fixed set of 3D points.
///
/// Wraps an immutable kd-tree; an index built from an empty slice answers every
/// query with no neighbours.
pub struct PointIndex {
    kdtree: Option<ImmutableKdTree<f64, u32, 3, 32>>,
}

impl PointIndex {
    /// Build the index from a slice of points.
    pub fn new(points: &[[f64; 3]]) -> Self {
        let kdtree = (!points.is_empty()).then(|| ImmutableKdTree::new_from_slice(points));
        Self { kdtree }
    }

    /// Whether the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.kdtree.is_none()
    }

    /// The closest indexed point to `query`.
    pub fn nearest(&self, query: &[f64; 3]) -> Option<Neighbor> {
        self.kdtree.as_ref().map(|kdtree| {
            let nn = kdtree.nearest_one::<SquaredEuclidean>(query);
            Neighbor {
                index: nn.item as usize,
                squared_distance: nn.distance,
            }
        })
    }

    /// All indexed points within `radius` of `query` (including an exact match), unsorted.
    pub fn within(&self, query: &[f64; 3], radius: f64) -> Vec<Neighbor> {
        match self.kdtree.as_ref() {
            None => Vec::new(),
            Some(kdtree) => kdtree
                .within_unsorted::<SquaredEuclidean>(query, radius * radius)
                .into_iter()
                .map(|nn| Neighbor {
                    index: nn.item as usize,
                    squared_distance: nn.distance,
                })
                .collect(),
        }
    }
}

/// Remove points that have fewer than `min_neighbors` other points within `radius`.
///
/// Colors and normals of the surviving points are kept.
pub fn remove_radius_outliers(cloud: &PointCloud, radius: f64, min_neighbors: usize) -> PointCloud {
    let index = PointIndex::new(cloud.points());

    let keep = cloud
        .points()
        .iter()
        .map(|p| index.within(p, radius).len().saturating_sub(1) >= min_neighbors)
        .collect::<Vec<_>>();

    fn select<T: Copy>(values: &[T], keep: &[bool]) -> Vec<T> {
        values
            .iter()
            .zip(keep.iter())
            .filter_map(|(v, &k)| k.then_some(*v))
            .collect()
    }

    PointCloud::new(
        select(cloud.points(), &keep),
        cloud.colors().map(|c| select(c, &keep)),
        cloud.normals().map(|n| select(n, &keep)),
    )
}
