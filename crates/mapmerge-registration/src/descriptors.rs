use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::RegistrationError;

/// Supported local descriptor kinds.
///
/// Every kind has a fixed dimensionality; descriptors of different kinds can not be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorKind {
    /// Point feature histogram.
    #[serde(rename = "pfh")]
    Pfh,
    /// Point feature histogram with color.
    #[serde(rename = "pfhrgb")]
    PfhRgb,
    /// Fast point feature histogram.
    #[serde(rename = "fpfh")]
    Fpfh,
    /// Radius-based surface descriptor.
    #[serde(rename = "rsd")]
    Rsd,
    /// Signature of histograms of orientations.
    #[serde(rename = "shot")]
    Shot,
    /// SHOT with color.
    #[serde(rename = "shot_color")]
    ShotColor,
    /// 3D shape context.
    #[serde(rename = "sc3d")]
    ShapeContext3d,
    /// Unique shape context.
    #[serde(rename = "usc")]
    UniqueShapeContext,
}

impl DescriptorKind {
    /// All supported kinds.
    pub const ALL: [DescriptorKind; 8] = [
        DescriptorKind::Pfh,
        DescriptorKind::PfhRgb,
        DescriptorKind::Fpfh,
        DescriptorKind::Rsd,
        DescriptorKind::Shot,
        DescriptorKind::ShotColor,
        DescriptorKind::ShapeContext3d,
        DescriptorKind::UniqueShapeContext,
    ];

    /// Number of values in one descriptor.
    pub const fn dimension(&self) -> usize {
        match self {
            DescriptorKind::Pfh => 125,
            DescriptorKind::PfhRgb => 250,
            DescriptorKind::Fpfh => 33,
            DescriptorKind::Rsd => 2,
            DescriptorKind::Shot => 352,
            DescriptorKind::ShotColor => 1344,
            DescriptorKind::ShapeContext3d => 1980,
            DescriptorKind::UniqueShapeContext => 1960,
        }
    }

    /// Canonical lowercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            DescriptorKind::Pfh => "pfh",
            DescriptorKind::PfhRgb => "pfhrgb",
            DescriptorKind::Fpfh => "fpfh",
            DescriptorKind::Rsd => "rsd",
            DescriptorKind::Shot => "shot",
            DescriptorKind::ShotColor => "shot_color",
            DescriptorKind::ShapeContext3d => "sc3d",
            DescriptorKind::UniqueShapeContext => "usc",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DescriptorKind {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        DescriptorKind::ALL
            .into_iter()
            .find(|kind| kind.name() == lower)
            .ok_or_else(|| RegistrationError::UnknownName {
                what: "descriptor kind",
                name: s.to_string(),
            })
    }
}

/// Descriptors computed for a keypoint cloud, parallel-indexed with the keypoints.
///
/// Values are stored row-major in one flat buffer of `len * kind.dimension()` floats.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorSet {
    kind: DescriptorKind,
    data: Vec<f32>,
}

impl DescriptorSet {
    /// Create a descriptor set from a flat buffer.
    ///
    /// # Errors
    ///
    /// Fails if the buffer length is not a multiple of the kind dimension.
    pub fn new(kind: DescriptorKind, data: Vec<f32>) -> Result<Self, RegistrationError> {
        let dimension = kind.dimension();
        if data.len() % dimension != 0 {
            return Err(RegistrationError::InvalidDescriptorLength {
                kind,
                len: data.len(),
                dimension,
            });
        }
        Ok(Self { kind, data })
    }

    /// Create a descriptor set from one vector per descriptor.
    pub fn from_rows(kind: DescriptorKind, rows: &[Vec<f32>]) -> Result<Self, RegistrationError> {
        let dimension = kind.dimension();
        let mut data = Vec::with_capacity(rows.len() * dimension);
        for row in rows {
            if row.len() != dimension {
                return Err(RegistrationError::InvalidDescriptorLength {
                    kind,
                    len: row.len(),
                    dimension,
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { kind, data })
    }

    /// An empty set of the given kind.
    pub fn empty(kind: DescriptorKind) -> Self {
        Self {
            kind,
            data: Vec::new(),
        }
    }

    /// The descriptor kind.
    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.data.len() / self.kind.dimension()
    }

    /// Whether the set holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The descriptor at `index`.
    pub fn get(&self, index: usize) -> Option<&[f32]> {
        let dimension = self.kind.dimension();
        self.data.get(index * dimension..(index + 1) * dimension)
    }

    /// Iterate over the descriptors in order.
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.kind.dimension())
    }

    /// The raw row-major buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// A descriptor-space neighbour: index into the searched set and squared distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureNeighbor {
    /// Index into the searched descriptor set.
    pub index: usize,
    /// Squared euclidean distance in descriptor space.
    pub squared_distance: f32,
}

#[inline]
fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    let d = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f32>();
    // NaN sorts after every finite distance
    if d.is_nan() {
        f32::INFINITY
    } else {
        d
    }
}

/// The `k` nearest descriptors of `query` in `index`, closest first.
///
/// Brute force; ties are broken by the lower index.
pub fn nearest_k(query: &[f32], index: &DescriptorSet, k: usize) -> Vec<FeatureNeighbor> {
    let mut candidates = index
        .iter()
        .enumerate()
        .map(|(i, d)| FeatureNeighbor {
            index: i,
            squared_distance: squared_distance(query, d),
        })
        .collect::<Vec<_>>();

    let cmp = |a: &FeatureNeighbor, b: &FeatureNeighbor| {
        a.squared_distance
            .total_cmp(&b.squared_distance)
            .then(a.index.cmp(&b.index))
    };

    if k == 0 {
        return Vec::new();
    }
    if candidates.len() > k {
        candidates.select_nth_unstable_by(k - 1, cmp);
        candidates.truncate(k);
    }
    candidates.sort_unstable_by(cmp);
    candidates
}

/// k-nearest-neighbour search for every descriptor of `queries` in `index`, in parallel.
pub fn knn_search(
    queries: &DescriptorSet,
    index: &DescriptorSet,
    k: usize,
) -> Vec<Vec<FeatureNeighbor>> {
    let dimension = queries.kind().dimension();
    queries
        .as_slice()
        .par_chunks_exact(dimension)
        .map(|query| nearest_k(query, index, k))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_dimensions() {
        assert_eq!(DescriptorKind::Pfh.dimension(), 125);
        assert_eq!(DescriptorKind::Fpfh.dimension(), 33);
        assert_eq!(DescriptorKind::ShotColor.dimension(), 1344);
        assert_eq!(DescriptorKind::UniqueShapeContext.dimension(), 1960);
    }

    #[test]
    fn test_descriptor_kind_from_str() -> Result<(), RegistrationError> {
        assert_eq!("PFH".parse::<DescriptorKind>()?, DescriptorKind::Pfh);
        assert_eq!("shot_color".parse::<DescriptorKind>()?, DescriptorKind::ShotColor);
        for kind in DescriptorKind::ALL {
            assert_eq!(kind.to_string().parse::<DescriptorKind>()?, kind);
        }
        assert!(matches!(
            "sift".parse::<DescriptorKind>(),
            Err(RegistrationError::UnknownName { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_descriptor_kind_serde() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&DescriptorKind::Fpfh)?, "\"fpfh\"");
        let kind: DescriptorKind = serde_json::from_str("\"usc\"")?;
        assert_eq!(kind, DescriptorKind::UniqueShapeContext);
        Ok(())
    }

    #[test]
    fn test_descriptor_set() -> Result<(), RegistrationError> {
        let set = DescriptorSet::new(DescriptorKind::Rsd, vec![0.0, 1.0, 2.0, 3.0])?;
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(1), Some(&[2.0, 3.0][..]));
        assert_eq!(set.get(2), None);
        assert_eq!(set.iter().count(), 2);

        assert!(matches!(
            DescriptorSet::new(DescriptorKind::Rsd, vec![0.0; 3]),
            Err(RegistrationError::InvalidDescriptorLength { len: 3, dimension: 2, .. })
        ));
        assert!(DescriptorSet::from_rows(DescriptorKind::Rsd, &[vec![1.0]]).is_err());
        assert!(DescriptorSet::empty(DescriptorKind::Shot).is_empty());
        Ok(())
    }

    #[test]
    fn test_nearest_k() -> Result<(), RegistrationError> {
        let set = DescriptorSet::from_rows(
            DescriptorKind::Rsd,
            &[vec![0.0, 0.0], vec![3.0, 0.0], vec![1.0, 0.0], vec![f32::NAN, 0.0]],
        )?;
        let nn = nearest_k(&[0.0, 0.0], &set, 3);
        assert_eq!(nn.iter().map(|n| n.index).collect::<Vec<_>>(), vec![0, 2, 1]);
        assert_eq!(nn[1].squared_distance, 1.0);

        let all = nearest_k(&[0.0, 0.0], &set, 10);
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].index, 3);

        assert!(nearest_k(&[0.0, 0.0], &set, 0).is_empty());
        Ok(())
    }
}
