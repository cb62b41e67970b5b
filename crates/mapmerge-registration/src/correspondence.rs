use crate::descriptors::{knn_search, DescriptorSet};
use crate::error::RegistrationError;

/// A putative match between a source and a target point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Index into the source keypoints.
    pub source_idx: usize,
    /// Index into the target keypoints.
    pub target_idx: usize,
    /// Squared descriptor distance of the match.
    pub distance: f64,
}

pub(crate) fn check_descriptor_pair(
    source: &DescriptorSet,
    target: &DescriptorSet,
) -> Result<(), RegistrationError> {
    if source.is_empty() {
        return Err(RegistrationError::EmptyDescriptors("source"));
    }
    if target.is_empty() {
        return Err(RegistrationError::EmptyDescriptors("target"));
    }
    if source.kind() != target.kind() {
        return Err(RegistrationError::MismatchedDescriptorKinds {
            left: source.kind(),
            right: target.kind(),
        });
    }
    Ok(())
}

/// Find reciprocal correspondences among the `k` nearest descriptor matches.
///
/// For every source descriptor the `k` nearest target descriptors are visited closest first;
/// the first one whose own `k` nearest source descriptors contain the source index is kept.
/// At most one correspondence is produced per source index.
///
/// # Errors
///
/// Fails if either set is empty, the kinds differ or `k` is zero.
pub fn find_feature_correspondences(
    source: &DescriptorSet,
    target: &DescriptorSet,
    k: usize,
) -> Result<Vec<Correspondence>, RegistrationError> {
    check_descriptor_pair(source, target)?;
    if k == 0 {
        return Err(RegistrationError::InvalidParameter(
            "matching k must be at least 1",
        ));
    }

    let forward = knn_search(source, target, k);
    let backward = knn_search(target, source, k);

    let correspondences = forward
        .iter()
        .enumerate()
        .filter_map(|(source_idx, matches)| {
            matches
                .iter()
                .find(|m| backward[m.index].iter().any(|b| b.index == source_idx))
                .map(|m| Correspondence {
                    source_idx,
                    target_idx: m.index,
                    distance: m.squared_distance as f64,
                })
        })
        .collect::<Vec<_>>();

    log::debug!(
        "reciprocal matches: {} of {} source descriptors",
        correspondences.len(),
        source.len()
    );

    Ok(correspondences)
}
