//! Set of chunk indices present for one session.

use serde::Serialize;
use std::collections::BTreeSet;

/// Indices received so far, kept sorted. Arrival order does not matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReceivedChunks {
    indices: BTreeSet<u32>,
}

impl ReceivedChunks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u32) -> bool {
        self.indices.insert(index)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.indices.contains(&index)
    }

    /// Number of distinct indices present.
    #[cfg(test)]
    pub fn count(&self) -> usize {
        self.indices.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Indices in ascending order.
    pub fn indices(&self) -> Vec<u32> {
        self.indices.iter().copied().collect()
    }

    /// Indices in `0..total` not yet received.
    pub fn missing(&self, total: u32) -> Vec<u32> {
        (0..total).filter(|&i| !self.contains(i)).collect()
    }

    /// True once every index in `0..total` is present.
    ///
    /// Indices at or above `total` (left by an earlier attempt that declared
    /// more chunks) are ignored: they are never assembled and go away with
    /// the session directory on commit.
    pub fn is_complete(&self, total: u32) -> bool {
        total > 0 && self.indices.range(..total).count() == total as usize
    }

    /// Indices at or above `total`.
    pub fn strays(&self, total: u32) -> Vec<u32> {
        self.indices.range(total..).copied().collect()
    }
}

impl FromIterator<u32> for ReceivedChunks {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        ReceivedChunks {
            indices: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_requires_exact_range() {
        let r: ReceivedChunks = [2, 0, 1].into_iter().collect();
        assert!(r.is_complete(3));
        assert!(!r.is_complete(4));
        assert!(!r.is_complete(2));
    }

    #[test]
    fn count_match_with_stray_index_is_not_complete() {
        let r: ReceivedChunks = [0, 1, 5].into_iter().collect();
        assert_eq!(r.count(), 3);
        assert!(!r.is_complete(3));
        assert_eq!(r.missing(3), vec![2]);
    }

    #[test]
    fn stray_index_does_not_block_completion() {
        let r: ReceivedChunks = [0, 1, 2, 5].into_iter().collect();
        assert!(r.is_complete(3));
        assert_eq!(r.strays(3), vec![5]);
        assert!(r.missing(3).is_empty());
    }

    #[test]
    fn empty_is_never_complete() {
        let r = ReceivedChunks::new();
        assert!(!r.is_complete(0));
        assert!(!r.is_complete(1));
        assert_eq!(r.missing(2), vec![0, 1]);
    }

    #[test]
    fn duplicates_collapse() {
        let mut r = ReceivedChunks::new();
        assert!(r.insert(1));
        assert!(!r.insert(1));
        assert_eq!(r.indices(), vec![1]);
    }

    #[test]
    fn serializes_as_sorted_list() {
        let r: ReceivedChunks = [3, 1, 2].into_iter().collect();
        assert_eq!(serde_json::to_string(&r).unwrap(), "[1,2,3]");
    }
}
