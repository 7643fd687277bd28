//! Set similarity over sorted, deduplicated neighbor vectors.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimilarityMetric {
    /// `|A ∩ B| / |A ∪ B|`
    #[default]
    Jaccard,
    /// `|A ∩ B| / min(|A|, |B|)`
    Overlap,
    /// `|A ∩ B| / sqrt(|A| · |B|)`, cosine over binary vectors.
    Cosine,
}

impl SimilarityMetric {
    /// Score for sets of sizes `size1` and `size2` sharing `intersection`
    /// elements. `None` when the score is undefined (empty sets).
    pub fn similarity(self, intersection: u64, size1: u64, size2: u64) -> Option<f64> {
        let denominator = match self {
            SimilarityMetric::Jaccard => (size1 + size2 - intersection) as f64,
            SimilarityMetric::Overlap => size1.min(size2) as f64,
            SimilarityMetric::Cosine => ((size1 as f64) * (size2 as f64)).sqrt(),
        };
        if denominator == 0.0 {
            return None;
        }
        Some((intersection as f64 / denominator).min(1.0))
    }
}

/// Number of shared elements of two ascending, duplicate-free slices.
pub fn intersection_count(left: &[u64], right: &[u64]) -> u64 {
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_metrics() {
        assert_eq!(SimilarityMetric::Jaccard.similarity(2, 3, 3), Some(0.5));
        assert_eq!(SimilarityMetric::Overlap.similarity(2, 2, 3), Some(1.0));
        assert_eq!(SimilarityMetric::Cosine.similarity(2, 4, 4), Some(0.5));
        assert_eq!(SimilarityMetric::Jaccard.similarity(0, 0, 0), None);
        assert_eq!(SimilarityMetric::Overlap.similarity(0, 0, 3), None);
        assert_eq!(SimilarityMetric::Jaccard.similarity(0, 2, 1), Some(0.0));
    }

    #[test]
    fn test_intersection() {
        assert_eq!(intersection_count(&[1, 2, 3], &[2, 3, 4]), 2);
        assert_eq!(intersection_count(&[], &[1]), 0);
    }

    proptest! {
        #[test]
        fn intersection_matches_set_semantics(
            a in proptest::collection::btree_set(0u64..200, 0..50),
            b in proptest::collection::btree_set(0u64..200, 0..50),
        ) {
            let left: Vec<u64> = a.iter().copied().collect();
            let right: Vec<u64> = b.iter().copied().collect();
            let expected = a.intersection(&b).count() as u64;
            prop_assert_eq!(intersection_count(&left, &right), expected);
            if let Some(score) = SimilarityMetric::Jaccard.similarity(expected, a.len() as u64, b.len() as u64) {
                prop_assert!((0.0..=1.0).contains(&score));
            }
        }
    }
}
