//! Bounded selection of the best-ranked items.
//!
//! Ranking is a total order (score, then node ids), so the kept set does not
//! depend on the order items were offered in, nor on how thread-local
//! selections were merged. That makes parallel results match sequential
//! ones exactly.

use std::cmp::Ordering;

use super::config::SelectionOrder;
use super::result::SimilarityResult;

/// Items that can be ranked for a bounded selection.
pub trait Ranked: Copy {
    /// `Less` means `self` ranks before `other` under `order`.
    fn rank(&self, other: &Self, order: SelectionOrder) -> Ordering;
}

#[inline]
fn by_score(left: f64, right: f64, order: SelectionOrder) -> Ordering {
    match order {
        SelectionOrder::Highest => right.total_cmp(&left),
        SelectionOrder::Lowest => left.total_cmp(&right),
    }
}

/// One neighbor in a per-node top-k list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredNeighbor {
    pub target: u64,
    pub score: f64,
}

impl Ranked for ScoredNeighbor {
    fn rank(&self, other: &Self, order: SelectionOrder) -> Ordering {
        by_score(self.score, other.score, order).then(self.target.cmp(&other.target))
    }
}

impl Ranked for SimilarityResult {
    fn rank(&self, other: &Self, order: SelectionOrder) -> Ordering {
        by_score(self.similarity, other.similarity, order)
            .then(self.node1.cmp(&other.node1))
            .then(self.node2.cmp(&other.node2))
    }
}

// ============================================================================
// BoundedSelection
// ============================================================================

/// Keeps the `limit` best items offered to it.
///
/// Items are buffered unsorted; once the buffer reaches twice the limit a
/// selection pass evicts everything below the cut. Amortized O(1) per offer.
#[derive(Debug, Clone)]
pub struct BoundedSelection<T> {
    items: Vec<T>,
    limit: usize,
    order: SelectionOrder,
}

impl<T: Ranked> BoundedSelection<T> {
    pub fn new(limit: usize, order: SelectionOrder) -> Self {
        Self { items: Vec::new(), limit, order }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub fn offer(&mut self, item: T) {
        if self.limit == 0 {
            return;
        }
        self.items.push(item);
        if self.items.len() >= self.limit.saturating_mul(2) {
            self.compact();
        }
    }

    fn compact(&mut self) {
        if self.items.len() <= self.limit {
            return;
        }
        let order = self.order;
        self.items
            .select_nth_unstable_by(self.limit - 1, |a, b| a.rank(b, order));
        self.items.truncate(self.limit);
    }

    /// Absorb another selection with the same limit and order.
    pub fn merge(&mut self, other: BoundedSelection<T>) {
        debug_assert_eq!(self.order, other.order);
        self.items.extend(other.items);
        if self.items.len() >= self.limit.saturating_mul(2) {
            self.compact();
        }
    }

    /// Number of items that would survive [`Self::into_sorted_vec`].
    pub fn len(&self) -> usize {
        self.items.len().min(self.limit)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The kept items, best first.
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        self.compact();
        let order = self.order;
        self.items.sort_unstable_by(|a, b| a.rank(b, order));
        self.items
    }
}

// ============================================================================
// TopKMap
// ============================================================================

/// One bounded neighbor list per node.
#[derive(Debug, Clone)]
pub struct TopKMap {
    lists: Vec<BoundedSelection<ScoredNeighbor>>,
    limit: usize,
    order: SelectionOrder,
}

impl TopKMap {
    pub fn new(node_count: u64, limit: usize, order: SelectionOrder) -> Self {
        let lists = (0..node_count).map(|_| BoundedSelection::new(limit, order)).collect();
        Self { lists, limit, order }
    }

    #[inline]
    pub fn offer(&mut self, source: u64, target: u64, score: f64) {
        self.lists[source as usize].offer(ScoredNeighbor { target, score });
    }

    /// Merge per-node lists pairwise.
    pub fn merge(mut self, other: TopKMap) -> TopKMap {
        debug_assert_eq!((self.limit, self.order), (other.limit, other.order));
        for (mine, theirs) in self.lists.iter_mut().zip(other.lists) {
            if !theirs.is_empty() {
                mine.merge(theirs);
            }
        }
        self
    }

    /// Per-node lists, best first.
    pub fn into_sorted(self) -> Vec<Vec<ScoredNeighbor>> {
        self.lists.into_iter().map(BoundedSelection::into_sorted_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn neighbor(target: u64, score: f64) -> ScoredNeighbor {
        ScoredNeighbor { target, score }
    }

    #[test]
    fn test_keeps_highest_with_id_tiebreak() {
        let mut selection = BoundedSelection::new(2, SelectionOrder::Highest);
        for item in [neighbor(4, 0.5), neighbor(1, 0.9), neighbor(3, 0.5), neighbor(2, 0.1)] {
            selection.offer(item);
        }
        assert_eq!(selection.into_sorted_vec(), vec![neighbor(1, 0.9), neighbor(3, 0.5)]);
    }

    #[test]
    fn test_lowest_order() {
        let mut selection = BoundedSelection::new(1, SelectionOrder::Lowest);
        selection.offer(neighbor(1, 0.9));
        selection.offer(neighbor(2, 0.2));
        assert_eq!(selection.into_sorted_vec(), vec![neighbor(2, 0.2)]);
    }

    #[test]
    fn test_result_rank_orders_by_node_ids() {
        let a = SimilarityResult { node1: 0, node2: 3, similarity: 1.0 };
        let b = SimilarityResult { node1: 3, node2: 0, similarity: 1.0 };
        assert_eq!(a.rank(&b, SelectionOrder::Highest), Ordering::Less);
    }

    #[test]
    fn test_top_k_map_merge() {
        let mut left = TopKMap::new(2, 1, SelectionOrder::Highest);
        let mut right = TopKMap::new(2, 1, SelectionOrder::Highest);
        left.offer(0, 1, 0.3);
        right.offer(0, 1, 0.7);
        right.offer(1, 0, 0.7);
        let lists = left.merge(right).into_sorted();
        assert_eq!(lists[0], vec![neighbor(1, 0.7)]);
        assert_eq!(lists[1], vec![neighbor(0, 0.7)]);
    }

    proptest! {
        #[test]
        fn selection_matches_full_sort(
            scores in proptest::collection::vec(0u8..20, 0..60),
            limit in 1usize..10,
            split in 0usize..60,
        ) {
            let items: Vec<ScoredNeighbor> = scores
                .iter()
                .enumerate()
                .map(|(i, &s)| neighbor(i as u64, f64::from(s) / 20.0))
                .collect();

            let mut expected = items.clone();
            expected.sort_unstable_by(|a, b| a.rank(b, SelectionOrder::Highest));
            expected.truncate(limit);

            let split = split.min(items.len());
            let mut left = BoundedSelection::new(limit, SelectionOrder::Highest);
            let mut right = BoundedSelection::new(limit, SelectionOrder::Highest);
            items[..split].iter().for_each(|&item| left.offer(item));
            items[split..].iter().rev().for_each(|&item| right.offer(item));
            left.merge(right);
            prop_assert_eq!(left.into_sorted_vec(), expected);
        }
    }
}
