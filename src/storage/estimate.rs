//! Memory estimation for compressed topologies, before anything is built.
//!
//! Run sizes depend on the actual deltas, so estimates are ranges: the
//! lower bound assumes every delta fits one byte, the upper bound assumes
//! every delta needs as many bytes as the largest node id.

use serde::Serialize;

use super::paged::{DEGREE_HEADER_BYTES, PAGE_SIZE};
use super::varint::vlong_size;

/// Inclusive byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryRange {
    pub min: usize,
    pub max: usize,
}

impl MemoryRange {
    pub fn of(bytes: usize) -> Self {
        Self { min: bytes, max: bytes }
    }

    pub fn add(self, other: MemoryRange) -> Self {
        Self { min: self.min + other.min, max: self.max + other.max }
    }
}

/// Estimated footprint of one topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopologyEstimate {
    /// Adjacency run bytes inside pages.
    pub runs: MemoryRange,
    /// Page count including the sentinel page.
    pub pages: MemoryRange,
    /// The per-node offset table.
    pub offsets: usize,
}

impl TopologyEstimate {
    pub fn total(&self) -> MemoryRange {
        self.runs.add(MemoryRange::of(self.offsets))
    }
}

/// Bytes of one adjacency run with `degree` targets whose deltas are
/// all at most `max_delta`.
pub fn adjacency_run_bytes(degree: u64, max_delta: u64) -> usize {
    DEGREE_HEADER_BYTES + degree as usize * vlong_size(max_delta)
}

/// Estimate for `relationship_count` relationships over `node_count` nodes.
pub fn topology_estimate(node_count: u64, relationship_count: u64) -> TopologyEstimate {
    let relationships = relationship_count as usize;
    // fewest runs: everything on one node; most runs: one per node
    let min_headers = if relationship_count > 0 { DEGREE_HEADER_BYTES } else { 0 };
    let max_headers = node_count.min(relationship_count) as usize * DEGREE_HEADER_BYTES;
    let widest = vlong_size(node_count.saturating_sub(1));
    let runs = MemoryRange {
        min: min_headers + relationships,
        max: max_headers + relationships * widest,
    };
    TopologyEstimate {
        runs,
        pages: MemoryRange { min: pages_for(runs.min), max: pages_for(runs.max) },
        offsets: node_count as usize * std::mem::size_of::<u64>(),
    }
}

/// Bytes of one relationship property column.
pub fn property_estimate(node_count: u64, relationship_count: u64) -> usize {
    relationship_count as usize * std::mem::size_of::<f64>() + node_count as usize * std::mem::size_of::<u64>()
}

fn pages_for(bytes: usize) -> usize {
    1 + bytes.div_ceil(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_graph_is_one_sentinel_page() {
        let estimate = topology_estimate(0, 0);
        assert_eq!(estimate.runs, MemoryRange::of(0));
        assert_eq!(estimate.pages, MemoryRange::of(1));
        assert_eq!(estimate.total(), MemoryRange::of(0));
    }

    #[test]
    fn test_range_bounds() {
        let estimate = topology_estimate(1_000, 10_000);
        // between one and 1000 runs of 4 header bytes; ids < 1000 need at most 2 bytes
        assert_eq!(estimate.runs.min, 4 + 10_000);
        assert_eq!(estimate.runs.max, 4_000 + 20_000);
        assert_eq!(estimate.offsets, 8_000);
        assert_eq!(estimate.pages.max, 2);
        assert_eq!(adjacency_run_bytes(3, 127), 7);
        assert_eq!(adjacency_run_bytes(3, 128), 10);
    }
}
