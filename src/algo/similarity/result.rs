//! NodeSimilarity output.

use serde::{Deserialize, Serialize};

use super::topk::ScoredNeighbor;
use crate::storage::CsrGraph;

/// Relationship property carrying the score in a similarity graph.
pub const SIMILARITY_PROPERTY: &str = "similarity";

/// One scored, directed pair of internal node ids.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub node1: u64,
    pub node2: u64,
    pub similarity: f64,
}

impl SimilarityResult {
    pub fn new(node1: u64, node2: u64, similarity: f64) -> Self {
        Self { node1, node2, similarity }
    }

    pub fn reverse(self) -> Self {
        Self { node1: self.node2, node2: self.node1, similarity: self.similarity }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum SimilarityResults {
    /// Per-node neighbor lists, best first.
    TopK(Vec<Vec<ScoredNeighbor>>),
    /// Unordered pairs with `node1 < node2`, streamed in both directions.
    Pairs(Vec<SimilarityResult>),
    /// Already-directed rows in final order.
    Directed(Vec<SimilarityResult>),
}

/// Output of a completed NodeSimilarity run.
#[derive(Debug, Clone)]
pub struct NodeSimilarityResult {
    results: SimilarityResults,
    compared_nodes: u64,
}

impl NodeSimilarityResult {
    pub(crate) fn new(results: SimilarityResults, compared_nodes: u64) -> Self {
        Self { results, compared_nodes }
    }

    pub(crate) fn empty() -> Self {
        Self::new(SimilarityResults::Directed(Vec::new()), 0)
    }

    /// Nodes that passed the degree cutoffs and took part in comparisons.
    pub fn compared_nodes(&self) -> u64 {
        self.compared_nodes
    }

    /// Number of rows [`Self::stream`] yields.
    pub fn len(&self) -> usize {
        match &self.results {
            SimilarityResults::TopK(lists) => lists.iter().map(Vec::len).sum(),
            SimilarityResults::Pairs(pairs) => pairs.len() * 2,
            SimilarityResults::Directed(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows lazily, in internal ids.
    ///
    /// Top-k results come grouped by `node1` ascending, best first within a
    /// node. Top-n results come in global rank order.
    pub fn stream(&self) -> Box<dyn Iterator<Item = SimilarityResult> + '_> {
        match &self.results {
            SimilarityResults::TopK(lists) => Box::new(lists.iter().enumerate().flat_map(|(node, list)| {
                list.iter()
                    .map(move |n| SimilarityResult::new(node as u64, n.target, n.score))
            })),
            SimilarityResults::Pairs(pairs) => {
                Box::new(pairs.iter().flat_map(|pair| [*pair, pair.reverse()]))
            }
            SimilarityResults::Directed(rows) => Box::new(rows.iter().copied()),
        }
    }

    pub fn into_vec(self) -> Vec<SimilarityResult> {
        self.stream().collect()
    }
}

/// NodeSimilarity output materialized as a graph over the input's id space.
#[derive(Debug, Clone)]
pub struct SimilarityGraphResult {
    /// One relationship per result row, carrying [`SIMILARITY_PROPERTY`].
    pub graph: CsrGraph,
    pub compared_nodes: u64,
    pub relationship_count: u64,
}
