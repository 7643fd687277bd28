//! # Node Similarity
//!
//! Pairwise set similarity between the neighborhoods of nodes, read straight
//! from a compressed topology.
//!
//! ## Phases
//!
//! | Phase | Work |
//! |-------|------|
//! | Prepare | decode each node's run once into a distinct, self-loop-free vector; apply degree cutoffs |
//! | Index | invert the vectors (target → sources) so candidates come from shared neighbors |
//! | Compare | score each candidate pair `i < j` once by merge-join |
//! | Select | per-node top-k and/or global top-n, thread-local then merged |
//!
//! Candidates normally come from the inverted index, which only finds pairs
//! with at least one shared neighbor. A `similarity_cutoff` of `0` keeps
//! zero-scoring pairs too, so every compared pair is enumerated instead.

pub mod config;
pub mod metric;
pub mod result;
pub mod topk;

use std::ops::Range;
use std::sync::Arc;

use rayon::prelude::*;

use crate::builder::{Aggregation, PropertyConfig, RelationshipsBuilder, RelationshipsConfig};
use crate::concurrency::{node_batches, run_in_pool, TerminationFlag};
use crate::progress::ProgressLogger;
use crate::storage::Graph;
use crate::Result;

pub use config::{Bound, NodeSimilarityConfig, NodeSimilarityConfigBuilder, SelectionOrder};
pub use metric::{intersection_count, SimilarityMetric};
pub use result::{NodeSimilarityResult, SimilarityGraphResult, SimilarityResult, SIMILARITY_PROPERTY};
pub use topk::{BoundedSelection, Ranked, ScoredNeighbor, TopKMap};

use result::SimilarityResults;

// ============================================================================
// Prepared input
// ============================================================================

/// Distinct sorted neighbors per node; `None` for nodes outside the cutoffs.
struct NeighborVectors {
    vectors: Vec<Option<Vec<u64>>>,
    compared: u64,
    inverted: Option<InvertedIndex>,
}

impl NeighborVectors {
    #[inline]
    fn get(&self, node: u64) -> Option<&[u64]> {
        self.vectors[node as usize].as_deref()
    }
}

/// target → ascending sources that have it as a neighbor.
struct InvertedIndex {
    offsets: Vec<usize>,
    sources: Vec<u64>,
}

impl InvertedIndex {
    fn build(vectors: &[Option<Vec<u64>>]) -> Self {
        let node_count = vectors.len();
        let mut offsets = vec![0usize; node_count + 1];
        for vector in vectors.iter().flatten() {
            for &target in vector {
                offsets[target as usize + 1] += 1;
            }
        }
        for index in 1..=node_count {
            offsets[index] += offsets[index - 1];
        }
        let mut fill = offsets.clone();
        let mut sources = vec![0u64; offsets[node_count]];
        for (source, vector) in vectors.iter().enumerate() {
            for &target in vector.iter().flatten() {
                let slot = &mut fill[target as usize];
                sources[*slot] = source as u64;
                *slot += 1;
            }
        }
        Self { offsets, sources }
    }

    /// Sources of `target` with an id above `node`.
    #[inline]
    fn sources_after(&self, target: u64, node: u64) -> &[u64] {
        let target = target as usize;
        let list = &self.sources[self.offsets[target]..self.offsets[target + 1]];
        &list[list.partition_point(|&source| source <= node)..]
    }
}

// ============================================================================
// NodeSimilarity
// ============================================================================

pub struct NodeSimilarity<'g, G: Graph> {
    graph: &'g G,
    config: NodeSimilarityConfig,
    termination: TerminationFlag,
}

impl<'g, G: Graph> NodeSimilarity<'g, G> {
    pub fn new(graph: &'g G, config: NodeSimilarityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { graph, config, termination: TerminationFlag::new() })
    }

    pub fn with_termination_flag(mut self, termination: TerminationFlag) -> Self {
        self.termination = termination;
        self
    }

    pub fn config(&self) -> &NodeSimilarityConfig {
        &self.config
    }

    /// Run all phases. `Ok(None)` when the termination flag tripped.
    pub fn compute(&self) -> Result<Option<NodeSimilarityResult>> {
        run_in_pool(self.config.concurrency, || self.run())
    }

    /// Run and materialize the result rows as a new graph over the same id
    /// space, one relationship per row with a [`SIMILARITY_PROPERTY`].
    pub fn compute_to_graph(&self) -> Result<Option<SimilarityGraphResult>> {
        let Some(result) = self.compute()? else {
            return Ok(None);
        };
        let id_map = Arc::clone(self.graph.id_map());
        let config = RelationshipsConfig::new()
            .with_aggregation(Aggregation::None)
            .with_property(PropertyConfig::new(SIMILARITY_PROPERTY));
        let builder = RelationshipsBuilder::new(id_map.clone(), config, self.config.concurrency)?;
        for row in result.stream() {
            builder.add_with_properties(row.node1, row.node2, &[row.similarity]);
        }
        let graph = builder.build()?.into_graph(id_map, Some(SIMILARITY_PROPERTY))?;
        Ok(Some(SimilarityGraphResult {
            relationship_count: graph.relationship_count(),
            compared_nodes: result.compared_nodes(),
            graph,
        }))
    }

    fn run(&self) -> Option<NodeSimilarityResult> {
        let node_count = self.graph.node_count();
        tracing::info!(
            nodes = node_count,
            metric = ?self.config.metric,
            concurrency = self.config.concurrency,
            "node_similarity.start"
        );

        let Some(vectors) = self.prepare() else {
            return self.terminated();
        };
        if vectors.compared == 0 {
            return Some(NodeSimilarityResult::empty());
        }
        tracing::debug!(compared = vectors.compared, all_pairs = vectors.inverted.is_none(), "node_similarity.prepared");

        let results = match (self.config.top_k_bound(), self.config.top_n_bound()) {
            (Bound::Unbounded, Bound::Unbounded) => SimilarityResults::Pairs(self.compute_pairs(&vectors)),
            (Bound::Unbounded, Bound::Limited { limit, order }) => {
                SimilarityResults::Directed(self.compute_top_n(&vectors, limit, order))
            }
            (Bound::Limited { limit, order }, Bound::Unbounded) => {
                SimilarityResults::TopK(self.compute_top_k(&vectors, limit, order))
            }
            (Bound::Limited { limit: k, order: k_order }, Bound::Limited { limit: n, order: n_order }) => {
                let lists = self.compute_top_k(&vectors, k, k_order);
                SimilarityResults::Directed(select_top_n(&lists, n, n_order))
            }
        };
        if !self.termination.running() {
            return self.terminated();
        }

        let result = NodeSimilarityResult::new(results, vectors.compared);
        tracing::info!(rows = result.len(), compared = vectors.compared, "node_similarity.finish");
        Some(result)
    }

    fn terminated(&self) -> Option<NodeSimilarityResult> {
        tracing::warn!("node_similarity.terminated");
        None
    }

    // ========================================================================
    // Prepare
    // ========================================================================

    fn prepare(&self) -> Option<NeighborVectors> {
        let node_count = self.graph.node_count();
        let progress = ProgressLogger::new("NodeSimilarity :: prepare", node_count);
        progress.log_start();

        let vectors: Vec<Option<Vec<u64>>> = node_batches(node_count, self.config.concurrency)
            .into_par_iter()
            .flat_map_iter(|batch| {
                let running = self.termination.running();
                let progress = &progress;
                batch.map(move |node| {
                    if !running {
                        return None;
                    }
                    progress.log_progress(1);
                    self.neighbor_vector(node)
                })
            })
            .collect();
        if !self.termination.running() {
            return None;
        }
        progress.log_finish();

        let compared = vectors.iter().filter(|vector| vector.is_some()).count() as u64;
        let inverted = (!self.config.compares_all_pairs()).then(|| InvertedIndex::build(&vectors));
        Some(NeighborVectors { vectors, compared, inverted })
    }

    /// Distinct targets of `node` without self-loops, if within the cutoffs.
    fn neighbor_vector(&self, node: u64) -> Option<Vec<u64>> {
        let degree = self.graph.degree(node);
        if degree < self.config.degree_cutoff {
            return None;
        }
        let mut targets = Vec::with_capacity(degree as usize);
        for target in self.graph.adjacency_cursor(node) {
            if target != node && targets.last() != Some(&target) {
                targets.push(target);
            }
        }
        let distinct = targets.len() as u64;
        if distinct < u64::from(self.config.degree_cutoff) || distinct > u64::from(self.config.upper_degree_cutoff) {
            return None;
        }
        Some(targets)
    }

    // ========================================================================
    // Compare
    // ========================================================================

    #[inline]
    fn score(&self, left: &[u64], right: &[u64]) -> Option<f64> {
        let shared = intersection_count(left, right);
        self.config
            .metric
            .similarity(shared, left.len() as u64, right.len() as u64)
            .filter(|&similarity| similarity >= self.config.similarity_cutoff)
    }

    /// Score every qualifying pair `(i, j)` with `i` in `batch` and `j > i`.
    fn compare_batch(
        &self,
        vectors: &NeighborVectors,
        batch: Range<u64>,
        candidates: &mut Vec<u64>,
        emit: &mut dyn FnMut(u64, u64, f64),
    ) {
        let node_count = vectors.vectors.len() as u64;
        for node in batch {
            let Some(left) = vectors.get(node) else { continue };
            match &vectors.inverted {
                None => {
                    for other in node + 1..node_count {
                        if let Some(right) = vectors.get(other) {
                            if let Some(similarity) = self.score(left, right) {
                                emit(node, other, similarity);
                            }
                        }
                    }
                }
                Some(inverted) => {
                    candidates.clear();
                    for &target in left {
                        candidates.extend_from_slice(inverted.sources_after(target, node));
                    }
                    candidates.sort_unstable();
                    candidates.dedup();
                    for &other in candidates.iter() {
                        if let Some(right) = vectors.get(other) {
                            if let Some(similarity) = self.score(left, right) {
                                emit(node, other, similarity);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Drive `compare_batch` over all batches into per-worker accumulators,
    /// then merge them. A single worker uses one accumulator throughout.
    fn fold_batches<A, I, F, M>(&self, vectors: &NeighborVectors, identity: I, fold: F, merge: M) -> A
    where
        A: Send,
        I: Fn() -> A + Send + Sync,
        F: Fn(&mut A, u64, u64, f64) + Send + Sync,
        M: Fn(A, A) -> A + Send + Sync,
    {
        let node_count = vectors.vectors.len() as u64;
        let batches = node_batches(node_count, self.config.concurrency);
        let progress = ProgressLogger::new("NodeSimilarity :: compare", node_count);
        progress.log_start();

        let result = if self.config.concurrency == 1 {
            let mut accumulator = identity();
            let mut candidates = Vec::new();
            for batch in batches {
                if !self.termination.running() {
                    break;
                }
                let size = batch.end - batch.start;
                self.compare_batch(vectors, batch, &mut candidates, &mut |a, b, s| fold(&mut accumulator, a, b, s));
                progress.log_progress(size);
            }
            accumulator
        } else {
            batches
                .into_par_iter()
                .fold(
                    || (identity(), Vec::new()),
                    |(mut accumulator, mut candidates), batch| {
                        if self.termination.running() {
                            let size = batch.end - batch.start;
                            self.compare_batch(vectors, batch, &mut candidates, &mut |a, b, s| {
                                fold(&mut accumulator, a, b, s)
                            });
                            progress.log_progress(size);
                        }
                        (accumulator, candidates)
                    },
                )
                .map(|(accumulator, _)| accumulator)
                .reduce(&identity, &merge)
        };
        progress.log_finish();
        result
    }

    fn compute_pairs(&self, vectors: &NeighborVectors) -> Vec<SimilarityResult> {
        let mut pairs = self.fold_batches(
            vectors,
            Vec::new,
            |rows: &mut Vec<SimilarityResult>, a, b, similarity| rows.push(SimilarityResult::new(a, b, similarity)),
            |mut left, right| {
                left.extend(right);
                left
            },
        );
        pairs.par_sort_unstable_by(|x, y| (x.node1, x.node2).cmp(&(y.node1, y.node2)));
        pairs
    }

    fn compute_top_k(&self, vectors: &NeighborVectors, limit: usize, order: SelectionOrder) -> Vec<Vec<ScoredNeighbor>> {
        let node_count = vectors.vectors.len() as u64;
        self.fold_batches(
            vectors,
            || TopKMap::new(node_count, limit, order),
            |map: &mut TopKMap, a, b, similarity| {
                map.offer(a, b, similarity);
                map.offer(b, a, similarity);
            },
            TopKMap::merge,
        )
        .into_sorted()
    }

    fn compute_top_n(&self, vectors: &NeighborVectors, limit: usize, order: SelectionOrder) -> Vec<SimilarityResult> {
        self.fold_batches(
            vectors,
            || BoundedSelection::new(limit, order),
            |selection: &mut BoundedSelection<SimilarityResult>, a, b, similarity| {
                let row = SimilarityResult::new(a, b, similarity);
                selection.offer(row);
                selection.offer(row.reverse());
            },
            |mut left, right| {
                left.merge(right);
                left
            },
        )
        .into_sorted_vec()
    }
}

/// Global bound over per-node lists.
fn select_top_n(lists: &[Vec<ScoredNeighbor>], limit: usize, order: SelectionOrder) -> Vec<SimilarityResult> {
    let mut selection = BoundedSelection::new(limit, order);
    for (node, list) in lists.iter().enumerate() {
        for neighbor in list {
            selection.offer(SimilarityResult::new(node as u64, neighbor.target, neighbor.score));
        }
    }
    selection.into_sorted_vec()
}
