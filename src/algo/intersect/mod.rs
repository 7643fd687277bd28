//! # Graph Intersect
//!
//! Triangle enumeration by merge-joining sorted adjacency cursors.
//!
//! For an anchor `a`, every neighbor `b > a` is visited; for each such `b`
//! the anchor's cursor is forked at its current position (just past `b`) and
//! walked in lockstep with `b`'s cursor. Values present in both are the
//! third corners `c > b`, so every triangle is reported exactly once, as
//! `a < b < c`.
//!
//! ```text
//! cursor(a):  … b │ c₁  c₂  c₃ …      fork = copy_state_from(cursor(a))
//! cursor(b):  … b │ c₀  c₂  c₃ …      skip_until(b)
//!                        ╰───╯ common → (a, b, c₂), (a, b, c₃)
//! ```
//!
//! The topology has to be undirected: a triangle is only found from its
//! smallest corner, which needs the edges in both directions.

pub mod triangle_count;

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::concurrency::{node_batches, run_in_pool, validate_concurrency, TerminationFlag, DEFAULT_CONCURRENCY};
use crate::progress::ProgressLogger;
use crate::storage::{AdjacencyCursor, Graph};
use crate::{Error, Result};

pub use triangle_count::{TriangleCount, TriangleCountResult};

/// Receives each triangle once, corners ascending.
pub trait IntersectionConsumer {
    fn accept(&mut self, a: u64, b: u64, c: u64);
}

impl<F: FnMut(u64, u64, u64)> IntersectionConsumer for F {
    fn accept(&mut self, a: u64, b: u64, c: u64) {
        self(a, b, c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triangle {
    pub a: u64,
    pub b: u64,
    pub c: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntersectConfig {
    pub concurrency: usize,
    /// Nodes with a higher degree take part in no triangle.
    pub max_degree: u32,
}

impl Default for IntersectConfig {
    fn default() -> Self {
        Self { concurrency: DEFAULT_CONCURRENCY, max_degree: u32::MAX }
    }
}

impl IntersectConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_concurrency(self.concurrency)
    }
}

// ============================================================================
// GraphIntersect
// ============================================================================

pub struct GraphIntersect<'g, G: Graph> {
    graph: &'g G,
    max_degree: u32,
}

impl<'g, G: Graph> GraphIntersect<'g, G> {
    pub fn new(graph: &'g G, max_degree: u32) -> Result<Self> {
        if !graph.is_undirected() {
            return Err(Error::InvalidConfiguration(
                "triangle intersection needs an undirected topology".into(),
            ));
        }
        Ok(Self { graph, max_degree })
    }

    #[inline]
    fn admits(&self, node: u64) -> bool {
        self.graph.degree(node) <= self.max_degree
    }

    /// Report every triangle whose smallest corner is `anchor`.
    pub fn intersect(&self, anchor: u64, consumer: &mut impl IntersectionConsumer) {
        if !self.admits(anchor) {
            return;
        }
        let mut cursor_a = self.graph.adjacency_cursor(anchor);
        let mut fork = cursor_a.clone();
        let mut node_b = cursor_a.skip_until(anchor);
        while let Some(b) = node_b {
            if self.admits(b) {
                let mut cursor_b = self.graph.adjacency_cursor(b);
                fork.copy_state_from(&cursor_a);
                self.close_triangles(anchor, b, &mut fork, &mut cursor_b, consumer);
            }
            // next distinct b; parallel relationships repeat b in the run
            node_b = cursor_a.skip_until(b);
        }
    }

    /// Merge-join the rest of `a`'s run (in `cursor_c`) against `b`'s run
    /// past `b`, reporting each common value once.
    fn close_triangles<C: AdjacencyCursor>(
        &self,
        a: u64,
        b: u64,
        cursor_c: &mut C,
        cursor_b: &mut C,
        consumer: &mut impl IntersectionConsumer,
    ) {
        let mut last_c = b;
        let mut from_a = cursor_c.next();
        let mut from_b = cursor_b.skip_until(b);
        while let (Some(x), Some(y)) = (from_a, from_b) {
            match x.cmp(&y) {
                Ordering::Less => from_a = cursor_c.advance(y),
                Ordering::Greater => from_b = cursor_b.advance(x),
                Ordering::Equal => {
                    if x > last_c && self.admits(x) {
                        consumer.accept(a, b, x);
                    }
                    last_c = x;
                    from_a = cursor_c.skip_until(x);
                    from_b = cursor_b.skip_until(x);
                }
            }
        }
    }

    /// Run [`Self::intersect`] for every node, one consumer per batch.
    ///
    /// Returns the consumers in batch order, or `None` when terminated.
    pub fn intersect_all<C, F>(&self, concurrency: usize, termination: &TerminationFlag, consumer: F) -> Result<Option<Vec<C>>>
    where
        C: IntersectionConsumer + Send,
        F: Fn() -> C + Send + Sync,
    {
        let node_count = self.graph.node_count();
        let progress = ProgressLogger::new("GraphIntersect", node_count);
        progress.log_start();
        let consumers = run_in_pool(concurrency, || {
            node_batches(node_count, concurrency)
                .into_par_iter()
                .map(|batch| {
                    let mut sink = consumer();
                    if termination.running() {
                        let size = batch.end - batch.start;
                        for anchor in batch {
                            self.intersect(anchor, &mut sink);
                        }
                        progress.log_progress(size);
                    }
                    sink
                })
                .collect::<Vec<C>>()
        })?;
        if !termination.running() {
            tracing::warn!("graph_intersect.terminated");
            return Ok(None);
        }
        progress.log_finish();
        Ok(Some(consumers))
    }
}

/// All triangles of `graph`, sorted.
pub fn triangles<G: Graph>(graph: &G, config: &IntersectConfig, termination: &TerminationFlag) -> Result<Option<Vec<Triangle>>> {
    config.validate()?;
    let intersect = GraphIntersect::new(graph, config.max_degree)?;
    let Some(batches) = intersect.intersect_all(config.concurrency, termination, TriangleCollector::default)? else {
        return Ok(None);
    };
    let mut triangles: Vec<Triangle> = batches.into_iter().flat_map(|batch| batch.triangles).collect();
    triangles.sort_unstable();
    tracing::info!(triangles = triangles.len(), "graph_intersect.finish");
    Ok(Some(triangles))
}

#[derive(Debug, Default)]
struct TriangleCollector {
    triangles: Vec<Triangle>,
}

impl IntersectionConsumer for TriangleCollector {
    fn accept(&mut self, a: u64, b: u64, c: u64) {
        self.triangles.push(Triangle { a, b, c });
    }
}
