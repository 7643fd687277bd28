//! Triangle count and local clustering coefficient.
//!
//! Every triangle reported by [`GraphIntersect`] credits all three corners.
//! The local clustering coefficient of a node with `d` distinct neighbors
//! and `t` triangles is `2t / (d (d - 1))`, and `0` when `d < 2`.
//!
//! Nodes above `max_degree` are skipped entirely: they report no count and
//! no coefficient, and are left out of the average.

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use super::{GraphIntersect, IntersectConfig, IntersectionConsumer};
use crate::concurrency::{run_in_pool, TerminationFlag};
use crate::storage::Graph;
use crate::Result;

pub struct TriangleCount<'g, G: Graph> {
    graph: &'g G,
    config: IntersectConfig,
    termination: TerminationFlag,
}

impl<'g, G: Graph> TriangleCount<'g, G> {
    pub fn new(graph: &'g G, config: IntersectConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { graph, config, termination: TerminationFlag::new() })
    }

    pub fn with_termination_flag(mut self, termination: TerminationFlag) -> Self {
        self.termination = termination;
        self
    }

    /// `None` when terminated before completion.
    pub fn compute(&self) -> Result<Option<TriangleCountResult>> {
        let intersect = GraphIntersect::new(self.graph, self.config.max_degree)?;
        let node_count = self.graph.node_count();
        let counts: Vec<AtomicU64> = (0..node_count).map(|_| AtomicU64::new(0)).collect();

        let Some(consumers) = intersect.intersect_all(self.config.concurrency, &self.termination, || {
            CountingConsumer { counts: &counts, triangles: 0 }
        })?
        else {
            return Ok(None);
        };
        let global_triangle_count: u64 = consumers.into_iter().map(|c| c.triangles).sum();

        let degrees = run_in_pool(self.config.concurrency, || {
            (0..node_count)
                .into_par_iter()
                .map(|node| self.distinct_degree(node))
                .collect::<Vec<u64>>()
        })?;

        let max_degree = u64::from(self.config.max_degree);
        let mut triangle_counts = Vec::with_capacity(counts.len());
        let mut clustering_coefficients = Vec::with_capacity(counts.len());
        for (node, count) in counts.into_iter().enumerate() {
            if u64::from(self.graph.degree(node as u64)) > max_degree {
                triangle_counts.push(None);
                clustering_coefficients.push(None);
                continue;
            }
            let triangles = count.into_inner();
            triangle_counts.push(Some(triangles));
            clustering_coefficients.push(Some(local_clustering_coefficient(triangles, degrees[node])));
        }

        tracing::info!(
            triangles = global_triangle_count,
            nodes = node_count,
            "triangle_count.finish"
        );
        Ok(Some(TriangleCountResult { triangle_counts, global_triangle_count, clustering_coefficients }))
    }

    /// Neighbors counted once each, self-loops ignored.
    fn distinct_degree(&self, node: u64) -> u64 {
        let mut previous = None;
        let mut degree = 0;
        for target in self.graph.adjacency_cursor(node) {
            if target != node && previous != Some(target) {
                degree += 1;
            }
            previous = Some(target);
        }
        degree
    }
}

fn local_clustering_coefficient(triangles: u64, degree: u64) -> f64 {
    if degree < 2 {
        return 0.0;
    }
    (2 * triangles) as f64 / (degree * (degree - 1)) as f64
}

struct CountingConsumer<'c> {
    counts: &'c [AtomicU64],
    triangles: u64,
}

impl IntersectionConsumer for CountingConsumer<'_> {
    fn accept(&mut self, a: u64, b: u64, c: u64) {
        for node in [a, b, c] {
            self.counts[node as usize].fetch_add(1, Ordering::Relaxed);
        }
        self.triangles += 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriangleCountResult {
    triangle_counts: Vec<Option<u64>>,
    global_triangle_count: u64,
    clustering_coefficients: Vec<Option<f64>>,
}

impl TriangleCountResult {
    /// `None` for nodes skipped by `max_degree`.
    pub fn triangle_count(&self, node: u64) -> Option<u64> {
        self.triangle_counts.get(node as usize).copied().flatten()
    }

    pub fn triangle_counts(&self) -> &[Option<u64>] {
        &self.triangle_counts
    }

    pub fn global_triangle_count(&self) -> u64 {
        self.global_triangle_count
    }

    pub fn local_clustering_coefficient(&self, node: u64) -> Option<f64> {
        self.clustering_coefficients.get(node as usize).copied().flatten()
    }

    /// Mean over the nodes that were not skipped; `0` when there are none.
    pub fn average_clustering_coefficient(&self) -> f64 {
        let (sum, count) = self
            .clustering_coefficients
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(sum, count), lcc| (sum + lcc, count + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{RelationshipsBuilder, RelationshipsConfig};
    use crate::idmap::IdMap;
    use crate::model::{NodeId, Orientation};
    use crate::storage::CsrGraph;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn undirected(node_count: u64, edges: &[(u64, u64)]) -> CsrGraph {
        let id_map = Arc::new(IdMap::from_original_ids((0..node_count).map(NodeId)).unwrap());
        let config = RelationshipsConfig::new().with_orientation(Orientation::Undirected);
        let builder = RelationshipsBuilder::new(id_map.clone(), config, 2).unwrap();
        for &(s, t) in edges {
            builder.add(s, t);
        }
        builder.build().unwrap().into_graph(id_map, None).unwrap()
    }

    #[test]
    fn test_two_triangles_sharing_an_edge() {
        let graph = undirected(5, &[(0, 1), (0, 2), (1, 2), (0, 3), (1, 3), (3, 4)]);
        let result = TriangleCount::new(&graph, IntersectConfig::default()).unwrap().compute().unwrap().unwrap();

        assert_eq!(result.global_triangle_count(), 2);
        assert_eq!(result.triangle_counts(), &[Some(2), Some(2), Some(1), Some(1), Some(0)]);
        // node 0: neighbors {1, 2, 3}, 2 triangles -> 4 / 6
        assert_eq!(result.local_clustering_coefficient(0), Some(2.0 / 3.0));
        assert_eq!(result.local_clustering_coefficient(2), Some(1.0));
        assert_eq!(result.local_clustering_coefficient(4), Some(0.0));
    }

    #[test]
    fn test_self_loops_and_duplicates_do_not_inflate_degree() {
        let graph = undirected(3, &[(0, 1), (0, 1), (1, 2), (2, 0), (0, 0)]);
        let result = TriangleCount::new(&graph, IntersectConfig::default()).unwrap().compute().unwrap().unwrap();
        assert_eq!(result.global_triangle_count(), 1);
        assert_eq!(result.local_clustering_coefficient(0), Some(1.0));
        assert_eq!(result.average_clustering_coefficient(), 1.0);
    }

    #[test]
    fn test_max_degree_skips_hubs() {
        let graph = undirected(4, &[(0, 1), (0, 2), (1, 2), (0, 3)]);
        let config = IntersectConfig { max_degree: 2, ..IntersectConfig::default() };
        let result = TriangleCount::new(&graph, config).unwrap().compute().unwrap().unwrap();
        assert_eq!(result.triangle_count(0), None);
        assert_eq!(result.triangle_count(1), Some(0));
        assert_eq!(result.global_triangle_count(), 0);
    }

    #[test]
    fn test_terminated() {
        let graph = undirected(3, &[(0, 1), (1, 2), (2, 0)]);
        let flag = TerminationFlag::new();
        flag.terminate();
        let count = TriangleCount::new(&graph, IntersectConfig::default()).unwrap().with_termination_flag(flag);
        assert!(count.compute().unwrap().is_none());
    }
}
