//! # Graph Views
//!
//! Read-only projections over built topologies. Views hold `Arc`s to shared
//! immutable data; creating one never copies adjacency bytes.

use std::sync::Arc;

use rayon::prelude::*;
use smallvec::SmallVec;

use super::cursor::{AdjacencyCursor, CompressedCursor, PropertyCursor};
use super::topology::{PropertyStore, Topology};
use super::Graph;
use crate::concurrency::{node_batches, run_in_pool};
use crate::idmap::{FilteredIdMap, IdMap};
use crate::{Error, Result};

// ============================================================================
// CsrGraph
// ============================================================================

/// One relationship type in one direction, optionally with one property.
#[derive(Debug, Clone)]
pub struct CsrGraph {
    id_map: Arc<IdMap>,
    topology: Arc<Topology>,
    property: Option<Arc<PropertyStore>>,
}

impl CsrGraph {
    pub fn new(id_map: Arc<IdMap>, topology: Arc<Topology>, property: Option<Arc<PropertyStore>>) -> Self {
        debug_assert_eq!(id_map.node_count(), topology.node_count());
        Self { id_map, topology, property }
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn property_store(&self) -> Option<&Arc<PropertyStore>> {
        self.property.as_ref()
    }

    /// Property values of `node`'s relationships, aligned with its cursor.
    pub fn property_cursor(&self, node: u64) -> Option<PropertyCursor<'_>> {
        let store = self.property.as_ref()?;
        Some(store.cursor(node, self.topology.degree(node)))
    }
}

impl Graph for CsrGraph {
    type Cursor<'a> = CompressedCursor<'a>;

    fn id_map(&self) -> &Arc<IdMap> {
        &self.id_map
    }

    fn relationship_count(&self) -> u64 {
        self.topology.relationship_count()
    }

    fn is_undirected(&self) -> bool {
        self.topology.is_undirected()
    }

    #[inline]
    fn degree(&self, node: u64) -> u32 {
        self.topology.degree(node)
    }

    #[inline]
    fn adjacency_cursor(&self, node: u64) -> CompressedCursor<'_> {
        self.topology.cursor(node)
    }

    fn has_relationship_property(&self) -> bool {
        self.property.is_some()
    }

    fn for_each_relationship_with_property(
        &self,
        node: u64,
        fallback: f64,
        consumer: &mut dyn FnMut(u64, u64, f64) -> bool,
    ) {
        let targets = self.topology.cursor(node);
        match self.property_cursor(node) {
            Some(values) => {
                for (target, value) in targets.zip(values) {
                    if !consumer(node, target, value) {
                        break;
                    }
                }
            }
            None => {
                for target in targets {
                    if !consumer(node, target, fallback) {
                        break;
                    }
                }
            }
        }
    }
}

// ============================================================================
// UnionGraph
// ============================================================================

/// Several topologies over the same id space, read as one.
///
/// Adjacency cursors merge the per-topology runs so targets stay sorted.
/// Property iteration visits the topologies one after another.
#[derive(Debug, Clone)]
pub struct UnionGraph {
    id_map: Arc<IdMap>,
    graphs: Vec<CsrGraph>,
}

impl UnionGraph {
    pub fn new(graphs: Vec<CsrGraph>) -> Result<Self> {
        let first = graphs
            .first()
            .ok_or_else(|| Error::InvalidConfiguration("a union graph needs at least one topology".into()))?;
        let id_map = first.id_map.clone();
        if graphs.iter().any(|graph| !Arc::ptr_eq(&graph.id_map, &id_map)) {
            return Err(Error::InvalidConfiguration(
                "union members must share one id map".into(),
            ));
        }
        Ok(Self { id_map, graphs })
    }

    pub fn graphs(&self) -> &[CsrGraph] {
        &self.graphs
    }
}

impl Graph for UnionGraph {
    type Cursor<'a> = UnionCursor<'a>;

    fn id_map(&self) -> &Arc<IdMap> {
        &self.id_map
    }

    fn relationship_count(&self) -> u64 {
        self.graphs.iter().map(|graph| graph.relationship_count()).sum()
    }

    fn is_undirected(&self) -> bool {
        self.graphs.iter().all(|graph| graph.is_undirected())
    }

    fn degree(&self, node: u64) -> u32 {
        self.graphs.iter().map(|graph| graph.degree(node)).sum()
    }

    fn adjacency_cursor(&self, node: u64) -> UnionCursor<'_> {
        UnionCursor::new(self.graphs.iter().map(|graph| graph.adjacency_cursor(node)))
    }

    fn has_relationship_property(&self) -> bool {
        self.graphs.iter().all(|graph| graph.has_relationship_property())
    }

    fn for_each_relationship_with_property(
        &self,
        node: u64,
        fallback: f64,
        consumer: &mut dyn FnMut(u64, u64, f64) -> bool,
    ) {
        let mut stopped = false;
        for graph in &self.graphs {
            graph.for_each_relationship_with_property(node, fallback, &mut |source, target, value| {
                stopped = !consumer(source, target, value);
                !stopped
            });
            if stopped {
                break;
            }
        }
    }
}

/// k-way merge over several compressed cursors.
///
/// Each member's next target is decoded ahead into `heads`, so moving past a
/// value in one member never consumes a value the merge still has to emit.
#[derive(Debug, Clone)]
pub struct UnionCursor<'a> {
    cursors: SmallVec<[CompressedCursor<'a>; 4]>,
    heads: SmallVec<[Option<u64>; 4]>,
}

impl<'a> UnionCursor<'a> {
    fn new(members: impl Iterator<Item = CompressedCursor<'a>>) -> Self {
        let mut cursors: SmallVec<[CompressedCursor<'a>; 4]> = members.collect();
        let heads = cursors.iter_mut().map(|cursor| cursor.next()).collect();
        Self { cursors, heads }
    }

    fn min_head(&self) -> Option<(usize, u64)> {
        self.heads
            .iter()
            .enumerate()
            .filter_map(|(index, head)| head.map(|value| (index, value)))
            .min_by_key(|&(_, value)| value)
    }
}

impl Iterator for UnionCursor<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let (index, value) = self.min_head()?;
        self.heads[index] = self.cursors[index].next();
        Some(value)
    }
}

impl AdjacencyCursor for UnionCursor<'_> {
    fn remaining(&self) -> u32 {
        let buffered = self.heads.iter().filter(|head| head.is_some()).count() as u32;
        buffered + self.cursors.iter().map(|cursor| cursor.remaining()).sum::<u32>()
    }

    fn peek(&self) -> Option<u64> {
        self.min_head().map(|(_, value)| value)
    }

    fn skip_until(&mut self, target: u64) -> Option<u64> {
        for (head, cursor) in self.heads.iter_mut().zip(self.cursors.iter_mut()) {
            if matches!(*head, Some(value) if value <= target) {
                *head = cursor.skip_until(target);
            }
        }
        self.next()
    }

    fn advance(&mut self, target: u64) -> Option<u64> {
        for (head, cursor) in self.heads.iter_mut().zip(self.cursors.iter_mut()) {
            if matches!(*head, Some(value) if value < target) {
                *head = cursor.advance(target);
            }
        }
        self.next()
    }

    fn copy_state_from(&mut self, other: &Self) {
        self.cursors.clone_from(&other.cursors);
        self.heads.clone_from(&other.heads);
    }
}

// ============================================================================
// NodeFilteredGraph
// ============================================================================

/// A label subset of another view, addressed by its own dense ids.
///
/// Relationships whose other end fell out of the filter are dropped on the
/// fly. The filtered id map is monotone, so translated lists stay sorted.
#[derive(Debug, Clone)]
pub struct NodeFilteredGraph<G> {
    inner: G,
    filter: Arc<FilteredIdMap>,
    relationship_count: u64,
}

impl<G: Graph> NodeFilteredGraph<G> {
    /// Counts the surviving relationships on `concurrency` workers.
    pub fn new(inner: G, filter: Arc<FilteredIdMap>, concurrency: usize) -> Result<Self> {
        let relationship_count = run_in_pool(concurrency, || {
            node_batches(filter.node_count(), concurrency)
                .into_par_iter()
                .map(|batch| {
                    batch
                        .map(|node| {
                            inner
                                .adjacency_cursor(filter.to_root(node))
                                .filter(|&target| filter.to_filtered(target).is_some())
                                .count() as u64
                        })
                        .sum::<u64>()
                })
                .sum::<u64>()
        })?;
        Ok(Self { inner, filter, relationship_count })
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn filter(&self) -> &Arc<FilteredIdMap> {
        &self.filter
    }

    /// Root-graph internal id of a filtered id.
    pub fn to_root(&self, node: u64) -> u64 {
        self.filter.to_root(node)
    }
}

impl<G: Graph> Graph for NodeFilteredGraph<G> {
    type Cursor<'a>
        = FilteredCursor<'a, G::Cursor<'a>>
    where
        Self: 'a;

    fn id_map(&self) -> &Arc<IdMap> {
        self.filter.id_map()
    }

    fn relationship_count(&self) -> u64 {
        self.relationship_count
    }

    fn is_undirected(&self) -> bool {
        self.inner.is_undirected()
    }

    fn degree(&self, node: u64) -> u32 {
        self.adjacency_cursor(node).count() as u32
    }

    fn adjacency_cursor(&self, node: u64) -> Self::Cursor<'_> {
        FilteredCursor {
            inner: self.inner.adjacency_cursor(self.filter.to_root(node)),
            filter: &self.filter,
        }
    }

    fn has_relationship_property(&self) -> bool {
        self.inner.has_relationship_property()
    }

    fn for_each_relationship_with_property(
        &self,
        node: u64,
        fallback: f64,
        consumer: &mut dyn FnMut(u64, u64, f64) -> bool,
    ) {
        let filter = &self.filter;
        self.inner
            .for_each_relationship_with_property(filter.to_root(node), fallback, &mut |_, target, value| {
                match filter.to_filtered(target) {
                    Some(target) => consumer(node, target, value),
                    None => true,
                }
            });
    }
}

/// Cursor that translates root targets into filtered ids, skipping the
/// ones outside the filter.
#[derive(Debug, Clone)]
pub struct FilteredCursor<'a, C> {
    inner: C,
    filter: &'a FilteredIdMap,
}

impl<C: AdjacencyCursor> FilteredCursor<'_, C> {
    fn next_passing(&mut self, mut candidate: Option<u64>) -> Option<u64> {
        while let Some(root) = candidate {
            if let Some(filtered) = self.filter.to_filtered(root) {
                return Some(filtered);
            }
            candidate = self.inner.next();
        }
        None
    }

    fn drain(&mut self) -> Option<u64> {
        for _ in self.inner.by_ref() {}
        None
    }
}

impl<C: AdjacencyCursor> Iterator for FilteredCursor<'_, C> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let first = self.inner.next();
        self.next_passing(first)
    }
}

impl<C: AdjacencyCursor + Clone> AdjacencyCursor for FilteredCursor<'_, C> {
    /// Upper bound: filtered-out targets are only discovered while decoding.
    fn remaining(&self) -> u32 {
        self.inner.remaining()
    }

    fn has_next(&self) -> bool {
        self.peek().is_some()
    }

    fn peek(&self) -> Option<u64> {
        self.clone().next()
    }

    fn skip_until(&mut self, target: u64) -> Option<u64> {
        if target >= self.filter.node_count() {
            return self.drain();
        }
        let found = self.inner.skip_until(self.filter.to_root(target));
        self.next_passing(found)
    }

    fn advance(&mut self, target: u64) -> Option<u64> {
        if target >= self.filter.node_count() {
            return self.drain();
        }
        let found = self.inner.advance(self.filter.to_root(target));
        self.next_passing(found)
    }

    fn copy_state_from(&mut self, other: &Self) {
        self.inner.copy_state_from(&other.inner);
        self.filter = other.filter;
    }
}
