//! # Graph Store
//!
//! Owns everything one load produced: the id map, node property columns,
//! and per relationship type an outgoing topology, an optional inverse
//! topology and their property stores. Views borrow nothing; they hold
//! `Arc`s, so a store can be released while views are still alive.
//!
//! ## Release protocol
//!
//! | Step | Effect |
//! |------|--------|
//! | `set_can_release(false)` | store is pinned, `release` fails with `ReleaseBlocked` |
//! | `release()` | drops the store's own references to every topology |
//! | topology with no live view | freed immediately, counted as released |
//! | topology still held by a view | freed when the last view drops, counted as deferred |

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashMap;
use serde::Serialize;

use super::graph::{CsrGraph, NodeFilteredGraph, UnionGraph};
use super::node_properties::{NodePropertyStore, NodePropertyValues};
use super::topology::{PropertyStore, Topology};
use super::Graph;
use crate::idmap::IdMap;
use crate::model::Direction;
use crate::{Error, Result};

/// Built topologies of one relationship type.
#[derive(Debug, Default)]
pub struct RelationshipTopologies {
    pub outgoing: Arc<Topology>,
    pub incoming: Option<Arc<Topology>>,
    pub outgoing_properties: HashMap<String, Arc<PropertyStore>>,
    pub incoming_properties: HashMap<String, Arc<PropertyStore>>,
}

impl RelationshipTopologies {
    /// Outgoing view over `id_map`, carrying `property` if given.
    pub fn into_graph(self, id_map: Arc<IdMap>, property: Option<&str>) -> Result<CsrGraph> {
        let property = match property {
            Some(key) => Some(
                self.outgoing_properties
                    .get(key)
                    .cloned()
                    .ok_or_else(|| Error::NotFound(format!("Relationship property '{key}'")))?,
            ),
            None => None,
        };
        Ok(CsrGraph::new(id_map, self.outgoing, property))
    }

    fn size_in_bytes(&self) -> usize {
        self.outgoing.size_in_bytes()
            + self.incoming.as_ref().map_or(0, |t| t.size_in_bytes())
            + self
                .outgoing_properties
                .values()
                .chain(self.incoming_properties.values())
                .map(|p| p.size_in_bytes())
                .sum::<usize>()
    }
}

/// Outcome of [`GraphStore::release`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    /// Bytes freed during the call.
    pub released_bytes: usize,
    /// Bytes still held by live views; freed when they drop.
    pub deferred_bytes: usize,
    /// Topologies and property stores still referenced by a view.
    pub deferred_structures: usize,
}

impl ReleaseReport {
    fn account<T>(&mut self, shared: Arc<T>, size: impl Fn(&T) -> usize) {
        match Arc::try_unwrap(shared) {
            Ok(owned) => self.released_bytes += size(&owned),
            Err(shared) => {
                self.deferred_bytes += size(&shared);
                self.deferred_structures += 1;
            }
        }
    }
}

// ============================================================================
// GraphStore
// ============================================================================

#[derive(Debug)]
pub struct GraphStore {
    id_map: Arc<IdMap>,
    node_properties: NodePropertyStore,
    relationships: HashMap<String, RelationshipTopologies>,
    can_release: AtomicBool,
    released: bool,
}

impl GraphStore {
    pub(crate) fn new(
        id_map: Arc<IdMap>,
        node_properties: NodePropertyStore,
        relationships: HashMap<String, RelationshipTopologies>,
    ) -> Self {
        Self {
            id_map,
            node_properties,
            relationships,
            can_release: AtomicBool::new(true),
            released: false,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.released {
            return Err(Error::Released);
        }
        Ok(())
    }

    fn topologies(&self, rel_type: &str) -> Result<&RelationshipTopologies> {
        self.ensure_live()?;
        self.relationships
            .get(rel_type)
            .ok_or_else(|| Error::NotFound(format!("Relationship type '{rel_type}'")))
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub fn id_map(&self) -> &Arc<IdMap> {
        &self.id_map
    }

    pub fn node_count(&self) -> u64 {
        self.id_map.node_count()
    }

    /// Stored relationships over all types, counting the outgoing side.
    pub fn relationship_count(&self) -> u64 {
        self.relationships.values().map(|r| r.outgoing.relationship_count()).sum()
    }

    /// Relationship types, sorted.
    pub fn relationship_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.relationships.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Property keys stored for `rel_type`, sorted.
    pub fn relationship_property_keys(&self, rel_type: &str) -> Result<Vec<&str>> {
        let topologies = self.topologies(rel_type)?;
        let mut keys: Vec<&str> = topologies.outgoing_properties.keys().map(String::as_str).collect();
        keys.sort_unstable();
        Ok(keys)
    }

    pub fn has_inverse_index(&self, rel_type: &str) -> Result<bool> {
        Ok(self.topologies(rel_type)?.incoming.is_some())
    }

    pub fn node_properties(&self) -> &NodePropertyStore {
        &self.node_properties
    }

    pub fn node_property(&self, key: &str) -> Option<&NodePropertyValues> {
        self.node_properties.get(key)
    }

    pub fn size_in_bytes(&self) -> usize {
        self.id_map.size_in_bytes()
            + self.node_properties.size_in_bytes()
            + self.relationships.values().map(RelationshipTopologies::size_in_bytes).sum::<usize>()
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// One relationship type in one direction.
    ///
    /// `Incoming` needs the inverse index unless the type was loaded
    /// undirected. `Both` is only meaningful through [`Self::union_graph`].
    pub fn graph(&self, rel_type: &str, direction: Direction) -> Result<CsrGraph> {
        let (topology, _) = self.select(rel_type, direction, None)?;
        Ok(CsrGraph::new(self.id_map.clone(), topology, None))
    }

    /// Like [`Self::graph`], carrying one relationship property.
    pub fn graph_with_property(&self, rel_type: &str, direction: Direction, key: &str) -> Result<CsrGraph> {
        let (topology, property) = self.select(rel_type, direction, Some(key))?;
        Ok(CsrGraph::new(self.id_map.clone(), topology, property))
    }

    fn select(
        &self,
        rel_type: &str,
        direction: Direction,
        key: Option<&str>,
    ) -> Result<(Arc<Topology>, Option<Arc<PropertyStore>>)> {
        let topologies = self.topologies(rel_type)?;
        let (topology, properties) = match direction {
            Direction::Outgoing => (&topologies.outgoing, &topologies.outgoing_properties),
            Direction::Incoming if topologies.outgoing.is_undirected() => {
                (&topologies.outgoing, &topologies.outgoing_properties)
            }
            Direction::Incoming => match &topologies.incoming {
                Some(incoming) => (incoming, &topologies.incoming_properties),
                None => {
                    return Err(Error::InvalidConfiguration(format!(
                        "relationship type '{rel_type}' was loaded without an inverse index"
                    )));
                }
            },
            Direction::Both => {
                return Err(Error::InvalidConfiguration(
                    "a single topology has one direction; use union_graph for BOTH".into(),
                ));
            }
        };
        let property = match key {
            Some(key) => Some(
                properties
                    .get(key)
                    .cloned()
                    .ok_or_else(|| Error::NotFound(format!("Relationship property '{key}' on '{rel_type}'")))?,
            ),
            None => None,
        };
        Ok((topology.clone(), property))
    }

    /// Several relationship types merged into one view. `Both` pulls in the
    /// inverse topology of every directed type.
    pub fn union_graph(&self, rel_types: &[&str], direction: Direction) -> Result<UnionGraph> {
        let mut graphs = Vec::with_capacity(rel_types.len() * 2);
        for rel_type in rel_types {
            match direction {
                Direction::Both => {
                    graphs.push(self.graph(rel_type, Direction::Outgoing)?);
                    if !self.topologies(rel_type)?.outgoing.is_undirected() {
                        graphs.push(self.graph(rel_type, Direction::Incoming)?);
                    }
                }
                single => graphs.push(self.graph(rel_type, single)?),
            }
        }
        UnionGraph::new(graphs)
    }

    /// Restrict `graph` to nodes carrying any of `labels`, counting the
    /// remaining relationships on `concurrency` workers.
    pub fn node_filtered<G: Graph>(
        &self,
        graph: G,
        labels: &[&str],
        concurrency: usize,
    ) -> Result<NodeFilteredGraph<G>> {
        self.ensure_live()?;
        if !Arc::ptr_eq(graph.id_map(), &self.id_map) {
            return Err(Error::InvalidConfiguration(
                "graph was not projected from this store".into(),
            ));
        }
        let filter = Arc::new(self.id_map.filter(labels)?);
        NodeFilteredGraph::new(graph, filter, concurrency)
    }

    // ========================================================================
    // Release
    // ========================================================================

    /// Whether [`Self::release`] may proceed. A catalog clears this while
    /// the store is registered.
    pub fn set_can_release(&self, can_release: bool) {
        self.can_release.store(can_release, Ordering::Release);
    }

    pub fn can_release(&self) -> bool {
        self.can_release.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Drop the store's references to every topology and property column.
    pub fn release(&mut self) -> Result<ReleaseReport> {
        self.ensure_live()?;
        if !self.can_release() {
            return Err(Error::ReleaseBlocked("graph store is still registered".into()));
        }

        let mut report = ReleaseReport::default();
        for (_, topologies) in self.relationships.drain() {
            report.account(topologies.outgoing, Topology::size_in_bytes);
            if let Some(incoming) = topologies.incoming {
                report.account(incoming, Topology::size_in_bytes);
            }
            for (_, property) in topologies
                .outgoing_properties
                .into_iter()
                .chain(topologies.incoming_properties)
            {
                report.account(property, PropertyStore::size_in_bytes);
            }
        }
        report.released_bytes += self.node_properties.size_in_bytes();
        self.node_properties = NodePropertyStore::default();
        self.released = true;

        tracing::info!(
            released_bytes = report.released_bytes,
            deferred_bytes = report.deferred_bytes,
            deferred_structures = report.deferred_structures,
            "graph_store.released"
        );
        Ok(report)
    }
}
