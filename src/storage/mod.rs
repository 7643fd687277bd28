//! # Graph Storage
//!
//! [`Graph`] is THE contract between the compressed store and every
//! algorithm. Algorithms see dense node ids, degrees and cursors; they never
//! touch pages or offsets.
//!
//! ## Implementations
//!
//! | View | Module | Description |
//! |------|--------|-------------|
//! | `CsrGraph` | `graph` | One relationship type, one direction, optional property |
//! | `UnionGraph` | `graph` | Several topologies merged into one sorted stream per node |
//! | `NodeFilteredGraph` | `graph` | A label subset re-compacted into its own id space |
//!
//! All views are read-only and `Send + Sync`; any number of threads may open
//! cursors on the same view at once.

pub mod varint;
pub mod paged;
pub mod cursor;
pub mod offsets;
pub mod topology;
pub mod graph;
pub mod node_properties;
pub mod store;
pub mod estimate;

use std::sync::Arc;

use crate::idmap::IdMap;
use crate::model::NodeId;

pub use cursor::{AdjacencyCursor, CompressedCursor, CursorState, PropertyCursor};
pub use graph::{CsrGraph, FilteredCursor, NodeFilteredGraph, UnionCursor, UnionGraph};
pub use node_properties::{NodePropertyStore, NodePropertyValues};
pub use paged::PagedByteStore;
pub use store::{GraphStore, RelationshipTopologies, ReleaseReport};
pub use topology::{PropertyStore, Topology};

// ============================================================================
// Graph Trait
// ============================================================================

/// Read access to one projected topology.
///
/// Node ids are dense internal ids in `0..node_count()`. Every adjacency
/// list is sorted ascending; duplicates appear only when the topology was
/// built without aggregation.
pub trait Graph: Send + Sync {
    /// Cursor type handed out by [`Graph::adjacency_cursor`].
    type Cursor<'a>: AdjacencyCursor + Clone
    where
        Self: 'a;

    // ========================================================================
    // Identity
    // ========================================================================

    /// The id space this view addresses nodes in.
    fn id_map(&self) -> &Arc<IdMap>;

    fn node_count(&self) -> u64 {
        self.id_map().node_count()
    }

    fn to_original_node_id(&self, node: u64) -> NodeId {
        self.id_map().to_external(node)
    }

    fn to_mapped_node_id(&self, original: NodeId) -> Option<u64> {
        self.id_map().to_internal(original)
    }

    // ========================================================================
    // Topology
    // ========================================================================

    fn relationship_count(&self) -> u64;

    /// Whether every relationship is stored in both directions.
    fn is_undirected(&self) -> bool;

    fn degree(&self, node: u64) -> u32;

    /// Cursor over `node`'s sorted targets. Nodes without relationships get
    /// an exhausted cursor.
    fn adjacency_cursor(&self, node: u64) -> Self::Cursor<'_>;

    /// Whether `source` has at least one relationship to `target`.
    fn exists(&self, source: u64, target: u64) -> bool {
        self.adjacency_cursor(source).advance(target) == Some(target)
    }

    /// Feed `(node, target)` pairs to `consumer` until it returns `false`.
    fn for_each_relationship(&self, node: u64, consumer: &mut dyn FnMut(u64, u64) -> bool) {
        for target in self.adjacency_cursor(node) {
            if !consumer(node, target) {
                break;
            }
        }
    }

    // ========================================================================
    // Relationship properties
    // ========================================================================

    fn has_relationship_property(&self) -> bool;

    /// Feed `(node, target, property)` triples to `consumer` until it returns
    /// `false`. Views without a property report `fallback`.
    fn for_each_relationship_with_property(
        &self,
        node: u64,
        fallback: f64,
        consumer: &mut dyn FnMut(u64, u64, f64) -> bool,
    );
}
