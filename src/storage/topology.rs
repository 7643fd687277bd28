//! # Topology
//!
//! One relationship type in one direction: an offset table, the paged store
//! its runs live in, the element count, and whether it was built undirected.
//! Optional property stores hang off it, keyed by property name, with the
//! same offsets layout.
//!
//! A topology is immutable once built. Views share it through `Arc` and
//! never copy adjacency bytes.

use super::cursor::{CompressedCursor, PropertyCursor};
use super::offsets::AdjacencyOffsets;
use super::paged::PagedByteStore;

/// Compressed adjacency for one (relationship type, direction).
#[derive(Debug, Default)]
pub struct Topology {
    offsets: AdjacencyOffsets,
    store: PagedByteStore,
    relationship_count: u64,
    undirected: bool,
}

impl Topology {
    pub(crate) fn new(
        offsets: AdjacencyOffsets,
        store: PagedByteStore,
        relationship_count: u64,
        undirected: bool,
    ) -> Self {
        Self { offsets, store, relationship_count, undirected }
    }

    pub fn node_count(&self) -> u64 {
        self.offsets.len() as u64
    }

    pub fn relationship_count(&self) -> u64 {
        self.relationship_count
    }

    pub fn is_undirected(&self) -> bool {
        self.undirected
    }

    pub fn offsets(&self) -> &AdjacencyOffsets {
        &self.offsets
    }

    pub fn store(&self) -> &PagedByteStore {
        &self.store
    }

    #[inline]
    pub fn degree(&self, node: u64) -> u32 {
        self.store.degree(self.offsets.get(node))
    }

    #[inline]
    pub fn cursor(&self, node: u64) -> CompressedCursor<'_> {
        self.store.cursor(self.offsets.get(node))
    }

    /// Bytes held by pages and the offset table.
    pub fn size_in_bytes(&self) -> usize {
        self.store.allocated_bytes() + self.offsets.size_in_bytes()
    }
}

/// One relationship property laid out parallel to a [`Topology`].
#[derive(Debug, Default)]
pub struct PropertyStore {
    offsets: AdjacencyOffsets,
    store: PagedByteStore,
    default_value: f64,
}

impl PropertyStore {
    pub(crate) fn new(offsets: AdjacencyOffsets, store: PagedByteStore, default_value: f64) -> Self {
        Self { offsets, store, default_value }
    }

    /// Value used for relationships that were loaded without this property.
    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    /// Property values of `node`'s relationships; `degree` comes from the
    /// owning topology.
    #[inline]
    pub fn cursor(&self, node: u64, degree: u32) -> PropertyCursor<'_> {
        self.store.property_cursor(self.offsets.get(node), degree)
    }

    pub fn size_in_bytes(&self) -> usize {
        self.store.allocated_bytes() + self.offsets.size_in_bytes()
    }
}
