//! # Identifier Map
//!
//! Bijection between the external node ids a loader hands over (sparse,
//! possibly huge) and the dense internal ids `0..node_count` the paged
//! store is addressed by.
//!
//! Internal ids are assigned in ascending external-id order, so both
//! directions are monotone. Filtered maps rely on this: re-compacting a
//! label subset keeps the relative order of its members, which keeps
//! adjacency lists sorted after translation.
//!
//! | Direction | Structure | Cost |
//! |-----------|-----------|------|
//! | internal → external | dense `Vec<u64>` | O(1) |
//! | external → internal | [`SparseLongArray`] | O(1) amortized |

pub mod sparse;

use std::sync::Arc;

use hashbrown::HashMap;
use rayon::prelude::*;
use roaring::RoaringTreemap;

use crate::model::NodeId;
use crate::{Error, Result};

pub use sparse::SparseLongArray;

// ============================================================================
// IdMap
// ============================================================================

#[derive(Debug, Default)]
pub struct IdMap {
    original_ids: Vec<u64>,
    to_internal: SparseLongArray,
    labels: HashMap<String, RoaringTreemap>,
}

impl IdMap {
    /// Build from external ids in any order. Duplicates are rejected.
    pub fn from_original_ids(ids: impl IntoIterator<Item = NodeId>) -> Result<Self> {
        let mut builder = IdMapBuilder::new();
        for id in ids {
            builder.add(id, &[] as &[&str]);
        }
        builder.build()
    }

    pub fn node_count(&self) -> u64 {
        self.original_ids.len() as u64
    }

    /// Dense internal id of an external id, if registered.
    #[inline]
    pub fn to_internal(&self, original: NodeId) -> Option<u64> {
        self.to_internal.get(original.0)
    }

    /// External id of an internal id. Total over `0..node_count`.
    #[inline]
    pub fn to_external(&self, internal: u64) -> NodeId {
        NodeId(self.original_ids[internal as usize])
    }

    #[inline]
    pub fn contains(&self, original: NodeId) -> bool {
        self.to_internal.contains(original.0)
    }

    pub fn highest_original_id(&self) -> Option<NodeId> {
        self.original_ids.last().copied().map(NodeId)
    }

    /// All labels known to this map, in no particular order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    pub fn has_label(&self, node: u64, label: &str) -> bool {
        self.labels.get(label).is_some_and(|set| set.contains(node))
    }

    /// Labels carried by `node`, sorted.
    pub fn node_labels(&self, node: u64) -> Vec<&str> {
        let mut labels: Vec<&str> = self
            .labels
            .iter()
            .filter(|(_, set)| set.contains(node))
            .map(|(label, _)| label.as_str())
            .collect();
        labels.sort_unstable();
        labels
    }

    /// Internal ids carrying `label`.
    pub fn nodes_with_label(&self, label: &str) -> Option<&RoaringTreemap> {
        self.labels.get(label)
    }

    /// Re-compact the nodes carrying any of `labels` into a second,
    /// independent id space.
    pub fn filter(&self, labels: &[&str]) -> Result<FilteredIdMap> {
        let mut selection = RoaringTreemap::new();
        for label in labels {
            let set = self
                .labels
                .get(*label)
                .ok_or_else(|| Error::NotFound(format!("Node label '{label}'")))?;
            selection |= set;
        }

        let root_ids: Vec<u64> = selection.iter().collect();
        let mut to_filtered = SparseLongArray::new();
        for (filtered, &root) in root_ids.iter().enumerate() {
            to_filtered.set(root, filtered as u64);
        }

        let mut inner = IdMapBuilder::new();
        for &root in &root_ids {
            let node_labels: Vec<&str> = self
                .labels
                .iter()
                .filter(|(_, set)| set.contains(root))
                .map(|(label, _)| label.as_str())
                .collect();
            inner.add(self.to_external(root), node_labels.as_slice());
        }

        Ok(FilteredIdMap {
            id_map: Arc::new(inner.build()?),
            root_ids,
            to_filtered,
        })
    }

    pub fn size_in_bytes(&self) -> usize {
        self.original_ids.len() * std::mem::size_of::<u64>()
            + self.to_internal.size_in_bytes()
            + self.labels.values().map(|set| set.serialized_size()).sum::<usize>()
    }
}

// ============================================================================
// IdMapBuilder
// ============================================================================

/// Collects observed external ids (and their labels), then assigns dense ids.
#[derive(Debug, Default)]
pub struct IdMapBuilder {
    ids: Vec<u64>,
    labels: HashMap<String, Vec<u64>>,
}

impl IdMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { ids: Vec::with_capacity(capacity), labels: HashMap::new() }
    }

    pub fn add(&mut self, original: NodeId, labels: &[impl AsRef<str>]) {
        self.ids.push(original.0);
        for label in labels {
            self.labels
                .entry_ref(label.as_ref())
                .or_default()
                .push(original.0);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Sort, reject duplicates, assign dense ids in ascending external order.
    pub fn build(self) -> Result<IdMap> {
        let Self { mut ids, labels } = self;
        ids.par_sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::DuplicateNode(pair[0]));
        }

        let mut to_internal = SparseLongArray::new();
        for (internal, &original) in ids.iter().enumerate() {
            to_internal.set(original, internal as u64);
        }

        let labels = labels
            .into_iter()
            .map(|(label, members)| {
                let set: RoaringTreemap = members
                    .into_iter()
                    .filter_map(|original| to_internal.get(original))
                    .collect();
                (label, set)
            })
            .collect();

        tracing::debug!(nodes = ids.len(), pages = to_internal.page_count(), "idmap.built");

        Ok(IdMap { original_ids: ids, to_internal, labels })
    }
}

// ============================================================================
// FilteredIdMap
// ============================================================================

/// A label subset re-compacted into its own dense range.
///
/// Holds its own [`IdMap`] (external ids of the subset) plus the translation
/// to and from the root map's internal ids.
#[derive(Debug)]
pub struct FilteredIdMap {
    id_map: Arc<IdMap>,
    root_ids: Vec<u64>,
    to_filtered: SparseLongArray,
}

impl FilteredIdMap {
    pub fn id_map(&self) -> &Arc<IdMap> {
        &self.id_map
    }

    pub fn node_count(&self) -> u64 {
        self.root_ids.len() as u64
    }

    /// Filtered id of a root internal id, if the node passed the filter.
    #[inline]
    pub fn to_filtered(&self, root: u64) -> Option<u64> {
        self.to_filtered.get(root)
    }

    #[inline]
    pub fn to_root(&self, filtered: u64) -> u64 {
        self.root_ids[filtered as usize]
    }
}
