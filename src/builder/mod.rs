//! # Graph Store Builder
//!
//! Loads nodes and relationships given in external ids into a
//! [`GraphStore`].
//!
//! ```text
//! add_node*  ──► IdMapBuilder ──► IdMap ──► node property columns
//! add_relationship* ──► per type: RelationshipsBuilder ──► Topology (+ inverse, + properties)
//! ```
//!
//! Node property types are checked as nodes arrive; relationship endpoints
//! are checked during `build`, once the id map exists.

pub mod aggregation;
pub mod allocator;
pub mod relationships;

use std::sync::Arc;

use hashbrown::HashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::concurrency::{run_in_pool, validate_concurrency, DEFAULT_CONCURRENCY};
use crate::idmap::IdMapBuilder;
use crate::model::{Node, Relationship, ValueType};
use crate::storage::node_properties::NodePropertyStoreBuilder;
use crate::storage::store::GraphStore;
use crate::{Error, Result};

pub use aggregation::Aggregation;
pub use allocator::{PageAllocator, PageClaim, WriteHandle};
pub use relationships::{PropertyConfig, RelationshipsBuilder, RelationshipsConfig, SelfLoops};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphStoreConfig {
    pub concurrency: usize,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self { concurrency: DEFAULT_CONCURRENCY }
    }
}

impl GraphStoreConfig {
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
// GraphStoreBuilder
// ============================================================================

#[derive(Debug)]
pub struct GraphStoreBuilder {
    config: GraphStoreConfig,
    nodes: Vec<Node>,
    property_types: HashMap<String, ValueType>,
    relationship_configs: HashMap<String, RelationshipsConfig>,
    relationships: HashMap<String, Vec<Relationship>>,
}

impl Default for GraphStoreBuilder {
    fn default() -> Self {
        Self {
            config: GraphStoreConfig::default(),
            nodes: Vec::new(),
            property_types: HashMap::new(),
            relationship_configs: HashMap::new(),
            relationships: HashMap::new(),
        }
    }
}

impl GraphStoreBuilder {
    pub fn new(config: GraphStoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, ..Self::default() })
    }

    /// Configure how `rel_type` is projected. Types without a config use
    /// [`RelationshipsConfig::default`].
    pub fn relationship_type(&mut self, rel_type: impl Into<String>, config: RelationshipsConfig) -> Result<&mut Self> {
        config.validate()?;
        let rel_type = rel_type.into();
        self.relationships.entry(rel_type.clone()).or_default();
        self.relationship_configs.insert(rel_type, config);
        Ok(self)
    }

    /// Register a node. Fails when a property's type differs from the type
    /// the key was first seen with.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        for (key, value) in &node.properties {
            let Some(value_type) = value.value_type() else { continue };
            match self.property_types.get(key) {
                Some(&known) if known != value_type => {
                    return Err(Error::TypeError {
                        expected: format!("{known} for node property '{key}'"),
                        got: value_type.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    self.property_types.insert(key.clone(), value_type);
                }
            }
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn add_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) -> Result<()> {
        nodes.into_iter().try_for_each(|node| self.add_node(node))
    }

    /// Buffer a relationship. Endpoints are resolved during [`Self::build`].
    pub fn add_relationship(&mut self, relationship: Relationship) {
        self.relationships
            .entry_ref(relationship.rel_type.as_str())
            .or_default()
            .push(relationship);
    }

    pub fn add_relationships(&mut self, relationships: impl IntoIterator<Item = Relationship>) {
        for relationship in relationships {
            self.add_relationship(relationship);
        }
    }

    pub fn build(self) -> Result<GraphStore> {
        let Self { config, nodes, property_types, mut relationship_configs, relationships } = self;

        let mut ids = IdMapBuilder::with_capacity(nodes.len());
        for node in &nodes {
            ids.add(node.id, node.labels.as_slice());
        }
        let id_map = Arc::new(ids.build()?);

        let mut properties = NodePropertyStoreBuilder::new(id_map.node_count(), &property_types);
        for node in nodes {
            let internal = id_map.to_internal(node.id).ok_or_else(|| Error::UnknownNode {
                id: node.id.0,
                context: "node registration".into(),
            })?;
            for key in node.properties.keys() {
                for label in &node.labels {
                    properties.record_label_key(label, key);
                }
            }
            for (key, value) in node.properties {
                properties.set(internal, &key, value)?;
            }
        }
        let node_properties = properties.build();

        let mut topologies = HashMap::with_capacity(relationships.len());
        for (rel_type, batch) in relationships {
            let rel_config = relationship_configs.remove(&rel_type).unwrap_or_default();
            let builder = RelationshipsBuilder::new(id_map.clone(), rel_config, config.concurrency)?;
            run_in_pool(config.concurrency, || {
                batch
                    .par_iter()
                    .try_for_each(|rel| builder.add_original(rel.src, rel.dst, &rel.properties))
            })??;
            topologies.insert(rel_type, builder.build()?);
        }

        let store = GraphStore::new(id_map, node_properties, topologies);
        tracing::info!(
            nodes = store.node_count(),
            relationships = store.relationship_count(),
            types = store.relationship_types().len(),
            bytes = store.size_in_bytes(),
            "graph_store.built"
        );
        Ok(store)
    }
}
