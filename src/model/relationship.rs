//! Relationship (edge) as handed over by a loader.

use serde::{Deserialize, Serialize};
use super::{NodeId, PropertyMap, Value};

/// Traversal direction when projecting a stored relationship type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// How loader relationships are laid into the outgoing topology.
///
/// | Orientation | `(a)-[r]->(b)` stored as |
/// |-------------|--------------------------|
/// | `Natural`   | `a → b` |
/// | `Reverse`   | `b → a` |
/// | `Undirected`| `a → b` and `b → a` |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Orientation {
    #[default]
    Natural,
    Reverse,
    Undirected,
}

/// A relationship in a loader batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub src: NodeId,
    pub dst: NodeId,
    pub rel_type: String,
    pub properties: PropertyMap,
}

impl Relationship {
    pub fn new(src: u64, dst: u64, rel_type: impl Into<String>) -> Self {
        Self {
            src: NodeId(src),
            dst: NodeId(dst),
            rel_type: rel_type.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
