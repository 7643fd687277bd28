//! PropertyMap: the key-value bag on loader nodes and relationships.

use hashbrown::HashMap;
use super::Value;

/// A map of property names to values.
pub type PropertyMap = HashMap<String, Value>;
