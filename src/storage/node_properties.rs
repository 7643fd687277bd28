//! Columnar node properties, indexed by internal node id.
//!
//! Every key has one fixed [`ValueType`]. A node without a value holds `None`
//! in its slot, so every `i64` and `f64` remains storable.

use hashbrown::HashMap;

use crate::model::{Value, ValueType};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum NodePropertyValues {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    IntArray(Vec<Option<Vec<i64>>>),
    FloatArray(Vec<Option<Vec<f64>>>),
}

impl NodePropertyValues {
    fn new(value_type: ValueType, node_count: usize) -> Self {
        match value_type {
            ValueType::Int => Self::Int(vec![None; node_count]),
            ValueType::Float => Self::Float(vec![None; node_count]),
            ValueType::IntArray => Self::IntArray(vec![None; node_count]),
            ValueType::FloatArray => Self::FloatArray(vec![None; node_count]),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::IntArray(_) => ValueType::IntArray,
            Self::FloatArray(_) => ValueType::FloatArray,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int(values) => values.len(),
            Self::Float(values) => values.len(),
            Self::IntArray(values) => values.len(),
            Self::FloatArray(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn int_value(&self, node: u64) -> Option<i64> {
        match self {
            Self::Int(values) => values.get(node as usize).copied().flatten(),
            _ => None,
        }
    }

    pub fn float_value(&self, node: u64) -> Option<f64> {
        match self {
            Self::Float(values) => values.get(node as usize).copied().flatten(),
            Self::Int(_) => self.int_value(node).map(|v| v as f64),
            _ => None,
        }
    }

    /// The value of `node` as a loader value; `Value::Null` when missing.
    pub fn value(&self, node: u64) -> Value {
        let index = node as usize;
        match self {
            Self::Int(_) => self.int_value(node).map_or(Value::Null, Value::Int),
            Self::Float(_) => self.float_value(node).map_or(Value::Null, Value::Float),
            Self::IntArray(values) => values
                .get(index)
                .and_then(|values| values.clone())
                .map_or(Value::Null, Value::IntArray),
            Self::FloatArray(values) => values
                .get(index)
                .and_then(|values| values.clone())
                .map_or(Value::Null, Value::FloatArray),
        }
    }

    fn set(&mut self, node: u64, value: Value) -> Result<()> {
        let index = node as usize;
        match (self, value) {
            (_, Value::Null) => {}
            (Self::Int(values), Value::Int(v)) => values[index] = Some(v),
            (Self::Float(values), Value::Float(v)) => values[index] = Some(v),
            (Self::IntArray(values), Value::IntArray(v)) => values[index] = Some(v),
            (Self::FloatArray(values), Value::FloatArray(v)) => values[index] = Some(v),
            (column, other) => {
                return Err(Error::TypeError {
                    expected: column.value_type().name().into(),
                    got: other.type_name().into(),
                });
            }
        }
        Ok(())
    }

    fn size_in_bytes(&self) -> usize {
        match self {
            Self::Int(values) => values.len() * std::mem::size_of::<Option<i64>>(),
            Self::Float(values) => values.len() * std::mem::size_of::<Option<f64>>(),
            Self::IntArray(values) => values
                .iter()
                .map(|v| std::mem::size_of::<Option<Vec<i64>>>() + v.as_ref().map_or(0, |v| v.len() * 8))
                .sum(),
            Self::FloatArray(values) => values
                .iter()
                .map(|v| std::mem::size_of::<Option<Vec<f64>>>() + v.as_ref().map_or(0, |v| v.len() * 8))
                .sum(),
        }
    }
}

// ============================================================================
// NodePropertyStore
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct NodePropertyStore {
    columns: HashMap<String, NodePropertyValues>,
    label_keys: HashMap<String, Vec<String>>,
}

impl NodePropertyStore {
    pub fn get(&self, key: &str) -> Option<&NodePropertyValues> {
        self.columns.get(key)
    }

    /// All property keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.columns.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Keys seen on nodes carrying `label`, sorted.
    pub fn keys_for_label(&self, label: &str) -> Vec<&str> {
        self.label_keys
            .get(label)
            .map(|keys| keys.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.columns.values().map(NodePropertyValues::size_in_bytes).sum()
    }
}

/// Fills columns once internal ids are known.
#[derive(Debug)]
pub(crate) struct NodePropertyStoreBuilder {
    node_count: usize,
    columns: HashMap<String, NodePropertyValues>,
    label_keys: HashMap<String, Vec<String>>,
}

impl NodePropertyStoreBuilder {
    pub(crate) fn new(node_count: u64, schema: &HashMap<String, ValueType>) -> Self {
        let node_count = node_count as usize;
        let columns = schema
            .iter()
            .map(|(key, &value_type)| (key.clone(), NodePropertyValues::new(value_type, node_count)))
            .collect();
        Self { node_count, columns, label_keys: HashMap::new() }
    }

    pub(crate) fn set(&mut self, node: u64, key: &str, value: Value) -> Result<()> {
        debug_assert!((node as usize) < self.node_count);
        let column = self
            .columns
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(format!("Node property '{key}'")))?;
        column.set(node, value)
    }

    pub(crate) fn record_label_key(&mut self, label: &str, key: &str) {
        let keys = self.label_keys.entry_ref(label).or_default();
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_owned());
        }
    }

    pub(crate) fn build(mut self) -> NodePropertyStore {
        for keys in self.label_keys.values_mut() {
            keys.sort_unstable();
        }
        NodePropertyStore { columns: self.columns, label_keys: self.label_keys }
    }
}
