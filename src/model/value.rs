//! Property value type.
//!
//! Only the value types the storage core can hold in columns: integers,
//! floats and homogeneous arrays of either. Relationship properties are
//! always stored as `f64`; node properties keep their declared type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

/// Column type of a property key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Int,
    Float,
    IntArray,
    FloatArray,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Int => "INTEGER",
            ValueType::Float => "FLOAT",
            ValueType::IntArray => "LIST<INTEGER>",
            ValueType::FloatArray => "LIST<FLOAT>",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::IntArray(_) => "LIST<INTEGER>",
            Value::FloatArray(_) => "LIST<FLOAT>",
        }
    }

    /// Column type, or `None` for `Null`.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(ValueType::Int),
            Value::Float(_) => Some(ValueType::Float),
            Value::IntArray(_) => Some(ValueType::IntArray),
            Value::FloatArray(_) => Some(ValueType::FloatArray),
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

    /// Attempt to extract as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(v) } }
impl From<Vec<i64>> for Value { fn from(v: Vec<i64>) -> Self { Value::IntArray(v) } }
impl From<Vec<f64>> for Value { fn from(v: Vec<f64>) -> Self { Value::FloatArray(v) } }
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(Value::Null) }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            write!(f, "[")?;
            for (i, v) in items.iter().enumerate() {
                if i > 0 { write!(f, ", ")?; }
                write!(f, "{v}")?;
            }
            write!(f, "]")
        }
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::IntArray(l) => list(f, l),
            Value::FloatArray(l) => list(f, l),
        }
    }
}
