//! Key types and key-path resolution.

use crate::error::{EngineError, EngineResult};
use serde_json::Value;
use std::fmt;

/// A primary-key or index value.
///
/// Keys are totally ordered so rows can live in ordered maps. Compound keys
/// are arrays of component keys and compare lexicographically, component by
/// component.
///
/// Floating-point and boolean values are not accepted as keys; integer and
/// string keys cover the auto-increment and explicit-key cases the engine
/// supports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    /// An integer key. Auto-generated keys are always integers.
    Int(i64),
    /// A string key.
    Str(String),
    /// A compound key: one component per primary-key path, in path order.
    Array(Vec<Key>),
}

impl Key {
    /// Converts a JSON value into a key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for values that cannot serve as keys
    /// (floats, booleans, null, objects).
    pub fn from_value(value: &Value) -> EngineResult<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Key::Int).ok_or_else(|| EngineError::InvalidKey {
                message: format!("non-integer numeric key: {n}"),
            }),
            Value::String(s) => Ok(Key::Str(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_value)
                .collect::<EngineResult<Vec<_>>>()
                .map(Key::Array),
            other => Err(EngineError::InvalidKey {
                message: format!("value cannot be used as a key: {other}"),
            }),
        }
    }

    /// Converts the key back into its JSON representation.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Key::Int(n) => Value::from(*n),
            Key::Str(s) => Value::from(s.clone()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_value).collect()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => write!(f, "{s:?}"),
            Key::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "+")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

/// Resolves a dotted key path against a JSON object.
///
/// `"author.name"` resolves `row["author"]["name"]`. Returns `None` when any
/// segment is absent or a non-object is traversed.
#[must_use]
pub fn value_at_path<'a>(row: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = row;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes a value at a dotted key path, creating intermediate objects.
///
/// Non-object intermediates are replaced; the engine uses this to write
/// auto-generated keys back into inbound rows.
pub fn set_at_path(row: &mut Value, path: &str, value: Value) {
    let mut current = row;
    let segments: Vec<&str> = path.split('.').collect();
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        match current.as_object_mut() {
            Some(map) if i == last => {
                map.insert((*segment).to_string(), value);
                return;
            }
            Some(map) => {
                current = map
                    .entry((*segment).to_string())
                    .or_insert_with(|| Value::Object(serde_json::Map::new()));
            }
            None => return,
        }
    }
}
