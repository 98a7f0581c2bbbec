//! Input and output records exchanged with interactions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::result_set::ResultSet;
use crate::{Error, Result};

/// A value held by a [`MappedRecord`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric value, longs widened
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(value) => Some(*value),
            Value::Long(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(value) => Some(value),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Long(value.into())
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Long(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A named record of key/value entries
///
/// ```
/// use cim_connector::{MappedRecord, Value};
///
/// let input = MappedRecord::new(MappedRecord::INPUT)
///     .with("filename", "data/grid.rdf")
///     .with("reload", true);
///
/// assert_eq!(input.get("filename").and_then(Value::as_str), Some("data/grid.rdf"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappedRecord {
    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(default)]
    entries: BTreeMap<String, Value>,
}

impl MappedRecord {
    pub const INPUT: &'static str = "input";
    pub const OUTPUT: &'static str = "output";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.set_description(description);
        self
    }

    /// Insert an entry, returning the previous value for the key
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Copy all entries of `other` into this record
    pub fn merge(&mut self, other: MappedRecord) {
        self.entries.extend(other.entries);
    }

    pub(crate) fn require_str(&self, key: &str) -> Result<&str> {
        match self.entries.get(key) {
            Some(Value::String(value)) => Ok(value),
            Some(other) => Err(Error::InvalidRecord(format!(
                "'{key}' must be a string, got {}",
                other.type_name()
            ))),
            None => Err(Error::InvalidRecord(format!(
                "'{key}' is required in record '{}'",
                self.name
            ))),
        }
    }

    pub(crate) fn optional_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.entries.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(Error::InvalidRecord(format!(
                "'{key}' must be a bool, got {}",
                other.type_name()
            ))),
        }
    }
}

/// Creates records for interaction input and output
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFactory;

impl RecordFactory {
    pub fn create_mapped_record(&self, name: impl Into<String>) -> MappedRecord {
        MappedRecord::new(name)
    }

    pub fn create_input(&self) -> MappedRecord {
        MappedRecord::new(MappedRecord::INPUT)
    }

    pub fn create_output(&self) -> MappedRecord {
        MappedRecord::new(MappedRecord::OUTPUT)
    }
}

/// Discriminant of a [`Record`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Mapped,
    ResultSet,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Mapped => write!(f, "mapped record"),
            RecordKind::ResultSet => write!(f, "result set"),
        }
    }
}

/// Result of a single-record interaction
#[derive(Debug)]
pub enum Record {
    Mapped(MappedRecord),
    ResultSet(ResultSet),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Mapped(_) => RecordKind::Mapped,
            Record::ResultSet(_) => RecordKind::ResultSet,
        }
    }

    pub fn into_mapped(self) -> Result<MappedRecord> {
        match self {
            Record::Mapped(record) => Ok(record),
            other => Err(Error::UnsupportedResultType(format!(
                "expected a mapped record, got a {}",
                other.kind()
            ))),
        }
    }

    pub fn into_result_set(self) -> Result<ResultSet> {
        match self {
            Record::ResultSet(result_set) => Ok(result_set),
            other => Err(Error::UnsupportedResultType(format!(
                "expected a result set, got a {}",
                other.kind()
            ))),
        }
    }
}
