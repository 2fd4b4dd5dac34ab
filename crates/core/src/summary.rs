//! Row summary access for the Canopy view engine.
//!
//! A `RowSummary` is the field map a data provider delivers for one row.
//! The typed accessors take a caller-supplied default and return it for a
//! missing (or Null) field; they only fail when a field is present with
//! the wrong type.

use crate::error::{Error, Result};
use crate::value::{Value, ValueKind};
use hashbrown::HashMap;

/// A row's field map, keyed by item name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowSummary {
    fields: HashMap<String, Value>,
}

impl RowSummary {
    /// Creates a new empty row summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, builder style.
    pub fn with(mut self, item: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(item.into(), value.into());
        self
    }

    /// Sets a field.
    pub fn set(&mut self, item: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(item.into(), value.into());
    }

    /// Gets a field value by item name.
    pub fn get(&self, item: &str) -> Option<&Value> {
        self.fields.get(item)
    }

    /// Returns true if the field is present.
    pub fn contains(&self, item: &str) -> bool {
        self.fields.contains_key(item)
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over (item name, value) pairs.
    pub fn items(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Gets a field as a string, or the default if missing.
    pub fn get_as_string(&self, item: &str, default: &str) -> Result<String> {
        match self.fields.get(item) {
            None | Some(Value::Null) => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(mismatch(item, ValueKind::String, other)),
        }
    }

    /// Gets a field as a number, or the default if missing.
    pub fn get_as_number(&self, item: &str, default: f64) -> Result<f64> {
        match self.fields.get(item) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => Ok(*n),
            Some(other) => Err(mismatch(item, ValueKind::Number, other)),
        }
    }

    /// Gets a field as a boolean, or the default if missing.
    pub fn get_as_bool(&self, item: &str, default: bool) -> Result<bool> {
        match self.fields.get(item) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Boolean(b)) => Ok(*b),
            Some(other) => Err(mismatch(item, ValueKind::Boolean, other)),
        }
    }

    /// Gets a field as a timestamp, or the default if missing.
    pub fn get_as_timestamp(&self, item: &str, default: i64) -> Result<i64> {
        match self.fields.get(item) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Timestamp(t)) => Ok(*t),
            Some(other) => Err(mismatch(item, ValueKind::Timestamp, other)),
        }
    }

    /// Gets a field as a string list, or the default if missing.
    ///
    /// A scalar string is returned as a one-element list.
    pub fn get_as_string_list(&self, item: &str, default: Vec<String>) -> Result<Vec<String>> {
        match self.fields.get(item) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::List(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(mismatch(item, ValueKind::String, other)),
                })
                .collect(),
            Some(other) => Err(mismatch(item, ValueKind::List, other)),
        }
    }

    /// Gets a field value, or the default if missing. Never fails.
    pub fn get_as_value(&self, item: &str, default: Value) -> Value {
        match self.fields.get(item) {
            None | Some(Value::Null) => default,
            Some(v) => v.clone(),
        }
    }
}

fn mismatch(item: &str, expected: ValueKind, got: &Value) -> Error {
    Error::type_mismatch(item, expected, got.kind().unwrap_or(ValueKind::String))
}
