//! Dynamically typed field values as supplied by the CRUD layer.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

use crate::error::{AuditError, RenderError};

/// One entity's flattened state: field name to value.
pub type Snapshot = BTreeMap<String, FieldValue>;

/// Closed set of value shapes an entity attribute can take.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Converts a float read from `field`, reporting non-finite input as a
    /// normalization failure of that field.
    pub fn number(field: &str, value: f64) -> Result<Self, AuditError> {
        FieldValue::try_from(value).map_err(|source| AuditError::Normalization {
            field: field.to_string(),
            source,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Numeric reading used by range checks. Numeric strings are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => n.as_f64(),
            FieldValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => FieldValue::Number(n),
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => FieldValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                FieldValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value.into())
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(value.into())
    }
}

/// NaN and infinities have no canonical rendering and are refused rather
/// than stored as an unset value.
impl TryFrom<f64> for FieldValue {
    type Error = RenderError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Number::from_f64(value)
            .map(FieldValue::Number)
            .ok_or(RenderError::NonFinite(value))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Flattens a JSON object into a snapshot. Anything other than an object
/// yields `None`.
pub fn snapshot_from_json(value: Value) -> Option<Snapshot> {
    match value {
        Value::Object(map) => Some(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        _ => None,
    }
}
