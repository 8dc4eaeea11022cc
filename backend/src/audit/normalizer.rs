//! Canonical string rendering of field values.
//!
//! The rendering is what gets compared by the diff engine and what is stored
//! in `old_value`/`new_value`, so it must be deterministic: collections are
//! serialized with sorted keys and enumerated codes always map to the same
//! label.

use std::sync::Arc;

use crate::audit::{rules::EnumLabelTable, value::FieldValue};

#[derive(Debug, Clone)]
pub struct ValueNormalizer {
    labels: Arc<EnumLabelTable>,
}

impl ValueNormalizer {
    pub fn new(labels: EnumLabelTable) -> Self {
        Self {
            labels: Arc::new(labels),
        }
    }

    /// Renders a value. `Null` stays `None`; only collection serialization
    /// can fail.
    pub fn normalize(&self, value: &FieldValue) -> Result<Option<String>, serde_json::Error> {
        let rendered = match value {
            FieldValue::Null => return Ok(None),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::String(s) => self.render_text(s),
            FieldValue::List(_) | FieldValue::Map(_) => serde_json::to_string(value)?,
        };
        Ok(Some(rendered))
    }

    /// Maps `Category.CODE` renderings of known categories to their display
    /// label. Every other string is returned as is.
    pub fn render_text(&self, text: &str) -> String {
        text.split_once('.')
            .and_then(|(category, code)| self.labels.resolve(category, code))
            .unwrap_or_else(|| text.to_string())
    }
}

impl Default for ValueNormalizer {
    fn default() -> Self {
        Self::new(EnumLabelTable::default())
    }
}
