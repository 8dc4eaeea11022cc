//! Decides whether a field/value pair is worth an audit row.

use std::sync::Arc;

use crate::audit::{normalizer::ValueNormalizer, rules::AuditRules, value::FieldValue};
use crate::models::audit_log::AuditAction;

/// Text renderings that mean "nothing here".
const EMPTY_MARKERS: [&str; 4] = ["None", "null", "[]", "{}"];

#[derive(Debug, Clone)]
pub struct SignificanceFilter {
    rules: Arc<AuditRules>,
    normalizer: ValueNormalizer,
}

impl SignificanceFilter {
    pub fn new(rules: Arc<AuditRules>, normalizer: ValueNormalizer) -> Self {
        Self { rules, normalizer }
    }

    pub fn is_significant(
        &self,
        field_name: &str,
        value: &FieldValue,
        action: AuditAction,
    ) -> bool {
        if is_blank(value) {
            return false;
        }
        if self.rules.legacy_boolean_fields.contains(field_name) && self.is_negative_flag(value) {
            return false;
        }
        if self.rules.rating_fields.contains(field_name) && !self.is_valid_rating(value) {
            return false;
        }
        if self.rules.industries_field.as_deref() == Some(field_name) && is_empty_selection(value)
        {
            return false;
        }
        if action == AuditAction::Create && self.is_create_default(field_name, value) {
            return false;
        }
        true
    }

    fn is_negative_flag(&self, value: &FieldValue) -> bool {
        match value {
            FieldValue::Bool(b) => !b,
            FieldValue::Number(n) => n.as_f64() == Some(0.0),
            FieldValue::String(s) => {
                let negatives = &self.rules.legacy_boolean_negative_values;
                negatives.contains(s.trim()) || negatives.contains(&self.normalizer.render_text(s))
            }
            _ => false,
        }
    }

    fn is_valid_rating(&self, value: &FieldValue) -> bool {
        let (min, max) = (self.rules.rating_min, self.rules.rating_max);
        value
            .as_f64()
            .is_some_and(|rating| rating >= min && rating <= max)
    }

    fn is_create_default(&self, field_name: &str, value: &FieldValue) -> bool {
        let Some(default) = self.rules.create_default_values.get(field_name) else {
            return false;
        };
        // A value that cannot be rendered is never the default; the diff
        // engine surfaces the rendering error itself.
        matches!(self.normalizer.normalize(value), Ok(Some(rendered)) if &rendered == default)
    }
}

/// Null, empty text, empty-collection markers and empty collections.
fn is_blank(value: &FieldValue) -> bool {
    match value {
        FieldValue::Null => true,
        FieldValue::String(s) => s.is_empty() || EMPTY_MARKERS.contains(&s.trim()),
        FieldValue::List(items) => items.is_empty(),
        FieldValue::Map(map) => map.is_empty(),
        FieldValue::Bool(_) | FieldValue::Number(_) => false,
    }
}

fn is_empty_selection(value: &FieldValue) -> bool {
    match value {
        FieldValue::List(items) => items.iter().all(is_blank),
        FieldValue::String(s) => s.trim().is_empty() || EMPTY_MARKERS.contains(&s.trim()),
        other => is_blank(other),
    }
}
