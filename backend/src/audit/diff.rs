//! Field level change detection for create, update and delete.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::audit::{
    normalizer::ValueNormalizer,
    rules::{AuditRules, FirstSetPolicy},
    significance::SignificanceFilter,
    value::{FieldValue, Snapshot},
};
use crate::error::AuditError;
use crate::models::audit_log::AuditAction;

/// Normalized before/after pair for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Changes keyed by field name, iterated in field-name order.
pub type ChangeSet = BTreeMap<String, FieldChange>;

#[derive(Debug, Clone)]
pub struct DiffEngine {
    rules: Arc<AuditRules>,
    normalizer: ValueNormalizer,
    filter: SignificanceFilter,
}

impl DiffEngine {
    pub fn new(rules: AuditRules) -> Self {
        let normalizer = ValueNormalizer::new(rules.enum_labels.clone());
        let rules = Arc::new(rules);
        let filter = SignificanceFilter::new(rules.clone(), normalizer.clone());
        Self {
            rules,
            normalizer,
            filter,
        }
    }

    pub fn filter(&self) -> &SignificanceFilter {
        &self.filter
    }

    pub fn normalizer(&self) -> &ValueNormalizer {
        &self.normalizer
    }

    /// Every significant field of a new entity, with no old value.
    pub fn create(&self, new_snapshot: &Snapshot) -> Result<ChangeSet, AuditError> {
        let mut changes = ChangeSet::new();
        for (field, value) in new_snapshot {
            if self.filter.is_significant(field, value, AuditAction::Create) {
                changes.insert(
                    field.clone(),
                    FieldChange {
                        old_value: None,
                        new_value: self.render(field, value)?,
                    },
                );
            }
        }
        Ok(changes)
    }

    /// Every significant field of a removed entity, with no new value.
    pub fn delete(&self, old_snapshot: &Snapshot) -> Result<ChangeSet, AuditError> {
        let mut changes = ChangeSet::new();
        for (field, value) in old_snapshot {
            if self.filter.is_significant(field, value, AuditAction::Delete) {
                changes.insert(
                    field.clone(),
                    FieldChange {
                        old_value: self.render(field, value)?,
                        new_value: None,
                    },
                );
            }
        }
        Ok(changes)
    }

    /// Changes between a stored entity and an update payload. Only fields
    /// present in `new_snapshot` are compared.
    pub fn update(
        &self,
        old_snapshot: &Snapshot,
        new_snapshot: &Snapshot,
    ) -> Result<ChangeSet, AuditError> {
        let mut changes = ChangeSet::new();
        for (field, new_value) in new_snapshot {
            let old_value = old_snapshot.get(field).unwrap_or(&FieldValue::Null);
            if let Some(change) = self.compare(field, old_value, new_value)? {
                changes.insert(field.clone(), change);
            }
        }
        Ok(changes)
    }

    fn compare(
        &self,
        field: &str,
        old_value: &FieldValue,
        new_value: &FieldValue,
    ) -> Result<Option<FieldChange>, AuditError> {
        let old_rendered = self.render(field, old_value)?;
        let new_rendered = self.render(field, new_value)?;
        if old_rendered == new_rendered {
            return Ok(None);
        }

        let old_significant = self
            .filter
            .is_significant(field, old_value, AuditAction::Update);
        let new_significant = self
            .filter
            .is_significant(field, new_value, AuditAction::Update);

        match (old_significant, new_significant) {
            (false, false) => return Ok(None),
            (false, true) if self.rules.first_set_policy == FirstSetPolicy::Skip => {
                tracing::trace!(field, "skipping first-time set during update");
                return Ok(None);
            }
            _ => {}
        }

        if self.rules.case_insensitive_fields.contains(field)
            && equivalent_ignoring_case(old_rendered.as_deref(), new_rendered.as_deref())
        {
            return Ok(None);
        }

        Ok(Some(FieldChange {
            old_value: old_rendered,
            new_value: new_rendered,
        }))
    }

    fn render(&self, field: &str, value: &FieldValue) -> Result<Option<String>, AuditError> {
        self.normalizer
            .normalize(value)
            .map_err(|source| AuditError::Normalization {
                field: field.to_string(),
                source: source.into(),
            })
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(AuditRules::default())
    }
}

fn equivalent_ignoring_case(old: Option<&str>, new: Option<&str>) -> bool {
    match (old, new) {
        (Some(old), Some(new)) => old.trim().eq_ignore_ascii_case(new.trim()),
        _ => false,
    }
}
