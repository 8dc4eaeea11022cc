use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::sync::Arc;

use crate::{
    audit::{
        diff::{ChangeSet, DiffEngine},
        value::Snapshot,
    },
    error::AuditError,
    models::audit_log::{Actor, AuditAction, AuditRecord, NewAuditRecord},
    repositories::audit_log::{self, AuditLogFilters, AuditLogStore, Page},
};

pub const DEFAULT_QUERY_LIMIT: i64 = 100;
pub const MAX_QUERY_LIMIT: i64 = 1_000;
pub const DEFAULT_RECENT_LIMIT: i64 = 50;
pub const MAX_RECENT_LIMIT: i64 = 200;

/// Writes and reads the field level audit trail.
///
/// The `plan_*` methods are pure: they diff snapshots and stamp every record
/// of the batch with one timestamp. The `on_*` methods plan and then write
/// through the configured store.
#[derive(Clone)]
pub struct AuditLogService {
    store: Arc<dyn AuditLogStore>,
    engine: DiffEngine,
}

impl AuditLogService {
    pub fn new(store: Arc<dyn AuditLogStore>, engine: DiffEngine) -> Self {
        Self { store, engine }
    }

    pub fn engine(&self) -> &DiffEngine {
        &self.engine
    }

    pub fn plan_create(
        &self,
        entity_table: &str,
        entity_id: &str,
        new_snapshot: &Snapshot,
        actor: &Actor,
    ) -> Result<Vec<NewAuditRecord>, AuditError> {
        ensure_identifiers(entity_table, entity_id)?;
        let changes = self.engine.create(new_snapshot)?;
        Ok(build_batch(
            entity_table,
            entity_id,
            &changes,
            AuditAction::Create,
            actor,
            Utc::now(),
        ))
    }

    pub fn plan_update(
        &self,
        entity_table: &str,
        entity_id: &str,
        old_snapshot: &Snapshot,
        new_snapshot: &Snapshot,
        actor: &Actor,
    ) -> Result<Vec<NewAuditRecord>, AuditError> {
        ensure_identifiers(entity_table, entity_id)?;
        let changes = self.engine.update(old_snapshot, new_snapshot)?;
        Ok(build_batch(
            entity_table,
            entity_id,
            &changes,
            AuditAction::Update,
            actor,
            Utc::now(),
        ))
    }

    pub fn plan_delete(
        &self,
        entity_table: &str,
        entity_id: &str,
        old_snapshot: &Snapshot,
        actor: &Actor,
    ) -> Result<Vec<NewAuditRecord>, AuditError> {
        ensure_identifiers(entity_table, entity_id)?;
        let changes = self.engine.delete(old_snapshot)?;
        Ok(build_batch(
            entity_table,
            entity_id,
            &changes,
            AuditAction::Delete,
            actor,
            Utc::now(),
        ))
    }

    pub async fn on_create(
        &self,
        entity_table: &str,
        entity_id: &str,
        new_snapshot: &Snapshot,
        actor: &Actor,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        let records = self.plan_create(entity_table, entity_id, new_snapshot, actor)?;
        self.persist(records).await
    }

    pub async fn on_update(
        &self,
        entity_table: &str,
        entity_id: &str,
        old_snapshot: &Snapshot,
        new_snapshot: &Snapshot,
        actor: &Actor,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        let records =
            self.plan_update(entity_table, entity_id, old_snapshot, new_snapshot, actor)?;
        self.persist(records).await
    }

    pub async fn on_delete(
        &self,
        entity_table: &str,
        entity_id: &str,
        old_snapshot: &Snapshot,
        actor: &Actor,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        let records = self.plan_delete(entity_table, entity_id, old_snapshot, actor)?;
        self.persist(records).await
    }

    /// Writes one record per changed field, all sharing one timestamp.
    pub async fn write_batch(
        &self,
        entity_table: &str,
        entity_id: &str,
        changes: &ChangeSet,
        action: AuditAction,
        actor: &Actor,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        ensure_identifiers(entity_table, entity_id)?;
        let records = build_batch(entity_table, entity_id, changes, action, actor, Utc::now());
        self.persist(records).await
    }

    /// Writes already prepared records as one all-or-nothing batch.
    pub async fn persist(
        &self,
        records: Vec<NewAuditRecord>,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        let Some(first) = records.first() else {
            return Ok(Vec::new());
        };
        ensure_records(&records)?;
        let (entity_table, entity_id, action) =
            (first.entity_table.clone(), first.entity_id.clone(), first.action);
        let count = records.len();

        match self.store.insert_batch(records).await {
            Ok(rows) => {
                tracing::info!(%entity_table, %entity_id, %action, count, "audit batch written");
                Ok(rows)
            }
            Err(err) => {
                tracing::error!(
                    %entity_table,
                    %entity_id,
                    %action,
                    count,
                    error = %err,
                    "failed to write audit batch"
                );
                Err(err)
            }
        }
    }

    /// Writes prepared records on a caller-owned connection, typically the
    /// transaction that performed the entity mutation.
    pub async fn persist_in(
        &self,
        conn: &mut PgConnection,
        records: &[NewAuditRecord],
    ) -> Result<Vec<AuditRecord>, AuditError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        ensure_records(records)?;
        let rows = audit_log::insert_audit_records(conn, records).await?;
        tracing::debug!(count = rows.len(), "audit batch staged in caller transaction");
        Ok(rows)
    }

    pub async fn query(
        &self,
        filters: &AuditLogFilters,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        if skip < 0 {
            return Err(AuditError::Validation("skip must not be negative".into()));
        }
        ensure_limit(limit, MAX_QUERY_LIMIT)?;
        self.store
            .query(filters, Some(Page { skip, limit }))
            .await
    }

    /// Full history of one entity, newest first.
    pub async fn for_record(
        &self,
        entity_table: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        ensure_identifiers(entity_table, entity_id)?;
        self.store
            .query(&AuditLogFilters::for_record(entity_table, entity_id), None)
            .await
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditRecord>, AuditError> {
        ensure_limit(limit, MAX_RECENT_LIMIT)?;
        self.store
            .query(&AuditLogFilters::default(), Some(Page { skip: 0, limit }))
            .await
    }

    pub async fn fetch(&self, id: i64) -> Result<Option<AuditRecord>, AuditError> {
        self.store.fetch(id).await
    }
}

/// Turns a change set into records for one mutation. CREATE rows never carry
/// an old value and DELETE rows never carry a new one.
pub fn build_batch(
    entity_table: &str,
    entity_id: &str,
    changes: &ChangeSet,
    action: AuditAction,
    actor: &Actor,
    timestamp: DateTime<Utc>,
) -> Vec<NewAuditRecord> {
    changes
        .iter()
        .map(|(field_name, change)| NewAuditRecord {
            entity_table: entity_table.to_string(),
            entity_id: entity_id.to_string(),
            field_name: field_name.clone(),
            action,
            old_value: match action {
                AuditAction::Create => None,
                _ => change.old_value.clone(),
            },
            new_value: match action {
                AuditAction::Delete => None,
                _ => change.new_value.clone(),
            },
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            timestamp,
        })
        .collect()
}

/// Rows keyed by a blank table or id could never be read back.
fn ensure_identifiers(entity_table: &str, entity_id: &str) -> Result<(), AuditError> {
    if entity_table.trim().is_empty() || entity_id.trim().is_empty() {
        return Err(AuditError::Validation(
            "entity_table and entity_id are required".into(),
        ));
    }
    Ok(())
}

fn ensure_records(records: &[NewAuditRecord]) -> Result<(), AuditError> {
    for record in records {
        ensure_identifiers(&record.entity_table, &record.entity_id)?;
        if record.field_name.trim().is_empty() {
            return Err(AuditError::Validation("field_name is required".into()));
        }
    }
    Ok(())
}

fn ensure_limit(limit: i64, max: i64) -> Result<(), AuditError> {
    if (1..=max).contains(&limit) {
        Ok(())
    } else {
        Err(AuditError::Validation(format!(
            "limit must be between 1 and {}",
            max
        )))
    }
}
