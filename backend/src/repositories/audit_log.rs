//! Storage for the append-only `audit_logs` table.
//!
//! Rows are only ever inserted; there is no update or delete path here.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::error::AuditError;
use crate::models::audit_log::{AuditAction, AuditRecord, NewAuditRecord};
use crate::repositories::transaction::{begin_transaction, commit_transaction, rollback_transaction};

const SELECT_COLUMNS: &str = "id, entity_table, entity_id, field_name, action, old_value, \
     new_value, actor_id, actor_name, timestamp";

/// Optional, AND-combined filters for audit queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditLogFilters {
    pub entity_table: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<AuditAction>,
    pub field_name: Option<String>,
    pub actor_id: Option<String>,
}

impl AuditLogFilters {
    pub fn for_record(entity_table: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_table: Some(entity_table.into()),
            entity_id: Some(entity_id.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

/// Persistence seam for the audit service.
///
/// This trait is designed to be mockable using mockall for testing.
/// Use `MockAuditLogStore` in tests to mock the behavior.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLogStore: Send + Sync {
    /// Writes every record or none of them.
    async fn insert_batch(
        &self,
        records: Vec<NewAuditRecord>,
    ) -> Result<Vec<AuditRecord>, AuditError>;

    /// Records matching `filters`, newest first, optionally paginated.
    async fn query(
        &self,
        filters: &AuditLogFilters,
        page: Option<Page>,
    ) -> Result<Vec<AuditRecord>, AuditError>;

    async fn fetch(&self, id: i64) -> Result<Option<AuditRecord>, AuditError>;
}

#[derive(Debug, Clone)]
pub struct PgAuditLogStore {
    pool: PgPool,
}

impl PgAuditLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogStore for PgAuditLogStore {
    async fn insert_batch(
        &self,
        records: Vec<NewAuditRecord>,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        let mut tx = begin_transaction(&self.pool).await?;
        match insert_audit_records(&mut tx, &records).await {
            Ok(rows) => {
                commit_transaction(tx).await?;
                Ok(rows)
            }
            Err(err) => {
                if let Err(rollback_err) = rollback_transaction(tx).await {
                    tracing::warn!(error = %rollback_err, "failed to roll back audit batch");
                }
                Err(err.into())
            }
        }
    }

    async fn query(
        &self,
        filters: &AuditLogFilters,
        page: Option<Page>,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(query_audit_records(&self.pool, filters, page).await?)
    }

    async fn fetch(&self, id: i64) -> Result<Option<AuditRecord>, AuditError> {
        Ok(fetch_audit_record(&self.pool, id).await?)
    }
}

/// Inserts records on the given connection. Callers that need the rows to
/// commit together with an entity mutation pass their open transaction.
pub async fn insert_audit_records(
    conn: &mut PgConnection,
    records: &[NewAuditRecord],
) -> Result<Vec<AuditRecord>, sqlx::Error> {
    let query = format!(
        "INSERT INTO audit_logs \
         (entity_table, entity_id, field_name, action, old_value, new_value, actor_id, \
         actor_name, timestamp) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {}",
        SELECT_COLUMNS
    );

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let row = sqlx::query_as::<_, AuditRecord>(&query)
            .bind(&record.entity_table)
            .bind(&record.entity_id)
            .bind(&record.field_name)
            .bind(record.action.as_str())
            .bind(&record.old_value)
            .bind(&record.new_value)
            .bind(&record.actor_id)
            .bind(&record.actor_name)
            .bind(record.timestamp)
            .fetch_one(&mut *conn)
            .await?;
        rows.push(row);
    }
    Ok(rows)
}

pub async fn fetch_audit_record(
    pool: &PgPool,
    id: i64,
) -> Result<Option<AuditRecord>, sqlx::Error> {
    let query = format!("SELECT {} FROM audit_logs WHERE id = $1", SELECT_COLUMNS);
    sqlx::query_as::<_, AuditRecord>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn query_audit_records(
    pool: &PgPool,
    filters: &AuditLogFilters,
    page: Option<Page>,
) -> Result<Vec<AuditRecord>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM audit_logs", SELECT_COLUMNS));
    let mut has_clause = false;
    apply_audit_log_filters(&mut builder, &mut has_clause, filters);
    builder.push(" ORDER BY timestamp DESC, id DESC");

    if let Some(page) = page {
        builder
            .push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.skip);
    }

    builder.build_query_as::<AuditRecord>().fetch_all(pool).await
}

fn apply_audit_log_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &AuditLogFilters,
) {
    if let Some(entity_table) = filters.entity_table.as_ref() {
        push_clause(builder, has_clause);
        builder
            .push("entity_table = ")
            .push_bind(entity_table.to_string());
    }
    if let Some(entity_id) = filters.entity_id.as_ref() {
        push_clause(builder, has_clause);
        builder.push("entity_id = ").push_bind(entity_id.to_string());
    }
    if let Some(action) = filters.action {
        push_clause(builder, has_clause);
        builder.push("action = ").push_bind(action.as_str());
    }
    if let Some(field_name) = filters.field_name.as_ref() {
        push_clause(builder, has_clause);
        builder
            .push("field_name = ")
            .push_bind(field_name.to_string());
    }
    if let Some(actor_id) = filters.actor_id.as_ref() {
        push_clause(builder, has_clause);
        builder.push("actor_id = ").push_bind(actor_id.to_string());
    }
}

fn push_clause(builder: &mut QueryBuilder<'_, Postgres>, has_clause: &mut bool) {
    if *has_clause {
        builder.push(" AND ");
    } else {
        builder.push(" WHERE ");
        *has_clause = true;
    }
}
