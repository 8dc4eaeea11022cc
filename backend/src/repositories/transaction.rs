//! Transaction helpers shared by the audit store and its callers.

use crate::error::AuditError;
use sqlx::postgres::PgTransaction;
use sqlx::PgPool;

/// Begin a new database transaction.
///
/// Callers that mutate an entity and write its audit batch should run both
/// on the returned handle so neither becomes visible without the other.
pub async fn begin_transaction(db: &PgPool) -> Result<PgTransaction<'_>, AuditError> {
    Ok(db.begin().await?)
}

/// Commit a transaction.
pub async fn commit_transaction(tx: PgTransaction<'_>) -> Result<(), AuditError> {
    Ok(tx.commit().await?)
}

/// Rollback a transaction.
pub async fn rollback_transaction(tx: PgTransaction<'_>) -> Result<(), AuditError> {
    Ok(tx.rollback().await?)
}
