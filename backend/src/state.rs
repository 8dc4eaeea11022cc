use std::sync::Arc;

use crate::{
    audit::diff::DiffEngine,
    config::Config,
    db::connection::DbPool,
    repositories::audit_log::PgAuditLogStore,
    services::audit_log::AuditLogService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub audit: Arc<AuditLogService>,
}

impl AppState {
    /// Wires the Postgres-backed audit service from the configured rules.
    pub fn new(pool: DbPool, config: Config) -> Self {
        let store = Arc::new(PgAuditLogStore::new(pool));
        let engine = DiffEngine::new(config.audit_rules.clone());
        let audit = Arc::new(AuditLogService::new(store, engine));
        Self { config, audit }
    }
}
