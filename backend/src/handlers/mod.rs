use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub mod audit_logs;

/// Audit trail routes, ready to be merged into the application router.
pub fn audit_log_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/audit-logs",
            get(audit_logs::list_audit_logs).post(audit_logs::create_audit_log),
        )
        .route("/api/audit-logs/recent", get(audit_logs::recent_audit_logs))
        .route(
            "/api/audit-logs/batch",
            post(audit_logs::create_audit_log_batch),
        )
        .route(
            "/api/audit-logs/events",
            post(audit_logs::record_audit_event),
        )
        .route(
            "/api/audit-logs/record/{entity_table}/{entity_id}",
            get(audit_logs::record_audit_logs),
        )
        .route("/api/audit-logs/{id}", get(audit_logs::get_audit_log))
}
