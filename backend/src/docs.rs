#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    handlers::audit_logs::{
        AuditEventRequest, AuditLogListQuery, CreateAuditLogBatchRequest, CreateAuditLogRequest,
        RecentAuditLogQuery,
    },
    models::audit_log::{AuditAction, AuditRecord},
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "orgrecords audit API",
        description = "Field level audit trail for organization records"
    ),
    paths(
        list_audit_logs_doc,
        recent_audit_logs_doc,
        record_audit_logs_doc,
        get_audit_log_doc,
        create_audit_log_doc,
        create_audit_log_batch_doc,
        record_audit_event_doc
    ),
    components(
        schemas(
            AuditAction,
            AuditRecord,
            AuditLogListQuery,
            RecentAuditLogQuery,
            CreateAuditLogRequest,
            CreateAuditLogBatchRequest,
            AuditEventRequest
        )
    ),
    tags(
        (name = "AuditLogs", description = "Audit trail queries and writes")
    )
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/api/audit-logs",
    params(AuditLogListQuery),
    responses(
        (status = 200, body = [AuditRecord]),
        (status = 400, body = serde_json::Value)
    ),
    tag = "AuditLogs"
)]
fn list_audit_logs_doc() {}

#[utoipa::path(
    get,
    path = "/api/audit-logs/recent",
    params(RecentAuditLogQuery),
    responses((status = 200, body = [AuditRecord])),
    tag = "AuditLogs"
)]
fn recent_audit_logs_doc() {}

#[utoipa::path(
    get,
    path = "/api/audit-logs/record/{entity_table}/{entity_id}",
    params(
        ("entity_table" = String, Path, description = "Table of the audited entity"),
        ("entity_id" = String, Path, description = "Primary key of the audited entity")
    ),
    responses((status = 200, body = [AuditRecord])),
    tag = "AuditLogs"
)]
fn record_audit_logs_doc() {}

#[utoipa::path(
    get,
    path = "/api/audit-logs/{id}",
    params(("id" = i64, Path, description = "Audit log ID")),
    responses(
        (status = 200, body = AuditRecord),
        (status = 404, body = serde_json::Value)
    ),
    tag = "AuditLogs"
)]
fn get_audit_log_doc() {}

#[utoipa::path(
    post,
    path = "/api/audit-logs",
    request_body = CreateAuditLogRequest,
    responses((status = 200, body = AuditRecord)),
    tag = "AuditLogs"
)]
fn create_audit_log_doc() {}

#[utoipa::path(
    post,
    path = "/api/audit-logs/batch",
    request_body = CreateAuditLogBatchRequest,
    responses((status = 200, body = [AuditRecord])),
    tag = "AuditLogs"
)]
fn create_audit_log_batch_doc() {}

#[utoipa::path(
    post,
    path = "/api/audit-logs/events",
    request_body = AuditEventRequest,
    responses((status = 200, body = [AuditRecord])),
    tag = "AuditLogs"
)]
fn record_audit_event_doc() {}
