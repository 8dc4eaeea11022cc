use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    audit::value::{snapshot_from_json, Snapshot},
    config::Config,
    error::AppError,
    models::audit_log::{Actor, AuditAction, AuditRecord, NewAuditRecord},
    repositories::audit_log::AuditLogFilters,
    services::audit_log::{DEFAULT_QUERY_LIMIT, DEFAULT_RECENT_LIMIT},
    state::AppState,
};

#[derive(Debug, Default, Deserialize, Serialize, Validate, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AuditLogListQuery {
    pub entity_table: Option<String>,
    pub entity_id: Option<String>,
    /// CREATE, UPDATE or DELETE.
    pub action: Option<String>,
    pub field_name: Option<String>,
    pub actor_id: Option<String>,
    #[validate(range(min = 0))]
    pub skip: Option<i64>,
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct RecentAuditLogQuery {
    #[validate(range(min = 1, max = 200))]
    pub limit: Option<i64>,
}

/// A pre-rendered audit entry supplied by a caller.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateAuditLogRequest {
    #[validate(length(min = 1, max = 100))]
    pub entity_table: String,
    #[validate(length(min = 1, max = 50))]
    pub entity_id: String,
    #[validate(length(min = 1, max = 100))]
    pub field_name: String,
    pub action: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    #[validate(length(max = 100))]
    pub actor_id: Option<String>,
    #[validate(length(max = 255))]
    pub actor_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateAuditLogBatchRequest {
    #[validate(nested)]
    pub logs: Vec<CreateAuditLogRequest>,
}

/// An entity mutation to be diffed and audited.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AuditEventRequest {
    #[validate(length(min = 1, max = 100))]
    pub entity_table: String,
    #[validate(length(min = 1, max = 50))]
    pub entity_id: String,
    pub action: String,
    /// Stored field values before the mutation.
    #[schema(value_type = Option<Object>)]
    pub before: Option<Value>,
    /// Submitted field values.
    #[schema(value_type = Option<Object>)]
    pub after: Option<Value>,
    #[validate(length(max = 100))]
    pub actor_id: Option<String>,
    #[validate(length(max = 255))]
    pub actor_name: Option<String>,
}

pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(q): Query<AuditLogListQuery>,
) -> Result<Json<Vec<AuditRecord>>, AppError> {
    let (skip, limit, filters) = validate_list_query(q)?;
    let records = state.audit.query(&filters, skip, limit).await?;
    Ok(Json(records))
}

pub async fn recent_audit_logs(
    State(state): State<AppState>,
    Query(q): Query<RecentAuditLogQuery>,
) -> Result<Json<Vec<AuditRecord>>, AppError> {
    q.validate()?;
    let records = state
        .audit
        .recent(q.limit.unwrap_or(DEFAULT_RECENT_LIMIT))
        .await?;
    Ok(Json(records))
}

pub async fn record_audit_logs(
    State(state): State<AppState>,
    Path((entity_table, entity_id)): Path<(String, String)>,
) -> Result<Json<Vec<AuditRecord>>, AppError> {
    let records = state.audit.for_record(&entity_table, &entity_id).await?;
    Ok(Json(records))
}

pub async fn get_audit_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AuditRecord>, AppError> {
    let record = state
        .audit
        .fetch(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Audit log not found".into()))?;
    Ok(Json(record))
}

pub async fn create_audit_log(
    State(state): State<AppState>,
    Json(payload): Json<CreateAuditLogRequest>,
) -> Result<Json<AuditRecord>, AppError> {
    payload.validate()?;
    let record = manual_record(&state.config, payload, Utc::now())?;
    let mut rows = state.audit.persist(vec![record]).await?;
    let row = rows.pop().ok_or_else(|| {
        AppError::InternalServerError(anyhow::anyhow!("audit insert returned no row"))
    })?;
    Ok(Json(row))
}

pub async fn create_audit_log_batch(
    State(state): State<AppState>,
    Json(payload): Json<CreateAuditLogBatchRequest>,
) -> Result<Json<Vec<AuditRecord>>, AppError> {
    payload.validate()?;
    let timestamp = Utc::now();
    let records = payload
        .logs
        .into_iter()
        .map(|entry| manual_record(&state.config, entry, timestamp))
        .collect::<Result<Vec<_>, _>>()?;
    let rows = state.audit.persist(records).await?;
    Ok(Json(rows))
}

pub async fn record_audit_event(
    State(state): State<AppState>,
    Json(payload): Json<AuditEventRequest>,
) -> Result<Json<Vec<AuditRecord>>, AppError> {
    payload.validate()?;
    let action: AuditAction = payload.action.parse()?;
    let actor = resolve_actor(&state.config, payload.actor_id, payload.actor_name);
    let table = required_identifier(&payload.entity_table, "entity_table")?;
    let id = required_identifier(&payload.entity_id, "entity_id")?;

    let rows = match action {
        AuditAction::Create => {
            let after = required_snapshot(payload.after, "after")?;
            state.audit.on_create(table, id, &after, &actor).await?
        }
        AuditAction::Update => {
            let before = required_snapshot(payload.before, "before")?;
            let after = required_snapshot(payload.after, "after")?;
            state
                .audit
                .on_update(table, id, &before, &after, &actor)
                .await?
        }
        AuditAction::Delete => {
            let before = required_snapshot(payload.before, "before")?;
            state.audit.on_delete(table, id, &before, &actor).await?
        }
    };
    Ok(Json(rows))
}

fn validate_list_query(q: AuditLogListQuery) -> Result<(i64, i64, AuditLogFilters), AppError> {
    q.validate()?;
    let action = normalize_filter(q.action)
        .map(|value| value.parse::<AuditAction>())
        .transpose()?;

    let filters = AuditLogFilters {
        entity_table: normalize_filter(q.entity_table),
        entity_id: normalize_filter(q.entity_id),
        action,
        field_name: normalize_filter(q.field_name),
        actor_id: normalize_filter(q.actor_id),
    };
    Ok((
        q.skip.unwrap_or(0),
        q.limit.unwrap_or(DEFAULT_QUERY_LIMIT),
        filters,
    ))
}

fn manual_record(
    config: &Config,
    entry: CreateAuditLogRequest,
    timestamp: DateTime<Utc>,
) -> Result<NewAuditRecord, AppError> {
    let action: AuditAction = entry.action.parse()?;
    match action {
        AuditAction::Create if entry.old_value.is_some() => {
            return Err(AppError::BadRequest(
                "CREATE entries cannot carry old_value".into(),
            ))
        }
        AuditAction::Delete if entry.new_value.is_some() => {
            return Err(AppError::BadRequest(
                "DELETE entries cannot carry new_value".into(),
            ))
        }
        _ => {}
    }

    let entity_table = required_identifier(&entry.entity_table, "entity_table")?.to_string();
    let entity_id = required_identifier(&entry.entity_id, "entity_id")?.to_string();
    let field_name = required_identifier(&entry.field_name, "field_name")?.to_string();

    let actor = resolve_actor(config, entry.actor_id, entry.actor_name);
    Ok(NewAuditRecord {
        entity_table,
        entity_id,
        field_name,
        action,
        old_value: entry.old_value,
        new_value: entry.new_value,
        actor_id: actor.id,
        actor_name: actor.name,
        timestamp,
    })
}

/// Falls back to the configured system identity when the caller names no actor.
fn resolve_actor(config: &Config, actor_id: Option<String>, actor_name: Option<String>) -> Actor {
    let actor_id = normalize_filter(actor_id);
    let actor_name = normalize_filter(actor_name);
    if actor_id.is_none() && actor_name.is_none() {
        return config.system_actor();
    }
    Actor {
        id: actor_id,
        name: actor_name,
    }
}

/// Trimmed identifier; whitespace-only input is rejected.
fn required_identifier<'a>(value: &'a str, name: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("`{}` must not be blank", name)));
    }
    Ok(trimmed)
}

fn required_snapshot(value: Option<Value>, name: &str) -> Result<Snapshot, AppError> {
    let value = value.ok_or_else(|| {
        AppError::BadRequest(format!("`{}` is required for this action", name))
    })?;
    snapshot_from_json(value)
        .ok_or_else(|| AppError::BadRequest(format!("`{}` must be a JSON object", name)))
}

fn normalize_filter(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/orgrecords_test".into(),
            database_max_connections: 1,
            bind_addr: "127.0.0.1:0".into(),
            system_actor_id: "system".into(),
            system_actor_name: "System User".into(),
            cors_allow_origins: Vec::new(),
            audit_rules: Default::default(),
        }
    }

    fn entry(action: &str) -> CreateAuditLogRequest {
        CreateAuditLogRequest {
            entity_table: " companies ".into(),
            entity_id: "42".into(),
            field_name: "status".into(),
            action: action.into(),
            old_value: None,
            new_value: Some("Active".into()),
            actor_id: None,
            actor_name: None,
        }
    }

    #[test]
    fn list_query_defaults_and_trims_filters() {
        let (skip, limit, filters) = validate_list_query(AuditLogListQuery {
            entity_table: Some(" companies ".into()),
            entity_id: Some("  ".into()),
            action: Some("update".into()),
            ..AuditLogListQuery::default()
        })
        .expect("valid query");

        assert_eq!(skip, 0);
        assert_eq!(limit, DEFAULT_QUERY_LIMIT);
        assert_eq!(filters.entity_table.as_deref(), Some("companies"));
        assert_eq!(filters.entity_id, None);
        assert_eq!(filters.action, Some(AuditAction::Update));
    }

    #[test]
    fn list_query_rejects_bad_limits_and_actions() {
        for limit in [0, 1001] {
            let result = validate_list_query(AuditLogListQuery {
                limit: Some(limit),
                ..AuditLogListQuery::default()
            });
            assert!(matches!(result, Err(AppError::Validation(_))));
        }

        let result = validate_list_query(AuditLogListQuery {
            skip: Some(-1),
            ..AuditLogListQuery::default()
        });
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = validate_list_query(AuditLogListQuery {
            action: Some("MERGE".into()),
            ..AuditLogListQuery::default()
        });
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn manual_record_defaults_to_system_actor() {
        let record = manual_record(&test_config(), entry("CREATE"), Utc::now()).expect("record");
        assert_eq!(record.entity_table, "companies");
        assert_eq!(record.action, AuditAction::Create);
        assert_eq!(record.actor_id.as_deref(), Some("system"));
        assert_eq!(record.actor_name.as_deref(), Some("System User"));
    }

    #[test]
    fn manual_record_keeps_explicit_actor() {
        let mut request = entry("UPDATE");
        request.actor_id = Some("u-7".into());
        let record = manual_record(&test_config(), request, Utc::now()).expect("record");
        assert_eq!(record.actor_id.as_deref(), Some("u-7"));
        assert_eq!(record.actor_name, None);
    }

    #[test]
    fn manual_record_rejects_values_on_the_wrong_side() {
        let mut create = entry("CREATE");
        create.old_value = Some("x".into());
        assert!(matches!(
            manual_record(&test_config(), create, Utc::now()),
            Err(AppError::BadRequest(_))
        ));

        let delete = entry("DELETE");
        assert!(matches!(
            manual_record(&test_config(), delete, Utc::now()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn manual_record_rejects_blank_identifiers() {
        let blank_table = CreateAuditLogRequest {
            entity_table: "   ".into(),
            ..entry("UPDATE")
        };
        let blank_id = CreateAuditLogRequest {
            entity_id: "  ".into(),
            ..entry("UPDATE")
        };
        let blank_field = CreateAuditLogRequest {
            field_name: " ".into(),
            ..entry("UPDATE")
        };

        for (request, name) in [
            (blank_table, "entity_table"),
            (blank_id, "entity_id"),
            (blank_field, "field_name"),
        ] {
            assert!(request.validate().is_ok());
            assert!(matches!(
                manual_record(&test_config(), request, Utc::now()),
                Err(AppError::BadRequest(msg)) if msg.contains(name)
            ));
        }
    }

    #[test]
    fn identifiers_are_trimmed_before_use() {
        assert_eq!(required_identifier(" companies ", "entity_table").ok(), Some("companies"));
        assert!(matches!(
            required_identifier(" \t ", "entity_id"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn snapshots_must_be_present_objects() {
        assert!(required_snapshot(Some(json!({ "name": "Acme" })), "after").is_ok());
        assert!(matches!(
            required_snapshot(None, "after"),
            Err(AppError::BadRequest(msg)) if msg.contains("`after`")
        ));
        assert!(matches!(
            required_snapshot(Some(json!([1, 2])), "before"),
            Err(AppError::BadRequest(_))
        ));
    }
}
