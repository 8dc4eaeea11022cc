use anyhow::{anyhow, Context};
use std::{env, fs, path::Path};

use crate::{
    audit::rules::{AuditRules, FirstSetPolicy},
    models::audit_log::Actor,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub system_actor_id: String,
    pub system_actor_name: String,
    pub cors_allow_origins: Vec<String>,
    pub audit_rules: AuditRules,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/orgrecords".to_string());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let bind_addr = env::var("APP_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let system_actor_id =
            env::var("AUDIT_SYSTEM_ACTOR_ID").unwrap_or_else(|_| "system".to_string());
        let system_actor_name =
            env::var("AUDIT_SYSTEM_ACTOR_NAME").unwrap_or_else(|_| "System User".to_string());

        let cors_allow_origins = parse_origins(env::var("CORS_ALLOW_ORIGINS").ok().as_deref());

        let audit_rules = load_audit_rules(
            env::var("AUDIT_RULES_FILE").ok().as_deref(),
            env::var("AUDIT_FIRST_SET_POLICY").ok().as_deref(),
        )?;

        Ok(Config {
            database_url,
            database_max_connections,
            bind_addr,
            system_actor_id,
            system_actor_name,
            cors_allow_origins,
            audit_rules,
        })
    }

    /// Actor recorded when a caller does not identify itself.
    pub fn system_actor(&self) -> Actor {
        Actor::new(self.system_actor_id.clone(), self.system_actor_name.clone())
    }
}

/// Built-in rules, optionally replaced by a JSON rules file and then
/// overridden by an explicit first-set policy.
pub fn load_audit_rules(
    rules_file: Option<&str>,
    first_set_policy: Option<&str>,
) -> anyhow::Result<AuditRules> {
    let mut rules = match rules_file.filter(|path| !path.trim().is_empty()) {
        Some(path) => read_rules_file(Path::new(path))?,
        None => AuditRules::default(),
    };

    if let Some(raw) = first_set_policy.filter(|value| !value.trim().is_empty()) {
        rules.first_set_policy = raw
            .parse::<FirstSetPolicy>()
            .map_err(|_| anyhow!("Invalid AUDIT_FIRST_SET_POLICY value: {}", raw))?;
    }

    Ok(rules)
}

fn read_rules_file(path: &Path) -> anyhow::Result<AuditRules> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read audit rules file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid audit rules file {}", path.display()))
}

fn parse_origins(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_rules_file() {
        let rules = load_audit_rules(None, None).expect("default rules");
        assert_eq!(rules, AuditRules::default());
        assert_eq!(rules.first_set_policy, FirstSetPolicy::Skip);
    }

    #[test]
    fn rules_file_overrides_only_the_keys_it_names() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{ "rating_fields": ["score"], "rating_max": 10,
                 "first_set_policy": "record_as_update" }}"#
        )
        .expect("write rules");

        let path = file.path().to_string_lossy().to_string();
        let rules = load_audit_rules(Some(&path), None).expect("rules from file");

        assert!(rules.rating_fields.contains("score"));
        assert!(!rules.rating_fields.contains("rating"));
        assert_eq!(rules.rating_max, 10.0);
        assert_eq!(rules.first_set_policy, FirstSetPolicy::RecordAsUpdate);
        assert_eq!(
            rules.legacy_boolean_fields,
            AuditRules::default().legacy_boolean_fields
        );
    }

    #[test]
    fn explicit_policy_wins_over_the_rules_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "first_set_policy": "record_as_update" }}"#).expect("write rules");

        let path = file.path().to_string_lossy().to_string();
        let rules = load_audit_rules(Some(&path), Some("skip")).expect("rules");
        assert_eq!(rules.first_set_policy, FirstSetPolicy::Skip);
    }

    #[test]
    fn invalid_inputs_are_reported() {
        assert!(load_audit_rules(None, Some("sometimes")).is_err());
        assert!(load_audit_rules(Some("/nonexistent/audit-rules.json"), None).is_err());

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "not json").expect("write rules");
        let path = file.path().to_string_lossy().to_string();
        assert!(load_audit_rules(Some(&path), None).is_err());
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        assert_eq!(
            parse_origins(Some(" http://a.test , ,http://b.test")),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(parse_origins(None).is_empty());
    }
}
