//! Injectable rule tables for the audit engine.
//!
//! All field-name based behavior of the normalizer, the significance filter
//! and the diff engine is driven from [`AuditRules`]. Deployments can replace
//! the defaults with a JSON file (see `Config::load`).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// How an UPDATE that sets a field for the first time is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstSetPolicy {
    /// Empty to value transitions are not recorded as updates.
    #[default]
    Skip,
    /// Empty to value transitions are recorded as ordinary updates.
    RecordAsUpdate,
}

impl FromStr for FirstSetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(FirstSetPolicy::Skip),
            "record" | "record_as_update" => Ok(FirstSetPolicy::RecordAsUpdate),
            other => Err(format!("unknown first-set policy `{}`", other)),
        }
    }
}

/// Versioned mapping from enumerated category to raw code to display label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumLabelTable {
    pub version: u32,
    pub categories: BTreeMap<String, BTreeMap<String, String>>,
}

impl EnumLabelTable {
    /// Resolves a `Category.CODE` rendering. Returns `None` when the
    /// category is unknown.
    pub fn resolve(&self, category: &str, code: &str) -> Option<String> {
        let codes = self.categories.get(category)?;
        Some(codes.get(code).cloned().unwrap_or_else(|| code.to_string()))
    }
}

impl Default for EnumLabelTable {
    fn default() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            "CompanyType".to_string(),
            labels(&[
                ("COMPANY", "Company"),
                ("GROUP", "Group"),
                ("DIVISION", "Division"),
            ]),
        );
        categories.insert(
            "BusinessActivity".to_string(),
            labels(&[("Y", "Yes"), ("N", "No")]),
        );
        categories.insert(
            "LivingStatus".to_string(),
            labels(&[
                ("ACTIVE", "Active"),
                ("INACTIVE", "Inactive"),
                ("DORMANT", "Dormant"),
                ("IN_PROCESS", "In Process"),
            ]),
        );
        categories.insert("OwnershipType".to_string(), BTreeMap::new());
        categories.insert("GlobalOperations".to_string(), BTreeMap::new());

        Self {
            version: 1,
            categories,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditRules {
    /// Per-activity flags superseded by a consolidated field; their negative
    /// values are noise.
    pub legacy_boolean_fields: BTreeSet<String>,
    pub legacy_boolean_negative_values: BTreeSet<String>,
    pub rating_fields: BTreeSet<String>,
    pub rating_min: f64,
    pub rating_max: f64,
    pub industries_field: Option<String>,
    /// Field to normalized default. A CREATE carrying exactly the default is
    /// not logged.
    pub create_default_values: BTreeMap<String, String>,
    /// Fields compared ignoring case and surrounding whitespace.
    pub case_insensitive_fields: BTreeSet<String>,
    pub first_set_policy: FirstSetPolicy,
    pub enum_labels: EnumLabelTable,
}

impl Default for AuditRules {
    fn default() -> Self {
        Self {
            legacy_boolean_fields: names(&[
                "imports",
                "exports",
                "manufacture",
                "distribution",
                "wholesale",
                "retail",
                "services",
                "online",
                "soft_products",
            ]),
            legacy_boolean_negative_values: names(&["N", "No", "false", "0"]),
            rating_fields: names(&[
                "company_brand_image",
                "company_business_volume",
                "company_financials",
                "iisol_relationship",
                "rating",
            ]),
            rating_min: 1.0,
            rating_max: 5.0,
            industries_field: Some("selected_industries".to_string()),
            create_default_values: BTreeMap::new(),
            case_insensitive_fields: names(&["living_status", "company_group_data_type"]),
            first_set_policy: FirstSetPolicy::Skip,
            enum_labels: EnumLabelTable::default(),
        }
    }
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(code, label)| (code.to_string(), label.to_string()))
        .collect()
}
