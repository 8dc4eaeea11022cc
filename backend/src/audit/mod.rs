//! Field level change auditing: value rendering, significance rules and
//! snapshot diffing. Nothing in here touches the database.

pub mod diff;
pub mod normalizer;
pub mod rules;
pub mod significance;
pub mod value;

pub use diff::{ChangeSet, DiffEngine, FieldChange};
pub use rules::{AuditRules, EnumLabelTable, FirstSetPolicy};
pub use value::{FieldValue, Snapshot};
