pub mod audit_log;
pub mod transaction;

pub use audit_log::{AuditLogFilters, AuditLogStore, Page, PgAuditLogStore};
