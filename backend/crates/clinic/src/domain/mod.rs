//! Domain Layer
//!
//! Entities, PII field lists and repository traits.

pub mod entity;
pub mod pii;
pub mod repository;

// Re-exports
pub use entity::{admin::Admin, audit_entry::AuditEntry};
pub use repository::{AdminRepository, Filter, Query, Row, RowStore};
