//! Admin Audit Logging
//!
//! Records admin actions in `audit_logs` and reads them back newest first.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::entity::audit_entry::AuditEntry;
use crate::domain::repository::{Direction, Filter, Query, Row, RowStore};
use crate::error::{ClinicError, ClinicResult};

pub const AUDIT_TABLE: &str = "audit_logs";

/// Upper bound for a single read
pub const MAX_AUDIT_PAGE: usize = 500;

/// Audit logger over any [`RowStore`]
#[derive(Debug)]
pub struct AuditLogger<R> {
    rows: Arc<R>,
}

impl<R> Clone for AuditLogger<R> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<R: RowStore + Send + Sync> AuditLogger<R> {
    pub fn new(rows: Arc<R>) -> Self {
        Self { rows }
    }

    /// Insert an entry; failures are returned to the caller
    pub async fn log_action(&self, entry: AuditEntry) -> ClinicResult<()> {
        let row = match serde_json::to_value(&entry)? {
            Value::Object(row) => row,
            _ => return Err(ClinicError::Internal("audit entry is not an object".to_string())),
        };
        self.rows.insert(AUDIT_TABLE, row).await?;

        tracing::info!(
            action = %entry.action,
            resource_type = %entry.resource_type,
            resource_id = entry.resource_id.as_deref().unwrap_or("-"),
            admin_id = ?entry.admin_id,
            "Admin action recorded"
        );
        Ok(())
    }

    /// Insert an entry, logging instead of failing
    ///
    /// For admin operations that already succeeded and must not be undone
    /// by a failed audit write.
    pub async fn log_action_best_effort(&self, entry: AuditEntry) {
        let action = entry.action.clone();
        if let Err(e) = self.log_action(entry).await {
            tracing::error!(action = %action, error = %e, "Failed to write audit log entry");
        }
    }

    /// Most recent entries, newest first
    pub async fn recent(&self, limit: usize) -> ClinicResult<Vec<AuditEntry>> {
        let query = Query::new()
            .order_by("created_at", Direction::Desc)
            .limit(limit.clamp(1, MAX_AUDIT_PAGE));
        self.fetch(&query).await
    }

    /// Entries about one record, newest first
    pub async fn for_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> ClinicResult<Vec<AuditEntry>> {
        let query = Query::new()
            .filter(
                Filter::new()
                    .eq("resource_type", resource_type)
                    .eq("resource_id", resource_id),
            )
            .order_by("created_at", Direction::Desc)
            .limit(MAX_AUDIT_PAGE);
        self.fetch(&query).await
    }

    async fn fetch(&self, query: &Query) -> ClinicResult<Vec<AuditEntry>> {
        let rows = self.rows.select(AUDIT_TABLE, query).await?;
        rows.into_iter().map(entry_from_row).collect()
    }
}

fn entry_from_row(row: Row) -> ClinicResult<AuditEntry> {
    Ok(serde_json::from_value(Value::Object(row))?)
}
