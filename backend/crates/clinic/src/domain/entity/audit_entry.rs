//! Audit Entry Entity
//!
//! One row of the `audit_logs` table: which admin did what to which record.

use chrono::{DateTime, Utc};
use kernel::id::{AdminId, AuditEntryId};
use platform::client::RequestContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub admin_id: Option<AdminId>,
    pub admin_email: Option<String>,
    /// Dotted verb, e.g. `booking.update`
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    /// Free-form context (changed fields, counts); never raw PII
    #[serde(default)]
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: AuditEntryId::new(),
            admin_id: None,
            admin_email: None,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            details: Value::Null,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    pub fn by_admin(mut self, admin_id: AdminId, admin_email: impl Into<String>) -> Self {
        self.admin_id = Some(admin_id);
        self.admin_email = Some(admin_email.into());
        self
    }

    pub fn on_resource(mut self, resource_id: impl ToString) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_context(mut self, ctx: &RequestContext) -> Self {
        self.ip_address = ctx.ip_string();
        self.user_agent = ctx.user_agent.clone();
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}
