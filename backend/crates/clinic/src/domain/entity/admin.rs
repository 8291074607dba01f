//! Admin Entity
//!
//! Staff account allowed into the clinic dashboard.

use chrono::{DateTime, Utc};
use kernel::id::AdminId;
use platform::password::HashedPassword;
use platform::rate_limit::normalize_email;
use serde::Deserialize;

use crate::domain::repository::Row;
use crate::error::{ClinicError, ClinicResult};

/// Admin entity
#[derive(Debug, Clone)]
pub struct Admin {
    pub admin_id: AdminId,
    /// Normalized (trimmed, lower-cased) email
    pub email: String,
    pub display_name: String,
    pub password_hash: HashedPassword,
    /// Disabled admins cannot sign in
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Admin {
    pub fn new(email: &str, display_name: impl Into<String>, password_hash: HashedPassword) -> Self {
        Self {
            admin_id: AdminId::new(),
            email: normalize_email(email),
            display_name: display_name.into(),
            password_hash,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn can_login(&self) -> bool {
        self.is_active
    }

    /// Row shape of the `admins` table
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), self.admin_id.to_string().into());
        row.insert("email".into(), self.email.clone().into());
        row.insert("display_name".into(), self.display_name.clone().into());
        row.insert(
            "password_hash".into(),
            self.password_hash.as_phc_string().into(),
        );
        row.insert("is_active".into(), self.is_active.into());
        row.insert(
            "last_login_at".into(),
            self.last_login_at
                .map(|t| t.to_rfc3339().into())
                .unwrap_or(serde_json::Value::Null),
        );
        row.insert("created_at".into(), self.created_at.to_rfc3339().into());
        row
    }

    pub fn from_row(row: Row) -> ClinicResult<Self> {
        let raw: AdminRow = serde_json::from_value(serde_json::Value::Object(row))?;
        let password_hash = HashedPassword::from_phc_string(raw.password_hash)
            .map_err(|e| ClinicError::Internal(format!("admin {}: {}", raw.id, e)))?;

        Ok(Self {
            admin_id: raw.id,
            email: raw.email,
            display_name: raw.display_name,
            password_hash,
            is_active: raw.is_active,
            last_login_at: raw.last_login_at,
            created_at: raw.created_at,
        })
    }
}

#[derive(Deserialize)]
struct AdminRow {
    id: AdminId,
    email: String,
    #[serde(default)]
    display_name: String,
    password_hash: String,
    #[serde(default = "default_active")]
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}
