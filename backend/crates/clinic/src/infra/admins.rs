//! Admin accounts in the `admins` table

use std::sync::Arc;

use kernel::id::AdminId;
use platform::password::HashedPassword;
use platform::rate_limit::normalize_email;
use serde_json::json;

use crate::domain::entity::admin::Admin;
use crate::domain::repository::{AdminRepository, Filter, Query, RowStore};
use crate::error::{ClinicError, ClinicResult};
use crate::infra::memory::row_from;

pub const ADMINS_TABLE: &str = "admins";

/// Admin repository over any [`RowStore`]
#[derive(Debug)]
pub struct RowAdminRepository<R> {
    rows: Arc<R>,
}

impl<R> RowAdminRepository<R> {
    pub fn new(rows: Arc<R>) -> Self {
        Self { rows }
    }
}

impl<R> Clone for RowAdminRepository<R> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<R: RowStore + Send + Sync> RowAdminRepository<R> {
    pub async fn create(&self, admin: &Admin) -> ClinicResult<()> {
        self.rows.insert(ADMINS_TABLE, admin.to_row()).await?;
        Ok(())
    }
}

impl<R> AdminRepository for RowAdminRepository<R>
where
    R: RowStore + Send + Sync,
{
    async fn find_by_email(&self, email: &str) -> ClinicResult<Option<Admin>> {
        let query = Query::new()
            .filter(Filter::new().eq("email", normalize_email(email)))
            .limit(1);
        let rows = self.rows.select(ADMINS_TABLE, &query).await?;

        rows.into_iter().next().map(Admin::from_row).transpose()
    }

    async fn update_password_hash(
        &self,
        admin_id: &AdminId,
        password_hash: &HashedPassword,
    ) -> ClinicResult<()> {
        let patch = row_from(json!({ "password_hash": password_hash.as_phc_string() }));
        let updated = self
            .rows
            .update(
                ADMINS_TABLE,
                &Filter::new().eq("id", admin_id.to_string()),
                patch,
            )
            .await?;

        if updated.is_empty() {
            return Err(ClinicError::NotFound(format!("admin {admin_id}")));
        }
        Ok(())
    }
}
