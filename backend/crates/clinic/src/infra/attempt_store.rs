//! Login attempt store over the hosted row store
//!
//! Keeps limiter state in `login_attempts` and `login_lockouts` so several
//! backend instances share one view of failed sign-ins.

use std::sync::Arc;

use platform::rate_limit::{
    AttemptStore, AttemptStoreError, LockCheck, LockoutRule, LoginAttempt,
};
use serde_json::json;

use crate::domain::repository::{Direction, Filter, Query, Row, RowStore};
use crate::error::ClinicError;
use crate::infra::memory::row_from;

pub const ATTEMPTS_TABLE: &str = "login_attempts";
pub const LOCKOUTS_TABLE: &str = "login_lockouts";

/// Attempt store backed by any [`RowStore`]
#[derive(Debug)]
pub struct RowAttemptStore<R> {
    rows: Arc<R>,
}

impl<R> RowAttemptStore<R> {
    pub fn new(rows: Arc<R>) -> Self {
        Self { rows }
    }
}

impl<R> Clone for RowAttemptStore<R> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<R: RowStore + Send + Sync> RowAttemptStore<R> {
    async fn delete_lockouts(&self, key: &str) -> Result<(), AttemptStoreError> {
        self.rows
            .delete(LOCKOUTS_TABLE, &by_email(key))
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(err: ClinicError) -> AttemptStoreError {
    AttemptStoreError::Unavailable(err.to_string())
}

fn attempt_from_row(row: Row) -> Result<LoginAttempt, AttemptStoreError> {
    let email = row.get("email").and_then(|v| v.as_str());
    let timestamp_ms = row.get("attempted_at_ms").and_then(|v| v.as_i64());
    let failed = row.get("failed").and_then(|v| v.as_bool());

    match (email, timestamp_ms, failed) {
        (Some(email), Some(timestamp_ms), Some(failed)) => Ok(LoginAttempt {
            email: email.to_string(),
            timestamp_ms,
            failed,
        }),
        _ => Err(AttemptStoreError::Malformed(format!(
            "{ATTEMPTS_TABLE} row missing email, attempted_at_ms or failed"
        ))),
    }
}

fn by_email(key: &str) -> Filter {
    Filter::new().eq("email", key)
}

impl<R> AttemptStore for RowAttemptStore<R>
where
    R: RowStore + Send + Sync,
{
    async fn attempts(&self, key: &str) -> Result<Vec<LoginAttempt>, AttemptStoreError> {
        let query = Query::new()
            .filter(by_email(key))
            .order_by("attempted_at_ms", Direction::Asc);
        let rows = self
            .rows
            .select(ATTEMPTS_TABLE, &query)
            .await
            .map_err(unavailable)?;

        rows.into_iter().map(attempt_from_row).collect()
    }

    async fn record(
        &self,
        key: &str,
        attempt: LoginAttempt,
        prune_before_ms: i64,
    ) -> Result<(), AttemptStoreError> {
        self.rows
            .delete(
                ATTEMPTS_TABLE,
                &by_email(key).lte("attempted_at_ms", prune_before_ms),
            )
            .await
            .map_err(unavailable)?;

        let row = row_from(json!({
            "email": key,
            "attempted_at_ms": attempt.timestamp_ms,
            "failed": attempt.failed,
        }));
        self.rows
            .insert(ATTEMPTS_TABLE, row)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn lockout_expiry(&self, key: &str) -> Result<Option<i64>, AttemptStoreError> {
        let query = Query::new()
            .filter(by_email(key))
            .order_by("expires_at_ms", Direction::Desc)
            .limit(1);
        let rows = self
            .rows
            .select(LOCKOUTS_TABLE, &query)
            .await
            .map_err(unavailable)?;

        match rows.first() {
            None => Ok(None),
            Some(row) => row
                .get("expires_at_ms")
                .and_then(|v| v.as_i64())
                .map(Some)
                .ok_or_else(|| {
                    AttemptStoreError::Malformed(format!("{LOCKOUTS_TABLE} row missing expires_at_ms"))
                }),
        }
    }

    /// Evaluate and register a lockout through row operations
    ///
    /// Rows cannot be locked across requests, so the lockout is inserted
    /// first and the attempts are read again afterwards. A [`reset`] that
    /// deleted them in between is detected and the lockout is withdrawn; a
    /// reset that runs later deletes the lockout row itself. Two concurrent
    /// checks can each insert a lockout; [`lockout_expiry`] reads the latest.
    ///
    /// [`reset`]: AttemptStore::reset
    /// [`lockout_expiry`]: AttemptStore::lockout_expiry
    async fn check_and_lock(
        &self,
        key: &str,
        now_ms: i64,
        rule: LockoutRule,
    ) -> Result<LockCheck, AttemptStoreError> {
        if let Some(expires_at_ms) = self.lockout_expiry(key).await? {
            if now_ms < expires_at_ms {
                return Ok(LockCheck::Active { expires_at_ms });
            }
            self.delete_lockouts(key).await?;
        }

        let failed = rule.failed_in_window(&self.attempts(key).await?, now_ms);
        if failed < rule.max_attempts {
            return Ok(LockCheck::Open);
        }

        let expires_at_ms = rule.lockout_expiry(now_ms);
        let row = row_from(json!({ "email": key, "expires_at_ms": expires_at_ms }));
        self.rows
            .insert(LOCKOUTS_TABLE, row)
            .await
            .map_err(unavailable)?;

        let still_failed = rule.failed_in_window(&self.attempts(key).await?, now_ms);
        if still_failed < rule.max_attempts {
            tracing::debug!("Attempts reset during lockout check, lockout withdrawn");
            self.delete_lockouts(key).await?;
            return Ok(LockCheck::Open);
        }

        Ok(LockCheck::Triggered {
            expires_at_ms,
            failed: still_failed,
        })
    }

    async fn reset(&self, key: &str) -> Result<(), AttemptStoreError> {
        self.rows
            .delete(ATTEMPTS_TABLE, &by_email(key))
            .await
            .map_err(unavailable)?;
        self.delete_lockouts(key).await
    }

    async fn reset_all(&self) -> Result<(), AttemptStoreError> {
        // Row stores refuse unfiltered deletes
        self.rows
            .delete(ATTEMPTS_TABLE, &Filter::new().gte("attempted_at_ms", 0))
            .await
            .map_err(unavailable)?;
        self.rows
            .delete(LOCKOUTS_TABLE, &Filter::new().gte("expires_at_ms", 0))
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
