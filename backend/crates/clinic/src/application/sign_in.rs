//! Admin Sign In Use Case
//!
//! Rate limit, verify the password, record the attempt, then check the
//! accepted credentials against the breach APIs. A degraded breach check
//! never blocks the sign-in.

use std::sync::Arc;

use kernel::id::AdminId;
use platform::breach::{BreachChecker, BreachReport};
use platform::client::RequestContext;
use platform::crypto::email_fingerprint;
use platform::password::ClearTextPassword;
use platform::rate_limit::{AttemptStore, LoginRateLimiter};
use serde_json::json;

use crate::application::audit::AuditLogger;
use crate::domain::entity::admin::Admin;
use crate::domain::entity::audit_entry::AuditEntry;
use crate::domain::repository::{AdminRepository, RowStore};
use crate::error::{ClinicError, ClinicResult};

/// Sign in input
pub struct AdminSignInInput {
    pub email: String,
    pub password: String,
}

/// Sign in output
#[derive(Debug)]
pub struct AdminSignInOutput {
    pub admin_id: AdminId,
    pub email: String,
    pub display_name: String,
    pub breach: BreachReport,
    /// Text to show the admin when the breach check found something
    pub warning: Option<String>,
}

/// Admin sign in use case
pub struct AdminSignInUseCase<A, S, R>
where
    A: AdminRepository,
    S: AttemptStore,
    R: RowStore,
{
    admin_repo: Arc<A>,
    rate_limiter: LoginRateLimiter<S>,
    breach_checker: Arc<BreachChecker>,
    audit: AuditLogger<R>,
    pepper: Option<Vec<u8>>,
}

impl<A, S, R> AdminSignInUseCase<A, S, R>
where
    A: AdminRepository + Sync,
    S: AttemptStore + Sync,
    R: RowStore + Send + Sync,
{
    pub fn new(
        admin_repo: Arc<A>,
        rate_limiter: LoginRateLimiter<S>,
        breach_checker: Arc<BreachChecker>,
        audit: AuditLogger<R>,
    ) -> Self {
        Self {
            admin_repo,
            rate_limiter,
            breach_checker,
            audit,
            pepper: None,
        }
    }

    pub fn with_pepper(mut self, pepper: Option<Vec<u8>>) -> Self {
        self.pepper = pepper;
        self
    }

    pub async fn execute(
        &self,
        input: AdminSignInInput,
        ctx: RequestContext,
    ) -> ClinicResult<AdminSignInOutput> {
        let email_id = email_fingerprint(&input.email);

        let status = self.rate_limiter.is_rate_limited(&input.email).await?;
        if status.limited {
            tracing::warn!(
                email_id = %email_id,
                retry_after_secs = status.retry_after_secs,
                "Admin sign-in refused, locked out"
            );
            return Err(ClinicError::RateLimited {
                retry_after_secs: status.retry_after_secs,
            });
        }

        let password = ClearTextPassword::from_login_input(input.password);
        let admin = self.admin_repo.find_by_email(&input.email).await?;

        // Missing and disabled admins look the same as a wrong password
        let accepted = match &admin {
            Some(admin) if admin.can_login() => {
                admin.password_hash.verify(&password, self.pepper.as_deref())
            }
            _ => false,
        };

        self.rate_limiter
            .record_login_attempt(&input.email, accepted)
            .await?;

        let admin = match admin {
            Some(admin) if accepted => admin,
            _ => {
                tracing::warn!(email_id = %email_id, "Admin sign-in rejected");
                return Err(ClinicError::InvalidCredentials);
            }
        };

        if admin.password_hash.needs_rehash() {
            self.rehash(&admin, &password).await;
        }

        let breach = self
            .breach_checker
            .perform_breach_check(&admin.email, password.expose_secret())
            .await;
        let warning = breach.warning();

        self.audit
            .log_action_best_effort(
                AuditEntry::new("admin.sign_in", "admin")
                    .by_admin(admin.admin_id, &admin.email)
                    .on_resource(admin.admin_id)
                    .with_details(json!({
                        "email_compromised": breach.email_compromised(),
                        "password_breached": breach.password_breached(),
                        "breach_check_degraded": breach.is_degraded(),
                    }))
                    .with_context(&ctx),
            )
            .await;

        tracing::info!(
            admin_id = %admin.admin_id,
            breach_warning = warning.is_some(),
            breach_degraded = breach.is_degraded(),
            "Admin signed in"
        );

        Ok(AdminSignInOutput {
            admin_id: admin.admin_id,
            email: admin.email,
            display_name: admin.display_name,
            breach,
            warning,
        })
    }

    /// Upgrade a hash made with outdated parameters; failure only warns
    async fn rehash(&self, admin: &Admin, password: &ClearTextPassword) {
        let result = match password.hash(self.pepper.as_deref()) {
            Ok(hash) => self.admin_repo.update_password_hash(&admin.admin_id, &hash).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => tracing::info!(admin_id = %admin.admin_id, "Admin password rehashed"),
            Err(e) => {
                tracing::warn!(admin_id = %admin.admin_id, error = %e, "Password rehash failed")
            }
        }
    }
}
