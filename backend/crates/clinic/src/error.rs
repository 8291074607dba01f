//! Clinic Error Types
//!
//! Clinic-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::config::ConfigError;
use platform::field_crypto::FieldCryptoError;
use platform::password::PasswordHashError;
use platform::rate_limit::AttemptStoreError;
use thiserror::Error;

/// Clinic-specific result type alias
pub type ClinicResult<T> = Result<T, ClinicError>;

/// Clinic-specific error variants
#[derive(Debug, Error)]
pub enum ClinicError {
    /// Unknown email, wrong password or inactive admin
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Too many failed sign-in attempts
    #[error("Too many login attempts, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0} not found")]
    NotFound(String),

    /// Rejected input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Hosted service answered with a non-success status
    #[error("{service} returned {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Encryption error: {0}")]
    Encryption(#[from] FieldCryptoError),

    #[error("Attempt store error: {0}")]
    AttemptStore(#[from] AttemptStoreError),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] PasswordHashError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Row that does not have the expected shape
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClinicError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClinicError::InvalidCredentials => ErrorKind::Unauthorized,
            ClinicError::RateLimited { .. } => ErrorKind::TooManyRequests,
            ClinicError::NotFound(_) => ErrorKind::NotFound,
            ClinicError::Validation(_) => ErrorKind::BadRequest,
            ClinicError::Upstream { .. } => ErrorKind::BadGateway,
            ClinicError::Http(e) if e.is_timeout() => ErrorKind::GatewayTimeout,
            ClinicError::Http(e) if e.is_connect() => ErrorKind::ServiceUnavailable,
            ClinicError::Http(_) => ErrorKind::BadGateway,
            ClinicError::AttemptStore(_) => ErrorKind::ServiceUnavailable,
            ClinicError::Encryption(_)
            | ClinicError::PasswordHash(_)
            | ClinicError::Config(_)
            | ClinicError::Serialization(_)
            | ClinicError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        match self {
            ClinicError::RateLimited { retry_after_secs } => {
                AppError::new(self.kind(), "Too many login attempts")
                    .with_action(format!("Try again in {} seconds", retry_after_secs))
            }
            // Server-side details stay in the logs
            _ if self.kind().is_server_error() => {
                AppError::new(self.kind(), self.kind().as_str())
            }
            _ => AppError::new(self.kind(), self.to_string()),
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            ClinicError::Upstream {
                service, status, ..
            } => {
                tracing::error!(service, status, error = %self, "Hosted service error");
            }
            ClinicError::Http(e) => {
                tracing::error!(error = %e, "Clinic HTTP error");
            }
            ClinicError::Encryption(e) => {
                tracing::error!(error = %e, "Clinic encryption error");
            }
            ClinicError::Internal(msg) => {
                tracing::error!(message = %msg, "Clinic internal error");
            }
            ClinicError::InvalidCredentials => {
                tracing::warn!("Invalid admin login attempt");
            }
            ClinicError::RateLimited { retry_after_secs } => {
                tracing::warn!(retry_after_secs, "Login attempt while locked out");
            }
            _ if self.kind().is_upstream() => {
                tracing::warn!(kind = %self.kind(), error = %self, "Upstream dependency failed");
            }
            _ if self.kind().is_server_error() => {
                tracing::error!(error = %self, "Clinic error");
            }
            _ => {
                tracing::debug!(error = %self, "Clinic error");
            }
        }
    }
}

impl From<AppError> for ClinicError {
    fn from(err: AppError) -> Self {
        ClinicError::Internal(err.to_string())
    }
}

impl From<ClinicError> for AppError {
    fn from(err: ClinicError) -> Self {
        err.log();
        err.to_app_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ClinicError::InvalidCredentials.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            ClinicError::RateLimited {
                retry_after_secs: 30
            }
            .kind(),
            ErrorKind::TooManyRequests
        );
        assert_eq!(
            ClinicError::Upstream {
                service: "postgrest",
                status: 500,
                message: "boom".to_string()
            }
            .kind(),
            ErrorKind::BadGateway
        );
        assert_eq!(
            ClinicError::AttemptStore(AttemptStoreError::Unavailable("down".to_string())).kind(),
            ErrorKind::ServiceUnavailable
        );
    }

    #[test]
    fn test_rate_limited_app_error_has_action() {
        let app = ClinicError::RateLimited {
            retry_after_secs: 1800,
        }
        .to_app_error();
        assert_eq!(app.status_code(), 429);
        assert_eq!(app.action(), Some("Try again in 1800 seconds"));
    }

    #[test]
    fn test_server_errors_hide_details() {
        let app = AppError::from(ClinicError::Internal("row 42 missing column".to_string()));
        assert_eq!(app.status_code(), 500);
        assert!(!app.message().contains("row 42"));
    }

    #[test]
    fn test_client_errors_keep_message() {
        let app = ClinicError::Validation("amount must be positive".to_string()).to_app_error();
        assert_eq!(app.status_code(), 400);
        assert!(app.message().contains("amount must be positive"));
    }
}
