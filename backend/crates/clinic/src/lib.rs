//! Clinic Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, PII field lists, repository traits
//! - `application/` - Use cases and application services
//! - `infra/` - Supabase REST and functions clients, in-memory stand-ins
//!
//! ## Features
//! - Admin sign-in with rate limiting and breach warnings
//! - Admin audit log
//! - Field-level encryption of customer, booking and invoice PII
//! - Invoice totals, logo loading and email composition
//! - Checkout sessions and email through serverless functions
//!
//! ## Security Model
//! - Passwords hashed with Argon2id, optional pepper
//! - PII encrypted before it leaves the process, writes fail closed
//! - Breach checks and logo loading fail open with a warning

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::config::ClinicConfig;
pub use error::{ClinicError, ClinicResult};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;
    use tokio::net::TcpListener;
    use tracing_subscriber::EnvFilter;

    /// Serve `router` on an ephemeral local port and return its base URL
    pub async fn spawn_stub(router: Router) -> String {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }
}
