//! Supabase HTTP plumbing
//!
//! Base URL handling and service-key headers shared by the REST store and
//! the functions client.

use std::time::Duration;

use platform::config::ConfigError;
use reqwest::{Method, RequestBuilder, Response, Url};

use crate::error::{ClinicError, ClinicResult};

/// Longest upstream error body kept in an error message
const MAX_ERROR_BODY: usize = 200;

/// Authenticated HTTP access to one Supabase project
#[derive(Clone)]
pub struct SupabaseHttp {
    client: reqwest::Client,
    base_url: Url,
    service_key: String,
}

impl SupabaseHttp {
    pub fn new(
        base_url: &str,
        service_key: impl Into<String>,
        timeout: Duration,
    ) -> ClinicResult<Self> {
        let base_url = parse_base_url(base_url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            service_key: service_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a path below the project URL
    pub fn url(&self, path: &str) -> ClinicResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClinicError::Validation(format!("invalid path {path}: {e}")))
    }

    /// Request carrying the `apikey` and bearer headers
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

impl std::fmt::Debug for SupabaseHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseHttp")
            .field("base_url", &self.base_url.as_str())
            .field("service_key", &"[REDACTED]")
            .finish()
    }
}

fn parse_base_url(raw: &str) -> ClinicResult<Url> {
    let with_slash = format!("{}/", raw.trim().trim_end_matches('/'));
    let url = Url::parse(&with_slash).map_err(|e| {
        ClinicError::Config(ConfigError::Invalid {
            key: "SUPABASE_URL",
            reason: e.to_string(),
        })
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClinicError::Config(ConfigError::Invalid {
            key: "SUPABASE_URL",
            reason: format!("unsupported scheme {}", url.scheme()),
        }));
    }
    Ok(url)
}

/// Pass 2xx responses through; turn anything else into `ClinicError::Upstream`
pub async fn ensure_success(service: &'static str, response: Response) -> ClinicResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(MAX_ERROR_BODY).collect();

    tracing::warn!(service, status = status.as_u16(), "Hosted service returned an error");

    Err(ClinicError::Upstream {
        service,
        status: status.as_u16(),
        message,
    })
}
