//! Breach Detection
//!
//! Checks credentials against Have I Been Pwned:
//! - Email lookup via `GET /api/v3/breachedaccount/{email}`
//! - Password lookup via the k-Anonymity range API: only the first five hex
//!   characters of the SHA-1 digest leave the process
//!
//! ## Failure policy
//! Every failure (transport, timeout, 429, unexpected status, malformed body)
//! fails open: the check reports "nothing found" with
//! [`CheckOrigin::Degraded`] and a warning is logged. A breach-check outage
//! must never block a login.

use std::time::Duration;

use kernel::error::app_error::AppResult;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use thiserror::Error;

use crate::crypto::{email_fingerprint, sha1_hex_upper};

/// HIBP account API host
pub const DEFAULT_EMAIL_API_URL: &str = "https://haveibeenpwned.com";

/// Pwned Passwords range API host
pub const DEFAULT_PASSWORD_API_URL: &str = "https://api.pwnedpasswords.com";

/// Length of the hash prefix sent to the range API
const RANGE_PREFIX_LEN: usize = 5;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct BreachConfig {
    pub email_api_url: String,
    pub password_api_url: String,
    /// Required by HIBP for account lookups
    pub api_key: Option<String>,
    pub user_agent: String,
    /// Per-request timeout; expiry counts as a degraded check
    pub timeout: Duration,
}

impl Default for BreachConfig {
    fn default() -> Self {
        Self {
            email_api_url: DEFAULT_EMAIL_API_URL.to_string(),
            password_api_url: DEFAULT_PASSWORD_API_URL.to_string(),
            api_key: None,
            user_agent: "clinic-backend".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Where a check result came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum CheckOrigin {
    /// The remote API answered
    Verified,
    /// The check failed and the fail-open default was used
    Degraded { reason: String },
}

/// Outcome of one breach check plus where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreachCheck<T> {
    pub outcome: T,
    pub origin: CheckOrigin,
}

impl<T> BreachCheck<T> {
    pub fn verified(outcome: T) -> Self {
        Self {
            outcome,
            origin: CheckOrigin::Verified,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.origin, CheckOrigin::Degraded { .. })
    }
}

impl<T: Default> BreachCheck<T> {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            outcome: T::default(),
            origin: CheckOrigin::Degraded {
                reason: reason.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmailBreach {
    pub compromised: bool,
    pub breach_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PasswordBreach {
    pub breached: bool,
    /// Times the password was seen in breach corpora
    pub count: u64,
}

/// Combined result of [`BreachChecker::perform_breach_check`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreachReport {
    pub email: BreachCheck<EmailBreach>,
    pub password: BreachCheck<PasswordBreach>,
}

impl BreachReport {
    pub fn email_compromised(&self) -> bool {
        self.email.outcome.compromised
    }

    pub fn password_breached(&self) -> bool {
        self.password.outcome.breached
    }

    /// True when either half fell back to the fail-open default
    pub fn is_degraded(&self) -> bool {
        self.email.is_degraded() || self.password.is_degraded()
    }

    pub fn warning(&self) -> Option<String> {
        breach_warning(self)
    }
}

/// Why a remote check failed
#[derive(Debug, Error)]
pub enum BreachCheckError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("rate limited by breach API")]
    RateLimited,

    #[error("unexpected status: {0}")]
    UnexpectedStatus(u16),

    #[error("malformed response: {0}")]
    MalformedBody(String),

    #[error("invalid API URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for BreachCheckError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BreachCheckError::Timeout
        } else if err.is_decode() {
            BreachCheckError::MalformedBody(err.to_string())
        } else {
            BreachCheckError::Transport(err)
        }
    }
}

// ============================================================================
// Checker
// ============================================================================

/// HTTP client for the breach APIs
#[derive(Debug, Clone)]
pub struct BreachChecker {
    client: reqwest::Client,
    config: BreachConfig,
}

impl BreachChecker {
    pub fn new(config: BreachConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BreachConfig {
        &self.config
    }

    /// Look up an email address in the HIBP account API
    ///
    /// 404 means not compromised, 200 means compromised with one entry per
    /// breach. Anything else degrades.
    pub async fn check_email_breach(&self, email: &str) -> BreachCheck<EmailBreach> {
        match self.fetch_email_breaches(email).await {
            Ok(outcome) => BreachCheck::verified(outcome),
            Err(e) => {
                tracing::warn!(
                    email_id = %email_fingerprint(email),
                    error = %e,
                    "Email breach check failed, assuming not compromised"
                );
                BreachCheck::degraded(e.to_string())
            }
        }
    }

    /// Look up a password with the k-Anonymity range API
    pub async fn check_password_breach(&self, password: &str) -> BreachCheck<PasswordBreach> {
        match self.fetch_password_count(password).await {
            Ok(count) => BreachCheck::verified(PasswordBreach {
                breached: count > 0,
                count,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Password breach check failed, assuming not breached");
                BreachCheck::degraded(e.to_string())
            }
        }
    }

    /// Run both checks concurrently
    pub async fn perform_breach_check(&self, email: &str, password: &str) -> BreachReport {
        let (email_check, password_check) = tokio::join!(
            self.check_email_breach(email),
            self.check_password_breach(password)
        );

        let report = BreachReport {
            email: email_check,
            password: password_check,
        };

        tracing::debug!(
            email_id = %email_fingerprint(email),
            email_compromised = report.email_compromised(),
            password_breached = report.password_breached(),
            degraded = report.is_degraded(),
            "Breach check completed"
        );

        report
    }

    async fn fetch_email_breaches(&self, email: &str) -> Result<EmailBreach, BreachCheckError> {
        let mut url = Url::parse(&self.config.email_api_url)
            .map_err(|e| BreachCheckError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| BreachCheckError::InvalidUrl(self.config.email_api_url.clone()))?
            .pop_if_empty()
            .extend(["api", "v3", "breachedaccount", email.trim()]);
        url.query_pairs_mut().append_pair("truncateResponse", "true");

        let mut request = self.client.get(url);
        if let Some(key) = &self.config.api_key {
            request = request.header("hibp-api-key", key);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(EmailBreach::default()),
            StatusCode::OK => {
                let breaches: Vec<serde_json::Value> = response.json().await?;
                Ok(EmailBreach {
                    compromised: true,
                    breach_count: breaches.len(),
                })
            }
            StatusCode::TOO_MANY_REQUESTS => Err(BreachCheckError::RateLimited),
            status => Err(BreachCheckError::UnexpectedStatus(status.as_u16())),
        }
    }

    async fn fetch_password_count(&self, password: &str) -> Result<u64, BreachCheckError> {
        let hash_hex = sha1_hex_upper(password.as_bytes());
        let (prefix, suffix) = hash_hex.split_at(RANGE_PREFIX_LEN);

        let mut url = Url::parse(&self.config.password_api_url)
            .map_err(|e| BreachCheckError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| BreachCheckError::InvalidUrl(self.config.password_api_url.clone()))?
            .pop_if_empty()
            .extend(["range", prefix]);

        let response = self
            .client
            .get(url)
            .header("Add-Padding", "true")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BreachCheckError::RateLimited);
        }
        if status != StatusCode::OK {
            return Err(BreachCheckError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.text().await?;
        parse_range_response(&body, suffix)
    }
}

/// Find `suffix` in a range response body
///
/// Lines have the form `SUFFIX:COUNT`. Padding entries carry a count of zero.
pub fn parse_range_response(body: &str, suffix: &str) -> Result<u64, BreachCheckError> {
    for line in body.lines() {
        let Some((hash_suffix, count)) = line.trim().split_once(':') else {
            continue;
        };
        if hash_suffix.eq_ignore_ascii_case(suffix) {
            return count
                .trim()
                .parse::<u64>()
                .map_err(|_| BreachCheckError::MalformedBody(format!("bad count {:?}", count)));
        }
    }
    Ok(0)
}

/// User-facing warning text for a report, `None` when nothing was found
pub fn breach_warning(report: &BreachReport) -> Option<String> {
    match (report.email_compromised(), report.password_breached()) {
        (true, true) => Some(
            "Your email address and your password have both appeared in known data breaches. \
             Please change your password now and do not reuse it on other sites."
                .to_string(),
        ),
        (true, false) => {
            let count = report.email.outcome.breach_count;
            let noun = if count == 1 { "breach" } else { "breaches" };
            Some(format!(
                "Your email address appeared in {} known data {}. \
                 Consider changing your password.",
                count, noun
            ))
        }
        (false, true) => Some(format!(
            "This password has appeared {} times in known data breaches. \
             Please choose a different password.",
            report.password.outcome.count
        )),
        (false, false) => None,
    }
}
