//! Platform Configuration
//!
//! Environment-driven settings for the rate limiter, breach checker,
//! field encryption and password hashing.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::breach::{BreachConfig, DEFAULT_EMAIL_API_URL, DEFAULT_PASSWORD_API_URL};
use crate::field_crypto::{FieldCryptoError, FieldKey};
use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be set")]
    Missing { key: &'static str },

    #[error("{key} has an invalid value: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("GDPR_ENCRYPTION_KEY is invalid: {0}")]
    EncryptionKey(#[from] FieldCryptoError),
}

/// Platform configuration
#[derive(Debug, Clone, Default)]
pub struct PlatformConfig {
    pub rate_limit: RateLimitConfig,
    pub breach: BreachConfig,
    /// Key for in-process field encryption; `None` means the remote
    /// encryption function is used instead
    pub field_key: Option<FieldKey>,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
}

impl PlatformConfig {
    /// Create config for development (random field key)
    pub fn development() -> Self {
        Self {
            field_key: Some(FieldKey::generate()),
            ..Default::default()
        }
    }

    /// Load from the process environment (after reading `.env` if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_attempts: parse_var(&lookup, "RATE_LIMIT_MAX_ATTEMPTS")?
                .unwrap_or(defaults.max_attempts),
            window: parse_var(&lookup, "RATE_LIMIT_WINDOW_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.window),
            lockout: parse_var(&lookup, "RATE_LIMIT_LOCKOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.lockout),
        };
        if rate_limit.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }

        let breach_defaults = BreachConfig::default();
        let breach = BreachConfig {
            email_api_url: non_empty(&lookup, "HIBP_API_URL")
                .unwrap_or_else(|| DEFAULT_EMAIL_API_URL.to_string()),
            password_api_url: non_empty(&lookup, "PWNED_PASSWORDS_URL")
                .unwrap_or_else(|| DEFAULT_PASSWORD_API_URL.to_string()),
            api_key: non_empty(&lookup, "HIBP_API_KEY"),
            timeout: parse_var(&lookup, "BREACH_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(breach_defaults.timeout),
            ..breach_defaults
        };

        let field_key = non_empty(&lookup, "GDPR_ENCRYPTION_KEY")
            .map(|encoded| FieldKey::from_base64(&encoded))
            .transpose()?;

        let password_pepper = non_empty(&lookup, "PASSWORD_PEPPER").map(String::into_bytes);

        Ok(Self {
            rate_limit,
            breach,
            field_key,
            password_pepper,
        })
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }
}

/// Read a variable, treating blank values as unset
pub fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional variable
pub fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty(lookup, key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Read a variable that must be present
pub fn require_var<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key).ok_or(ConfigError::Missing { key })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::crypto::to_base64;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = PlatformConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert_eq!(config.breach.email_api_url, DEFAULT_EMAIL_API_URL);
        assert_eq!(config.breach.timeout, Duration::from_secs(5));
        assert!(config.field_key.is_none());
        assert!(config.pepper().is_none());
    }

    #[test]
    fn test_overrides() {
        let key = to_base64(&[3u8; 32]);
        let config = PlatformConfig::from_lookup(lookup(&[
            ("RATE_LIMIT_MAX_ATTEMPTS", "3"),
            ("RATE_LIMIT_WINDOW_SECS", "60"),
            ("RATE_LIMIT_LOCKOUT_SECS", "120"),
            ("HIBP_API_KEY", "hibp-key"),
            ("PWNED_PASSWORDS_URL", "http://127.0.0.1:9000"),
            ("BREACH_TIMEOUT_SECS", "2"),
            ("GDPR_ENCRYPTION_KEY", key.as_str()),
            ("PASSWORD_PEPPER", "pepper"),
        ]))
        .unwrap();

        assert_eq!(config.rate_limit, RateLimitConfig::new(3, 60, 120));
        assert_eq!(config.breach.api_key.as_deref(), Some("hibp-key"));
        assert_eq!(config.breach.password_api_url, "http://127.0.0.1:9000");
        assert_eq!(config.breach.timeout, Duration::from_secs(2));
        assert!(config.field_key.is_some());
        assert_eq!(config.pepper(), Some(&b"pepper"[..]));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config =
            PlatformConfig::from_lookup(lookup(&[("HIBP_API_KEY", "  "), ("GDPR_ENCRYPTION_KEY", "")]))
                .unwrap();
        assert!(config.breach.api_key.is_none());
        assert!(config.field_key.is_none());
    }

    #[test]
    fn test_invalid_number() {
        let err = PlatformConfig::from_lookup(lookup(&[("RATE_LIMIT_WINDOW_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "RATE_LIMIT_WINDOW_SECS",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = PlatformConfig::from_lookup(lookup(&[("RATE_LIMIT_MAX_ATTEMPTS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_short_encryption_key_rejected() {
        let key = to_base64(&[3u8; 16]);
        let err = PlatformConfig::from_lookup(lookup(&[("GDPR_ENCRYPTION_KEY", key.as_str())])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EncryptionKey(FieldCryptoError::InvalidKeyLength(16))
        ));
    }

    #[test]
    fn test_require_var() {
        let source = lookup(&[("SUPABASE_URL", "https://x.supabase.co")]);
        assert_eq!(
            require_var(&source, "SUPABASE_URL").unwrap(),
            "https://x.supabase.co"
        );
        assert!(matches!(
            require_var(&source, "SUPABASE_SERVICE_KEY"),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn test_development_has_key() {
        assert!(PlatformConfig::development().field_key.is_some());
    }
}
