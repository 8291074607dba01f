//! Application Configuration
//!
//! Supabase project settings layered over the platform configuration.

use std::time::Duration;

use platform::config::{ConfigError, PlatformConfig, parse_var, require_var};

/// Clinic application configuration
#[derive(Debug, Clone)]
pub struct ClinicConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub supabase_url: String,
    /// Service-role key; bypasses row level security
    pub supabase_service_key: String,
    /// Timeout for REST, function and logo requests
    pub http_timeout: Duration,
    pub platform: PlatformConfig,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://127.0.0.1:54321".to_string(),
            supabase_service_key: String::new(),
            http_timeout: Duration::from_secs(10),
            platform: PlatformConfig::default(),
        }
    }
}

impl ClinicConfig {
    /// Create config for development (local Supabase, random field key)
    pub fn development() -> Self {
        Self {
            supabase_service_key: "local-service-key".to_string(),
            platform: PlatformConfig::development(),
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
        let supabase_url = require_var(&lookup, "SUPABASE_URL")?;
        let supabase_service_key = require_var(&lookup, "SUPABASE_SERVICE_KEY")?;
        let http_timeout = parse_var(&lookup, "HTTP_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(Self::default().http_timeout);
        let platform = PlatformConfig::from_lookup(&lookup)?;

        Ok(Self {
            supabase_url,
            supabase_service_key,
            http_timeout,
            platform,
        })
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.platform.pepper()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup() {
        let config = ClinicConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_SERVICE_KEY", "service-key"),
            ("HTTP_TIMEOUT_SECS", "3"),
            ("RATE_LIMIT_MAX_ATTEMPTS", "4"),
            ("PASSWORD_PEPPER", "pepper"),
        ]))
        .unwrap();

        assert_eq!(config.supabase_url, "https://abc.supabase.co");
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert_eq!(config.platform.rate_limit.max_attempts, 4);
        assert_eq!(config.pepper(), Some(&b"pepper"[..]));
    }

    #[test]
    fn test_missing_supabase_settings() {
        let err = ClinicConfig::from_lookup(lookup(&[("SUPABASE_URL", "https://abc.supabase.co")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                key: "SUPABASE_SERVICE_KEY"
            }
        ));
    }

    #[test]
    fn test_development() {
        let config = ClinicConfig::development();
        assert!(config.platform.field_key.is_some());
        assert!(!config.supabase_service_key.is_empty());
    }
}
