//! Login Rate Limiting
//!
//! Sliding-window failure counting with a time-boxed lockout, keyed by
//! case-folded email address.
//!
//! ## Behaviour
//! - Failed attempts inside the trailing window are counted; once the count
//!   reaches `max_attempts` the next check establishes a lockout
//! - Checking during an active lockout never extends it
//! - A successful login clears every attempt and the lockout for that email
//! - Attempts older than the window are ignored when counting and pruned only
//!   when a new attempt is recorded for the same email
//!
//! State lives behind the [`AttemptStore`] seam. [`InMemoryAttemptStore`] is
//! the process-local default; multi-instance deployments plug in a shared
//! backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::email_fingerprint;

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Failed attempts allowed inside the window
    pub max_attempts: u32,
    /// Trailing window failures are counted in
    pub window: Duration,
    /// How long a triggered lockout lasts
    pub lockout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(15 * 60),
            lockout: Duration::from_secs(30 * 60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_attempts: u32, window_secs: u64, lockout_secs: u64) -> Self {
        Self {
            max_attempts,
            window: Duration::from_secs(window_secs),
            lockout: Duration::from_secs(lockout_secs),
        }
    }

    pub fn window_ms(&self) -> i64 {
        duration_ms(self.window)
    }

    pub fn lockout_ms(&self) -> i64 {
        duration_ms(self.lockout)
    }

    pub fn rule(&self) -> LockoutRule {
        LockoutRule {
            max_attempts: self.max_attempts,
            window_ms: self.window_ms(),
            lockout_ms: self.lockout_ms(),
        }
    }
}

/// Milliseconds of `d`, saturating at `i64::MAX`
fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Thresholds a store applies in [`LocalAttemptStore::check_and_lock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutRule {
    pub max_attempts: u32,
    pub window_ms: i64,
    pub lockout_ms: i64,
}

impl LockoutRule {
    /// Failed attempts strictly inside the window ending at `now_ms`
    pub fn failed_in_window(&self, attempts: &[LoginAttempt], now_ms: i64) -> u32 {
        let failed = attempts
            .iter()
            .filter(|a| a.failed && now_ms.saturating_sub(a.timestamp_ms) < self.window_ms)
            .count();
        u32::try_from(failed).unwrap_or(u32::MAX)
    }

    pub fn lockout_expiry(&self, now_ms: i64) -> i64 {
        now_ms.saturating_add(self.lockout_ms)
    }
}

/// Outcome of one lockout evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCheck {
    /// No lockout; an expired one has been removed
    Open,
    /// A lockout registered earlier is still running
    Active { expires_at_ms: i64 },
    /// This evaluation registered a new lockout
    Triggered { expires_at_ms: i64, failed: u32 },
}

/// A single recorded login attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    /// Normalized email
    pub email: String,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    pub failed: bool,
}

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub limited: bool,
    /// Whole seconds until the lockout ends, `0` when not limited
    pub retry_after_secs: u64,
}

impl RateLimitStatus {
    pub const fn allowed() -> Self {
        Self {
            limited: false,
            retry_after_secs: 0,
        }
    }

    pub const fn locked(retry_after_secs: u64) -> Self {
        Self {
            limited: true,
            retry_after_secs,
        }
    }
}

/// Attempt store errors
///
/// The in-memory store never produces these.
#[derive(Debug, Error)]
pub enum AttemptStoreError {
    #[error("Attempt store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed attempt record: {0}")]
    Malformed(String),
}

/// Trait for attempt storage backends
///
/// Keys are already normalized by the caller.
#[trait_variant::make(AttemptStore: Send)]
pub trait LocalAttemptStore {
    /// All stored attempts for a key, oldest first
    async fn attempts(&self, key: &str) -> Result<Vec<LoginAttempt>, AttemptStoreError>;

    /// Drop attempts at or before `prune_before_ms`, then append `attempt`
    async fn record(
        &self,
        key: &str,
        attempt: LoginAttempt,
        prune_before_ms: i64,
    ) -> Result<(), AttemptStoreError>;

    /// Lockout expiry in epoch milliseconds, if one is registered
    async fn lockout_expiry(&self, key: &str) -> Result<Option<i64>, AttemptStoreError>;

    /// Read the lockout and failure count and register a lockout as one step
    ///
    /// An active lockout is returned untouched, an expired one is removed.
    /// Otherwise `rule.max_attempts` failures inside the window register a
    /// lockout ending at `rule.lockout_expiry(now_ms)`. A concurrent
    /// [`reset`](LocalAttemptStore::reset) must never be followed by a
    /// lockout computed from the attempts it deleted.
    async fn check_and_lock(
        &self,
        key: &str,
        now_ms: i64,
        rule: LockoutRule,
    ) -> Result<LockCheck, AttemptStoreError>;

    /// Delete attempts and lockout for one key
    async fn reset(&self, key: &str) -> Result<(), AttemptStoreError>;

    /// Delete everything
    async fn reset_all(&self) -> Result<(), AttemptStoreError>;
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
struct AttemptState {
    attempts: HashMap<String, Vec<LoginAttempt>>,
    lockouts: HashMap<String, i64>,
}

/// Process-local attempt store
///
/// Both maps sit behind one mutex. `check_and_lock` evaluates and writes
/// under a single guard.
#[derive(Debug, Default)]
pub struct InMemoryAttemptStore {
    state: Mutex<AttemptState>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, AttemptState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Attempt store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl AttemptStore for InMemoryAttemptStore {
    async fn attempts(&self, key: &str) -> Result<Vec<LoginAttempt>, AttemptStoreError> {
        Ok(self.state().attempts.get(key).cloned().unwrap_or_default())
    }

    async fn record(
        &self,
        key: &str,
        attempt: LoginAttempt,
        prune_before_ms: i64,
    ) -> Result<(), AttemptStoreError> {
        let mut state = self.state();
        let entry = state.attempts.entry(key.to_string()).or_default();
        entry.retain(|a| a.timestamp_ms > prune_before_ms);
        entry.push(attempt);
        Ok(())
    }

    async fn lockout_expiry(&self, key: &str) -> Result<Option<i64>, AttemptStoreError> {
        Ok(self.state().lockouts.get(key).copied())
    }

    async fn check_and_lock(
        &self,
        key: &str,
        now_ms: i64,
        rule: LockoutRule,
    ) -> Result<LockCheck, AttemptStoreError> {
        let mut state = self.state();

        if let Some(&expires_at_ms) = state.lockouts.get(key) {
            if now_ms < expires_at_ms {
                return Ok(LockCheck::Active { expires_at_ms });
            }
            state.lockouts.remove(key);
        }

        let failed = state
            .attempts
            .get(key)
            .map(|attempts| rule.failed_in_window(attempts, now_ms))
            .unwrap_or(0);
        if failed < rule.max_attempts {
            return Ok(LockCheck::Open);
        }

        let expires_at_ms = rule.lockout_expiry(now_ms);
        state.lockouts.insert(key.to_string(), expires_at_ms);
        Ok(LockCheck::Triggered {
            expires_at_ms,
            failed,
        })
    }

    async fn reset(&self, key: &str) -> Result<(), AttemptStoreError> {
        let mut state = self.state();
        state.attempts.remove(key);
        state.lockouts.remove(key);
        Ok(())
    }

    async fn reset_all(&self) -> Result<(), AttemptStoreError> {
        let mut state = self.state();
        state.attempts.clear();
        state.lockouts.clear();
        Ok(())
    }
}

// ============================================================================
// Limiter
// ============================================================================

/// Case-fold an email into a rate limit key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn ceil_secs(ms: i64) -> u64 {
    (ms.max(0) as u64).div_ceil(1000)
}

/// Login rate limiter over an [`AttemptStore`]
///
/// Every operation has an `*_at` form taking the current time in epoch
/// milliseconds; the plain form reads the system clock.
///
/// ## Examples
/// ```rust,ignore
/// let limiter = LoginRateLimiter::in_memory(RateLimitConfig::default());
///
/// let status = limiter.is_rate_limited("user@example.com").await?;
/// if status.limited {
///     // reject with Retry-After: status.retry_after_secs
/// }
/// limiter.record_login_attempt("user@example.com", false).await?;
/// ```
pub struct LoginRateLimiter<S: AttemptStore> {
    store: Arc<S>,
    config: RateLimitConfig,
}

impl<S: AttemptStore> Clone for LoginRateLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl LoginRateLimiter<InMemoryAttemptStore> {
    /// Limiter with a fresh, empty process-local store
    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(Arc::new(InMemoryAttemptStore::new()), config)
    }
}

impl<S: AttemptStore> LoginRateLimiter<S> {
    pub fn new(store: Arc<S>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn is_rate_limited(&self, email: &str) -> Result<RateLimitStatus, AttemptStoreError> {
        self.is_rate_limited_at(email, now_ms()).await
    }

    /// Check whether `email` may attempt a login at `now_ms`
    ///
    /// An active lockout answers first. An expired one is removed here.
    /// Otherwise reaching `max_attempts` failures in the window starts a new
    /// lockout. The store performs the whole evaluation as one step.
    pub async fn is_rate_limited_at(
        &self,
        email: &str,
        now_ms: i64,
    ) -> Result<RateLimitStatus, AttemptStoreError> {
        let key = normalize_email(email);

        match self.store.check_and_lock(&key, now_ms, self.config.rule()).await? {
            LockCheck::Open => Ok(RateLimitStatus::allowed()),
            LockCheck::Active { expires_at_ms } => Ok(RateLimitStatus::locked(ceil_secs(
                expires_at_ms.saturating_sub(now_ms),
            ))),
            LockCheck::Triggered {
                expires_at_ms,
                failed,
            } => {
                let retry_after_secs = ceil_secs(expires_at_ms.saturating_sub(now_ms));
                tracing::warn!(
                    email_id = %email_fingerprint(&key),
                    failed_attempts = failed,
                    retry_after_secs,
                    "Login lockout triggered"
                );
                Ok(RateLimitStatus::locked(retry_after_secs))
            }
        }
    }

    pub async fn record_login_attempt(
        &self,
        email: &str,
        success: bool,
    ) -> Result<(), AttemptStoreError> {
        self.record_login_attempt_at(email, success, now_ms()).await
    }

    /// Record an attempt; a success wipes all state for the email
    pub async fn record_login_attempt_at(
        &self,
        email: &str,
        success: bool,
        now_ms: i64,
    ) -> Result<(), AttemptStoreError> {
        let key = normalize_email(email);
        let attempt = LoginAttempt {
            email: key.clone(),
            timestamp_ms: now_ms,
            failed: !success,
        };

        self.store
            .record(&key, attempt, now_ms.saturating_sub(self.config.window_ms()))
            .await?;

        if success {
            self.store.reset(&key).await?;
            tracing::debug!(email_id = %email_fingerprint(&key), "Login succeeded, attempts cleared");
        } else {
            tracing::debug!(email_id = %email_fingerprint(&key), "Failed login recorded");
        }

        Ok(())
    }

    pub async fn remaining_attempts(&self, email: &str) -> Result<u32, AttemptStoreError> {
        self.remaining_attempts_at(email, now_ms()).await
    }

    /// `max_attempts` minus failures in the window, never below zero
    pub async fn remaining_attempts_at(
        &self,
        email: &str,
        now_ms: i64,
    ) -> Result<u32, AttemptStoreError> {
        let key = normalize_email(email);
        let failed = self.failed_in_window(&key, now_ms).await?;
        Ok(self.config.max_attempts.saturating_sub(failed))
    }

    pub async fn reset_login_attempts(&self, email: &str) -> Result<(), AttemptStoreError> {
        let key = normalize_email(email);
        self.store.reset(&key).await?;
        tracing::info!(email_id = %email_fingerprint(&key), "Login attempts reset");
        Ok(())
    }

    pub async fn clear_all_rate_limits(&self) -> Result<(), AttemptStoreError> {
        self.store.reset_all().await?;
        tracing::info!("All login rate limits cleared");
        Ok(())
    }

    async fn failed_in_window(&self, key: &str, now_ms: i64) -> Result<u32, AttemptStoreError> {
        let attempts = self.store.attempts(key).await?;
        Ok(self.config.rule().failed_in_window(&attempts, now_ms))
    }
}
