//! Client configuration.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable names, all optional.
pub const DEFAULT_CONFIRMATIONS_ENV: &str = "CLOAK_DEFAULT_CONFIRMATIONS";
pub const CONFIRMATION_TIMEOUT_SECS_ENV: &str = "CLOAK_CONFIRMATION_TIMEOUT_SECS";
pub const DECRYPTION_TIMEOUT_SECS_ENV: &str = "CLOAK_DECRYPTION_TIMEOUT_SECS";
pub const MAX_BATCH_FALLBACK_ENV: &str = "CLOAK_MAX_BATCH_FALLBACK";

/// Orchestration-layer configuration.
///
/// Confirmation-wait and decryption round trips are bounded by explicit
/// timeouts; expiry surfaces as `ConfirmationTimeout` / `DecryptionFailure`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Confirmations to wait for when the caller does not specify a count.
    pub default_confirmations: usize,
    /// Upper bound on one confirmation wait.
    pub confirmation_timeout: Duration,
    /// Upper bound on one decryption provider round trip.
    pub decryption_timeout: Duration,
    /// Batch-size ceiling used when the target contract's limit is unreadable.
    pub max_batch_fallback: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_confirmations: 1,
            confirmation_timeout: Duration::from_secs(180),
            decryption_timeout: Duration::from_secs(60),
            max_batch_fallback: 50,
        }
    }
}

impl ClientConfig {
    /// Load configuration from `CLOAK_*` environment variables. Missing or
    /// malformed values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let default_confirmations = env::var(DEFAULT_CONFIRMATIONS_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.default_confirmations);

        let confirmation_timeout = env::var(CONFIRMATION_TIMEOUT_SECS_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.confirmation_timeout);

        let decryption_timeout = env::var(DECRYPTION_TIMEOUT_SECS_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.decryption_timeout);

        let max_batch_fallback = env::var(MAX_BATCH_FALLBACK_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_batch_fallback);

        Self {
            default_confirmations,
            confirmation_timeout,
            decryption_timeout,
            max_batch_fallback,
        }
    }
}
