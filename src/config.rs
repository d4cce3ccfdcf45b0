//! Configuration for the verification service.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::verify::decision::Thresholds;

/// Service configuration.
///
/// All values have working defaults except `api_key`, which must be set for
/// external callers to authenticate. Captured once at start and treated as
/// immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Base URL of the Horizon-style ledger API.
    #[serde(default = "default_ledger_base")]
    pub ledger_base: String,

    /// API key external callers must present in `x-api-key`.
    #[serde(default)]
    pub api_key: String,

    /// Optional platform anonymous key accepted from internal callers.
    #[serde(default)]
    pub internal_trust_key: Option<String>,

    /// Default minimum total transaction count.
    #[serde(default = "default_min_transactions")]
    pub min_transactions: u64,

    /// Default minimum credited (incoming) transaction count.
    #[serde(default = "default_min_credited_transactions")]
    pub min_credited_transactions: u64,

    /// Default minimum distinct counterparty count.
    #[serde(default = "default_min_unique_wallets")]
    pub min_unique_wallets: u64,

    /// Verification cache TTL in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum verification requests per wallet per window.
    #[serde(default = "default_rate_max")]
    pub rate_max: u32,

    /// Rate-limit window in seconds.
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,

    /// Maximum entries accepted by the batch endpoint.
    #[serde(default = "default_batch_max")]
    pub batch_max: usize,

    /// Concurrent workers inside the batch fan-out.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// Per-page ledger request timeout in seconds.
    #[serde(default = "default_ledger_timeout_secs")]
    pub ledger_timeout_secs: u64,

    /// Per-attempt webhook timeout in seconds.
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    /// Maximum webhook delivery attempts.
    #[serde(default = "default_webhook_attempts")]
    pub webhook_attempts: u32,

    /// Delays in seconds applied before each webhook attempt.
    #[serde(default = "default_webhook_backoff_secs")]
    pub webhook_backoff_secs: Vec<u64>,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            ledger_base: default_ledger_base(),
            api_key: String::new(),
            internal_trust_key: None,
            min_transactions: default_min_transactions(),
            min_credited_transactions: default_min_credited_transactions(),
            min_unique_wallets: default_min_unique_wallets(),
            cache_ttl_secs: default_cache_ttl_secs(),
            rate_max: default_rate_max(),
            rate_window_secs: default_rate_window_secs(),
            batch_max: default_batch_max(),
            batch_concurrency: default_batch_concurrency(),
            ledger_timeout_secs: default_ledger_timeout_secs(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
            webhook_attempts: default_webhook_attempts(),
            webhook_backoff_secs: default_webhook_backoff_secs(),
            log_level: default_log_level(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8787))
}

fn default_ledger_base() -> String {
    "https://api.mainnet.minepi.com".to_string()
}

const fn default_min_transactions() -> u64 {
    100
}

const fn default_min_credited_transactions() -> u64 {
    50
}

const fn default_min_unique_wallets() -> u64 {
    10
}

const fn default_cache_ttl_secs() -> u64 {
    3600
}

const fn default_rate_max() -> u32 {
    5
}

const fn default_rate_window_secs() -> u64 {
    3600
}

const fn default_batch_max() -> usize {
    10
}

const fn default_batch_concurrency() -> usize {
    3
}

const fn default_ledger_timeout_secs() -> u64 {
    30
}

const fn default_webhook_timeout_secs() -> u64 {
    10
}

const fn default_webhook_attempts() -> u32 {
    3
}

fn default_webhook_backoff_secs() -> Vec<u64> {
    vec![0, 1, 5]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default decision thresholds from configuration.
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_total: self.min_transactions,
            min_credited: self.min_credited_transactions,
            min_unique: self.min_unique_wallets,
        }
    }

    /// Verification cache TTL.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Rate-limit window.
    #[must_use]
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    /// Per-page ledger request timeout.
    #[must_use]
    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger_timeout_secs)
    }

    /// Per-attempt webhook timeout.
    #[must_use]
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    /// Webhook backoff schedule as durations.
    #[must_use]
    pub fn webhook_backoff(&self) -> Vec<Duration> {
        self.webhook_backoff_secs
            .iter()
            .map(|s| Duration::from_secs(*s))
            .collect()
    }
}
