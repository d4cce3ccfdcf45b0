//! Command-line interface definition.

use clap::Parser;
use pi_business_verifier::ServiceConfig;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Business verification service for the Pi Network ledger.
#[derive(Parser, Debug)]
#[command(name = "pi-business-verifier")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "BIND_ADDR")]
    pub bind_addr: Option<SocketAddr>,

    /// Base URL of the Horizon-style ledger API.
    #[arg(long, env = "LEDGER_BASE")]
    pub ledger_base: Option<String>,

    /// API key external callers must present.
    #[arg(long, env = "API_KEY")]
    pub api_key: Option<String>,

    /// Platform anonymous key accepted from internal callers.
    #[arg(long, env = "INTERNAL_TRUST_KEY")]
    pub internal_trust_key: Option<String>,

    /// Minimum total transaction count.
    #[arg(long, env = "MIN_TRANSACTIONS")]
    pub min_transactions: Option<u64>,

    /// Minimum credited transaction count.
    #[arg(long, env = "MIN_CREDITED_TRANSACTIONS")]
    pub min_credited_transactions: Option<u64>,

    /// Minimum distinct counterparty count.
    #[arg(long, env = "MIN_UNIQUE_WALLETS")]
    pub min_unique_wallets: Option<u64>,

    /// Verification cache TTL in seconds.
    #[arg(long, env = "CACHE_TTL")]
    pub cache_ttl: Option<u64>,

    /// Maximum verification requests per wallet per window.
    #[arg(long, env = "RATE_MAX")]
    pub rate_max: Option<u32>,

    /// Rate-limit window in seconds.
    #[arg(long, env = "RATE_WINDOW")]
    pub rate_window: Option<u64>,

    /// Maximum entries accepted by the batch endpoint.
    #[arg(long, env = "BATCH_MAX")]
    pub batch_max: Option<usize>,

    /// Concurrent workers inside the batch fan-out.
    #[arg(long, env = "BATCH_CONCURRENCY")]
    pub batch_concurrency: Option<usize>,

    /// Per-page ledger request timeout in seconds.
    #[arg(long, env = "LEDGER_TIMEOUT")]
    pub ledger_timeout: Option<u64>,

    /// Per-attempt webhook timeout in seconds.
    #[arg(long, env = "WEBHOOK_TIMEOUT")]
    pub webhook_timeout: Option<u64>,

    /// Maximum webhook delivery attempts.
    #[arg(long, env = "WEBHOOK_ATTEMPTS")]
    pub webhook_attempts: Option<u32>,

    /// Delays in seconds before each webhook attempt, comma-separated.
    #[arg(long, env = "WEBHOOK_BACKOFF", value_delimiter = ',')]
    pub webhook_backoff: Option<Vec<u64>>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Convert CLI arguments into a ServiceConfig.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<ServiceConfig> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            ServiceConfig::from_file(path)?
        } else {
            ServiceConfig::default()
        };

        // Override with CLI arguments
        if let Some(bind_addr) = self.bind_addr {
            config.bind_addr = bind_addr;
        }
        if let Some(ledger_base) = self.ledger_base {
            config.ledger_base = ledger_base;
        }
        if let Some(api_key) = self.api_key {
            config.api_key = api_key;
        }
        if self.internal_trust_key.is_some() {
            config.internal_trust_key = self.internal_trust_key;
        }
        if let Some(min_transactions) = self.min_transactions {
            config.min_transactions = min_transactions;
        }
        if let Some(min_credited) = self.min_credited_transactions {
            config.min_credited_transactions = min_credited;
        }
        if let Some(min_unique) = self.min_unique_wallets {
            config.min_unique_wallets = min_unique;
        }
        if let Some(cache_ttl) = self.cache_ttl {
            config.cache_ttl_secs = cache_ttl;
        }
        if let Some(rate_max) = self.rate_max {
            config.rate_max = rate_max;
        }
        if let Some(rate_window) = self.rate_window {
            config.rate_window_secs = rate_window;
        }
        if let Some(batch_max) = self.batch_max {
            config.batch_max = batch_max;
        }
        if let Some(batch_concurrency) = self.batch_concurrency {
            config.batch_concurrency = batch_concurrency;
        }
        if let Some(ledger_timeout) = self.ledger_timeout {
            config.ledger_timeout_secs = ledger_timeout;
        }
        if let Some(webhook_timeout) = self.webhook_timeout {
            config.webhook_timeout_secs = webhook_timeout;
        }
        if let Some(webhook_attempts) = self.webhook_attempts {
            config.webhook_attempts = webhook_attempts;
        }
        if let Some(webhook_backoff) = self.webhook_backoff {
            if !webhook_backoff.is_empty() {
                config.webhook_backoff_secs = webhook_backoff;
            }
        }
        config.log_level = self.log_level;

        Ok(config)
    }
}
