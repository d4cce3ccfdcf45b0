//! Read-through verification cache with TTL freshness.
//!
//! The persisted record doubles as the cache entry; `updated_at` is the
//! cache timestamp. A lookup is a hit when a record exists and is younger
//! than the TTL.

use crate::error::Result;
use crate::store::{VerificationRecord, VerificationStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (absent or stale records).
    pub misses: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// A fresh cached verification.
#[derive(Debug, Clone)]
pub struct CacheHit {
    /// The cached record.
    pub record: VerificationRecord,
    /// When the entry goes stale (`updated_at + TTL`).
    pub expires_at: DateTime<Utc>,
}

/// Read-through cache over the persisted verification records.
#[derive(Clone)]
pub struct VerificationCache {
    store: Arc<dyn VerificationStore>,
    ttl: ChronoDuration,
    stats: Arc<Mutex<CacheStats>>,
}

impl VerificationCache {
    /// Create a cache over the given store.
    ///
    /// TTLs beyond the representable range fall back to one hour.
    #[must_use]
    pub fn new(store: Arc<dyn VerificationStore>, ttl: Duration) -> Self {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::hours(1));
        Self {
            store,
            ttl,
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    /// Look up a fresh verification for the wallet.
    ///
    /// Returns `None` when no record exists or the stored record is older
    /// than the TTL. The cache is keyed by wallet only: a hit returns the
    /// stored decision even when the caller supplied different thresholds.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookup fails.
    pub async fn lookup(&self, wallet: &str) -> Result<Option<CacheHit>> {
        let record = self.store.verification_by_wallet(wallet).await?;

        let hit = record.and_then(|record| {
            let expires_at = record.updated_at + self.ttl;
            if Utc::now() < expires_at {
                Some(CacheHit { record, expires_at })
            } else {
                None
            }
        });

        let mut stats = self.stats.lock();
        if hit.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        drop(stats);

        if hit.is_some() {
            debug!(wallet = %wallet, "verification cache hit");
        } else {
            debug!(wallet = %wallet, "verification cache miss");
        }
        Ok(hit)
    }

    /// Expiry time a record written now would get.
    #[must_use]
    pub fn expires_from(&self, updated_at: DateTime<Utc>) -> DateTime<Utc> {
        updated_at + self.ttl
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }
}
