//! In-process store backed by mutex-guarded maps.
//!
//! Used by the standalone binary and by tests. Each operation takes the
//! single inner lock, so check-and-increment sequences are atomic against
//! concurrent callers, matching the transactional guarantees the core
//! expects from the relational implementation.

use crate::error::{Error, Result};
use crate::store::{
    Allowance, DeliveryUpdate, NewVerification, RateDecision, VerificationRecord,
    VerificationStore, WebhookDeliveryEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Per-wallet sliding-window rate bucket.
#[derive(Debug, Clone, Copy)]
struct RateBucket {
    count: u32,
    window_start: DateTime<Utc>,
}

/// Subscription allowance row.
#[derive(Debug, Clone)]
struct AllowanceRow {
    /// Verification quota for the period, `None` for unmetered tiers.
    limit: Option<u32>,
    used: u32,
    tier: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Default for AllowanceRow {
    fn default() -> Self {
        Self {
            limit: None,
            used: 0,
            tier: "free".to_string(),
            expires_at: None,
        }
    }
}

#[derive(Default)]
struct Inner {
    verifications: HashMap<String, VerificationRecord>,
    rate_buckets: HashMap<String, RateBucket>,
    allowances: HashMap<String, AllowanceRow>,
    deliveries: HashMap<Uuid, WebhookDeliveryEntry>,
}

/// In-memory [`VerificationStore`] implementation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a metered allowance for a user. Users without a row are unmetered.
    pub fn set_allowance(&self, external_user_id: &str, limit: u32, tier: &str) {
        let mut inner = self.inner.lock();
        inner.allowances.insert(
            external_user_id.to_string(),
            AllowanceRow {
                limit: Some(limit),
                used: 0,
                tier: tier.to_string(),
                expires_at: None,
            },
        );
    }

    /// Verifications recorded against a user's allowance.
    #[must_use]
    pub fn usage(&self, external_user_id: &str) -> u32 {
        self.inner
            .lock()
            .allowances
            .get(external_user_id)
            .map_or(0, |row| row.used)
    }

    /// Fetch a delivery-log row.
    #[must_use]
    pub fn delivery(&self, delivery_id: Uuid) -> Option<WebhookDeliveryEntry> {
        self.inner.lock().deliveries.get(&delivery_id).cloned()
    }

    /// All delivery-log rows, in no particular order.
    #[must_use]
    pub fn deliveries(&self) -> Vec<WebhookDeliveryEntry> {
        self.inner.lock().deliveries.values().cloned().collect()
    }

    /// Rewrite a stored record's `updated_at`, for cache-expiry tests.
    pub fn backdate_verification(&self, wallet: &str, updated_at: DateTime<Utc>) {
        if let Some(record) = self.inner.lock().verifications.get_mut(wallet) {
            record.updated_at = updated_at;
        }
    }
}

#[async_trait]
impl VerificationStore for MemoryStore {
    async fn upsert_verification(&self, new: NewVerification) -> Result<VerificationRecord> {
        let mut inner = self.inner.lock();
        let now = Utc::now();

        // On conflict the opaque id survives; every mutable field is replaced.
        let id = inner
            .verifications
            .get(&new.wallet_address)
            .map_or_else(Uuid::new_v4, |existing| existing.id);

        let record = VerificationRecord {
            id,
            wallet_address: new.wallet_address.clone(),
            business_name: new.business_name,
            external_user_id: new.external_user_id,
            total_transactions: new.counters.total,
            credited_transactions: new.counters.credited,
            unique_wallets: new.counters.unique_counterparties,
            status: new.decision.status,
            failure_reason: new.decision.failure_reason,
            updated_at: now,
        };

        inner
            .verifications
            .insert(new.wallet_address, record.clone());
        Ok(record)
    }

    async fn verification_by_wallet(&self, wallet: &str) -> Result<Option<VerificationRecord>> {
        Ok(self.inner.lock().verifications.get(wallet).cloned())
    }

    async fn rate_limit(&self, wallet: &str, max: u32, window: Duration) -> Result<RateDecision> {
        let window = ChronoDuration::from_std(window)
            .map_err(|e| Error::Persistence(format!("invalid rate window: {e}")))?;
        let now = Utc::now();
        let mut inner = self.inner.lock();

        let bucket = inner
            .rate_buckets
            .entry(wallet.to_string())
            .or_insert(RateBucket {
                count: 0,
                window_start: now,
            });

        if now - bucket.window_start >= window {
            bucket.count = 1;
            bucket.window_start = now;
            return Ok(RateDecision {
                allowed: true,
                count: 1,
                reset_at: now + window,
            });
        }

        if bucket.count >= max {
            return Ok(RateDecision {
                allowed: false,
                count: bucket.count,
                reset_at: bucket.window_start + window,
            });
        }

        bucket.count += 1;
        Ok(RateDecision {
            allowed: true,
            count: bucket.count,
            reset_at: bucket.window_start + window,
        })
    }

    async fn check_allowance(&self, external_user_id: &str) -> Result<Allowance> {
        let inner = self.inner.lock();
        let Some(row) = inner.allowances.get(external_user_id) else {
            // Users without a subscription row are unmetered.
            return Ok(Allowance {
                allowed: true,
                remaining: None,
                tier: "free".to_string(),
                expires_at: None,
            });
        };

        let expired = row.expires_at.is_some_and(|at| at <= Utc::now());
        let remaining = row.limit.map(|limit| limit.saturating_sub(row.used));
        Ok(Allowance {
            allowed: !expired && remaining != Some(0),
            remaining,
            tier: row.tier.clone(),
            expires_at: row.expires_at,
        })
    }

    async fn increment_usage(&self, external_user_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let row = inner
            .allowances
            .entry(external_user_id.to_string())
            .or_default();
        row.used += 1;
        Ok(())
    }

    async fn log_webhook_delivery(&self, entry: WebhookDeliveryEntry) -> Result<()> {
        self.inner.lock().deliveries.insert(entry.delivery_id, entry);
        Ok(())
    }

    async fn update_webhook_delivery(
        &self,
        delivery_id: Uuid,
        update: DeliveryUpdate,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .deliveries
            .get_mut(&delivery_id)
            .ok_or_else(|| Error::Persistence(format!("unknown delivery {delivery_id}")))?;
        entry.status = update.status;
        entry.http_status = update.http_status;
        entry.response_snippet = update.response_snippet;
        entry.error_message = update.error_message;
        entry.attempt = update.attempt;
        entry.completed_at = Some(update.completed_at);
        Ok(())
    }
}
