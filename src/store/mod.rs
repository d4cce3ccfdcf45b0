//! Persistence seam: the typed operations the verification core consumes.
//!
//! The relational store behind these operations is an external collaborator;
//! the core only depends on [`VerificationStore`]. The crate ships
//! [`MemoryStore`] for standalone runs and tests.

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::ledger::Counters;
use crate::verify::decision::{Decision, VerificationStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A persisted verification, keyed uniquely by wallet address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// Opaque record id.
    pub id: Uuid,
    /// Wallet address (unique key).
    pub wallet_address: String,
    /// Business name supplied by the caller.
    pub business_name: String,
    /// Opaque external user id scoping the subscription allowance.
    pub external_user_id: String,
    /// Payment operations counted.
    pub total_transactions: u64,
    /// Payments received by the wallet.
    pub credited_transactions: u64,
    /// Distinct counterparties observed.
    pub unique_wallets: u64,
    /// Decision status at the last scan.
    pub status: VerificationStatus,
    /// Rejection reason, when rejected.
    pub failure_reason: Option<String>,
    /// Last scan time. Doubles as the cache timestamp.
    pub updated_at: DateTime<Utc>,
}

impl VerificationRecord {
    /// Counters as scanned from the ledger.
    #[must_use]
    pub fn counters(&self) -> Counters {
        Counters {
            total: self.total_transactions,
            credited: self.credited_transactions,
            unique_counterparties: self.unique_wallets,
        }
    }
}

/// Input to the verification upsert.
#[derive(Debug, Clone)]
pub struct NewVerification {
    /// Wallet address (conflict key).
    pub wallet_address: String,
    /// Business name.
    pub business_name: String,
    /// External user id.
    pub external_user_id: String,
    /// Scanned counters.
    pub counters: Counters,
    /// Decision computed from the counters.
    pub decision: Decision,
}

/// Outcome of a rate-limit check-and-increment.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Requests counted in the current window, including this one.
    pub count: u32,
    /// When the current window resets.
    pub reset_at: DateTime<Utc>,
}

/// Subscription allowance snapshot for an external user.
#[derive(Debug, Clone)]
pub struct Allowance {
    /// Whether the user may run another verification.
    pub allowed: bool,
    /// Verifications remaining, `None` for unmetered tiers.
    pub remaining: Option<u32>,
    /// Subscription tier name.
    pub tier: String,
    /// When the subscription expires, if it does.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Delivery state of a webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Enqueued, no final outcome yet.
    Pending,
    /// A 2xx response was received.
    Succeeded,
    /// Attempts exhausted or a permanent failure occurred.
    Failed,
}

/// One row of the webhook delivery log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDeliveryEntry {
    /// Delivery id.
    pub delivery_id: Uuid,
    /// Verification this delivery reports on, when applicable.
    pub verification_id: Option<Uuid>,
    /// Target URL.
    pub webhook_url: String,
    /// Payload as sent on the wire.
    pub payload: serde_json::Value,
    /// Current status.
    pub status: DeliveryStatus,
    /// HTTP status of the final attempt, when a response arrived.
    pub http_status: Option<u16>,
    /// Bounded snippet of the final response body.
    pub response_snippet: Option<String>,
    /// Final error message, when delivery failed without a response.
    pub error_message: Option<String>,
    /// Attempts performed so far.
    pub attempt: u32,
    /// When the delivery was enqueued.
    pub created_at: DateTime<Utc>,
    /// When the delivery reached a final status.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Finalisation data for a delivery-log row.
#[derive(Debug, Clone)]
pub struct DeliveryUpdate {
    /// Final status.
    pub status: DeliveryStatus,
    /// HTTP status of the last attempt, when a response arrived.
    pub http_status: Option<u16>,
    /// Bounded snippet of the last response body.
    pub response_snippet: Option<String>,
    /// Error of the last attempt, when no response arrived.
    pub error_message: Option<String>,
    /// Attempts performed.
    pub attempt: u32,
    /// Completion time.
    pub completed_at: DateTime<Utc>,
}

/// The typed persistence operations the core consumes.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Insert or update the verification for a wallet, replacing the mutable
    /// fields on conflict. Returns the stored row.
    async fn upsert_verification(&self, new: NewVerification) -> Result<VerificationRecord>;

    /// Fetch the verification for a wallet, if one exists.
    async fn verification_by_wallet(&self, wallet: &str) -> Result<Option<VerificationRecord>>;

    /// Atomically check-and-increment the wallet's rate bucket.
    ///
    /// Resets the bucket when the window has elapsed; refuses without
    /// incrementing when the count has reached `max`.
    async fn rate_limit(&self, wallet: &str, max: u32, window: Duration) -> Result<RateDecision>;

    /// Consult the subscription allowance for an external user.
    async fn check_allowance(&self, external_user_id: &str) -> Result<Allowance>;

    /// Record one verification against the user's allowance.
    async fn increment_usage(&self, external_user_id: &str) -> Result<()>;

    /// Create a delivery-log row.
    async fn log_webhook_delivery(&self, entry: WebhookDeliveryEntry) -> Result<()>;

    /// Finalise a delivery-log row.
    async fn update_webhook_delivery(&self, delivery_id: Uuid, update: DeliveryUpdate)
        -> Result<()>;
}
