//! Single-verify pipeline: rate limit, cache, allowance, scan, decide,
//! persist, webhook.

use crate::address;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::event::{ServiceEvent, ServiceEventsSender};
use crate::ledger::LedgerSource;
use crate::store::{NewVerification, VerificationRecord, VerificationStore};
use crate::verify::cache::VerificationCache;
use crate::verify::decision::{decide, Thresholds, VerificationStatus};
use crate::webhook::{WebhookDispatcher, WebhookEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A validated verification request, ready for the pipeline.
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    /// Wallet address to verify.
    pub wallet_address: String,
    /// Business name to record.
    pub business_name: String,
    /// External user id scoping the subscription allowance.
    pub external_user_id: String,
    /// Skip the cache lookup entirely.
    pub force_refresh: bool,
    /// Optional completion webhook target (http/https, validated upstream).
    pub webhook_url: Option<String>,
    /// Optional webhook signing secret.
    pub webhook_secret: Option<String>,
    /// Thresholds for this request, already merged with the defaults.
    pub thresholds: Thresholds,
}

/// Wire shape of a verification, shared by responses and webhook payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationData {
    /// Stored record id.
    pub verification_id: Uuid,
    /// Wallet address.
    pub wallet_address: String,
    /// Business name.
    pub business_name: String,
    /// Total payment operations counted.
    pub total_transactions: u64,
    /// Distinct counterparties observed.
    pub unique_wallets: u64,
    /// Whether every threshold was satisfied.
    pub meets_requirements: bool,
    /// Rejection reason, when rejected.
    pub failure_reason: Option<String>,
    /// Decision status.
    pub verification_status: VerificationStatus,
    /// When the wallet was last scanned.
    pub verified_at: DateTime<Utc>,
}

impl From<&VerificationRecord> for VerificationData {
    fn from(record: &VerificationRecord) -> Self {
        Self {
            verification_id: record.id,
            wallet_address: record.wallet_address.clone(),
            business_name: record.business_name.clone(),
            total_transactions: record.total_transactions,
            unique_wallets: record.unique_wallets,
            meets_requirements: record.status == VerificationStatus::Approved,
            failure_reason: record.failure_reason.clone(),
            verification_status: record.status,
            verified_at: record.updated_at,
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    /// The stored (or cached) verification.
    pub record: VerificationRecord,
    /// Whether the result came from the cache.
    pub cached: bool,
    /// When the cached result goes stale.
    pub cache_expires_at: DateTime<Utc>,
    /// Whether a completion webhook was enqueued.
    pub webhook_queued: bool,
}

impl VerifyOutcome {
    /// Wire shape of the verification carried by this outcome.
    #[must_use]
    pub fn data(&self) -> VerificationData {
        VerificationData::from(&self.record)
    }
}

/// The verification engine: wires the validator, rate limiter, cache,
/// allowance gate, ledger scan, decision rule, upsert and webhook dispatch
/// into one pipeline.
#[derive(Clone)]
pub struct VerificationEngine {
    store: Arc<dyn VerificationStore>,
    ledger: Arc<dyn LedgerSource>,
    webhooks: Arc<WebhookDispatcher>,
    cache: VerificationCache,
    config: Arc<ServiceConfig>,
    events: ServiceEventsSender,
}

impl VerificationEngine {
    /// Create an engine over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn VerificationStore>,
        ledger: Arc<dyn LedgerSource>,
        webhooks: Arc<WebhookDispatcher>,
        config: Arc<ServiceConfig>,
        events: ServiceEventsSender,
    ) -> Self {
        let cache = VerificationCache::new(Arc::clone(&store), config.cache_ttl());
        Self {
            store,
            ledger,
            webhooks,
            cache,
            config,
            events,
        }
    }

    /// Service configuration this engine runs with.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> crate::verify::cache::CacheStats {
        self.cache.stats()
    }

    /// Webhook dispatcher shared with the batch orchestrator.
    #[must_use]
    pub fn webhooks(&self) -> &Arc<WebhookDispatcher> {
        &self.webhooks
    }

    /// Run the verification pipeline for one request.
    ///
    /// Step order matches the HTTP contract: rate limit before address
    /// validation, cache before the allowance gate, and the webhook enqueue
    /// only after a successful upsert.
    ///
    /// # Errors
    ///
    /// Returns the typed error for the first step that refuses; the HTTP
    /// layer maps each to its status code.
    pub async fn verify(&self, request: VerifyRequest) -> Result<VerifyOutcome> {
        let wallet = request.wallet_address.as_str();

        // Rate limit: counted for every request, well-formed or not.
        let rate = self
            .store
            .rate_limit(wallet, self.config.rate_max, self.config.rate_window())
            .await?;
        if !rate.allowed {
            debug!(wallet = %wallet, count = rate.count, "rate limit refused request");
            return Err(Error::RateLimited {
                limit: self.config.rate_max,
                count: rate.count,
                reset_at: rate.reset_at,
            });
        }

        if !address::is_valid_wallet_address(wallet) {
            return Err(Error::BadRequest(format!(
                "Invalid wallet address format: {wallet}"
            )));
        }

        if !request.force_refresh {
            if let Some(hit) = self.cache.lookup(wallet).await? {
                return Ok(VerifyOutcome {
                    record: hit.record,
                    cached: true,
                    cache_expires_at: hit.expires_at,
                    webhook_queued: false,
                });
            }
        }

        let allowance = self.store.check_allowance(&request.external_user_id).await?;
        if !allowance.allowed {
            return Err(Error::QuotaExceeded(format!(
                "verification allowance exhausted for tier {}",
                allowance.tier
            )));
        }

        let counters = self.ledger.fetch_payment_counters(wallet).await?;
        let decision = decide(&counters, &request.thresholds);

        let record = self
            .store
            .upsert_verification(NewVerification {
                wallet_address: request.wallet_address.clone(),
                business_name: request.business_name.clone(),
                external_user_id: request.external_user_id.clone(),
                counters,
                decision,
            })
            .await?;

        // Usage accounting is best-effort once the record is durable.
        if let Err(e) = self.store.increment_usage(&request.external_user_id).await {
            warn!(user = %request.external_user_id, error = %e, "failed to increment usage");
        }

        let webhook_queued = self.enqueue_completion_webhook(&request, &record);

        info!(
            wallet = %wallet,
            status = ?record.status,
            total = record.total_transactions,
            credited = record.credited_transactions,
            unique = record.unique_wallets,
            "verification complete"
        );
        let _ = self.events.send(ServiceEvent::VerificationCompleted {
            wallet_address: record.wallet_address.clone(),
            status: record.status,
        });

        Ok(VerifyOutcome {
            cache_expires_at: self.cache.expires_from(record.updated_at),
            record,
            cached: false,
            webhook_queued,
        })
    }

    /// Enqueue the completion webhook, if one was requested. Best-effort:
    /// never blocks or fails the response.
    fn enqueue_completion_webhook(
        &self,
        request: &VerifyRequest,
        record: &VerificationRecord,
    ) -> bool {
        let Some(url) = request.webhook_url.as_deref() else {
            return false;
        };

        match serde_json::to_value(VerificationData::from(record)) {
            Ok(data) => {
                self.webhooks.enqueue(
                    url,
                    request.webhook_secret.as_deref(),
                    WebhookEvent::VerificationCompleted,
                    data,
                    Some(record.id),
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to serialize webhook payload");
                false
            }
        }
    }
}
