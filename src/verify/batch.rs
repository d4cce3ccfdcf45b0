//! Batch orchestrator: bounded-concurrency fan-out over the single-verify
//! pipeline.

use crate::error::{Error, Result};
use crate::verify::engine::{VerificationData, VerificationEngine, VerifyRequest};
use crate::webhook::WebhookEvent;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// One entry of a batch request.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    /// Wallet address to verify.
    pub wallet_address: String,
    /// Business name to record.
    pub business_name: String,
    /// External user id scoping the allowance.
    pub external_user_id: String,
}

/// A validated batch request.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Entries, at most the configured batch maximum.
    pub entries: Vec<BatchEntry>,
    /// Skip cache lookups for every entry.
    pub force_refresh: bool,
    /// Optional batch-completion webhook target.
    pub webhook_url: Option<String>,
    /// Optional webhook signing secret.
    pub webhook_secret: Option<String>,
    /// Thresholds applied to every entry.
    pub thresholds: crate::verify::decision::Thresholds,
}

/// Per-entry result, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntryResult {
    /// Whether this entry's pipeline completed.
    pub success: bool,
    /// Wallet address of the entry.
    pub wallet_address: String,
    /// Verification data, when successful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<VerificationData>,
    /// Whether the result came from the cache, when successful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    /// Error message, when the entry failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of a completed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// Batch id.
    pub batch_id: Uuid,
    /// Entries received.
    pub total_requested: usize,
    /// Entries that ran to completion or captured failure.
    pub total_processed: usize,
    /// Entries that verified successfully.
    pub total_successful: usize,
    /// Entries whose pipeline refused or failed.
    pub total_failed: usize,
    /// When the batch finished.
    pub completed_at: DateTime<Utc>,
    /// Per-entry results, in input order.
    pub results: Vec<BatchEntryResult>,
}

/// Validate a batch envelope against the configured maximum.
///
/// A malformed envelope rejects the whole batch; per-entry problems are
/// captured later as entry failures.
///
/// # Errors
///
/// Returns [`Error::BadRequest`] when the envelope is empty or oversized.
pub fn validate_envelope(entries: &[BatchEntry], batch_max: usize) -> Result<()> {
    if entries.is_empty() {
        return Err(Error::BadRequest(
            "Batch must contain at least one verification".to_string(),
        ));
    }
    if entries.len() > batch_max {
        return Err(Error::BadRequest(format!(
            "Batch size {} exceeds the maximum of {batch_max}",
            entries.len()
        )));
    }
    Ok(())
}

impl VerificationEngine {
    /// Run the single-verify pipeline over every entry with bounded
    /// concurrency. Entry failures are captured into their result and never
    /// abort siblings; results come back in input order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] when the envelope itself is malformed.
    pub async fn verify_batch(&self, request: BatchRequest) -> Result<BatchOutcome> {
        validate_envelope(&request.entries, self.config().batch_max)?;

        let batch_id = Uuid::new_v4();
        let total_requested = request.entries.len();
        let concurrency = self.config().batch_concurrency.max(1);

        info!(
            batch_id = %batch_id,
            entries = total_requested,
            concurrency,
            "starting batch verification"
        );

        let thresholds = request.thresholds;
        let force_refresh = request.force_refresh;

        let results: Vec<BatchEntryResult> = stream::iter(request.entries)
            .map(|entry| {
                let engine = self.clone();
                async move {
                    let wallet_address = entry.wallet_address.clone();
                    let outcome = engine
                        .verify(VerifyRequest {
                            wallet_address: entry.wallet_address,
                            business_name: entry.business_name,
                            external_user_id: entry.external_user_id,
                            force_refresh,
                            // Per-entry webhooks are not part of the batch
                            // contract; one batch callback fires at the end.
                            webhook_url: None,
                            webhook_secret: None,
                            thresholds,
                        })
                        .await;

                    match outcome {
                        Ok(outcome) => BatchEntryResult {
                            success: true,
                            wallet_address,
                            data: Some(outcome.data()),
                            cached: Some(outcome.cached),
                            error: None,
                        },
                        Err(e) => BatchEntryResult {
                            success: false,
                            wallet_address,
                            data: None,
                            cached: None,
                            error: Some(e.to_string()),
                        },
                    }
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let total_successful = results.iter().filter(|r| r.success).count();
        let outcome = BatchOutcome {
            batch_id,
            total_requested,
            total_processed: results.len(),
            total_successful,
            total_failed: results.len() - total_successful,
            completed_at: Utc::now(),
            results,
        };

        info!(
            batch_id = %batch_id,
            successful = outcome.total_successful,
            failed = outcome.total_failed,
            "batch verification complete"
        );

        if let Some(url) = request.webhook_url.as_deref() {
            match serde_json::to_value(&outcome) {
                Ok(data) => {
                    self.webhooks().enqueue(
                        url,
                        request.webhook_secret.as_deref(),
                        WebhookEvent::BatchVerificationCompleted,
                        data,
                        None,
                    );
                }
                Err(e) => warn!(error = %e, "failed to serialize batch webhook payload"),
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(wallet: &str) -> BatchEntry {
        BatchEntry {
            wallet_address: wallet.to_string(),
            business_name: "Acme".to_string(),
            external_user_id: "user-1".to_string(),
        }
    }

    #[test]
    fn test_empty_envelope_rejected() {
        let err = validate_envelope(&[], 10).expect_err("must reject");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_oversized_envelope_rejected() {
        let entries: Vec<BatchEntry> = (0..11).map(|i| entry(&format!("G{i}"))).collect();
        let err = validate_envelope(&entries, 10).expect_err("must reject");
        assert!(err.to_string().contains("exceeds the maximum"));
    }

    #[test]
    fn test_full_envelope_accepted() {
        let entries: Vec<BatchEntry> = (0..10).map(|i| entry(&format!("G{i}"))).collect();
        assert!(validate_envelope(&entries, 10).is_ok());
    }
}
