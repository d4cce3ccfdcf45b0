//! Request handlers for the two verification endpoints.

use crate::error::{Error, Result};
use crate::http::auth::authorize;
use crate::verify::batch::{BatchEntry, BatchOutcome, BatchRequest};
use crate::verify::decision::Thresholds;
use crate::verify::engine::{VerificationData, VerificationEngine, VerifyRequest};
use crate::webhook::validate_webhook_url;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The verification engine.
    pub engine: VerificationEngine,
}

/// Body of `POST /verify-business`.
///
/// Required fields are optional here so their absence maps to a specific
/// 400 message rather than a serde rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBody {
    #[serde(default)]
    wallet_address: Option<String>,
    #[serde(default)]
    business_name: Option<String>,
    #[serde(default)]
    external_user_id: Option<String>,
    #[serde(default)]
    force_refresh: bool,
    #[serde(default)]
    webhook_url: Option<String>,
    #[serde(default)]
    webhook_secret: Option<String>,
    #[serde(default)]
    min_transactions: Option<u64>,
    #[serde(default)]
    min_credited_transactions: Option<u64>,
    #[serde(default)]
    min_unique_wallets: Option<u64>,
}

/// One entry of `POST /verify-business-batch`.
///
/// Fields are required at the serde level: a structurally malformed entry
/// rejects the whole envelope. An empty wallet string is well-formed here
/// and becomes a per-entry failure in the pipeline.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntryBody {
    wallet_address: String,
    business_name: String,
    external_user_id: String,
}

/// Body of `POST /verify-business-batch`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchBody {
    verifications: Vec<BatchEntryBody>,
    #[serde(default)]
    force_refresh: bool,
    #[serde(default)]
    webhook_url: Option<String>,
    #[serde(default)]
    webhook_secret: Option<String>,
    #[serde(default)]
    min_transactions: Option<u64>,
    #[serde(default)]
    min_credited_transactions: Option<u64>,
    #[serde(default)]
    min_unique_wallets: Option<u64>,
}

/// Successful response of the single-verify endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    success: bool,
    cached: bool,
    cache_expires_at: DateTime<Utc>,
    webhook_queued: bool,
    data: VerificationData,
}

/// Successful response of the batch endpoint.
#[derive(Debug, Serialize)]
struct BatchResponse {
    success: bool,
    #[serde(flatten)]
    outcome: BatchOutcome,
}

fn merged_thresholds(
    defaults: Thresholds,
    min_transactions: Option<u64>,
    min_credited: Option<u64>,
    min_unique: Option<u64>,
) -> Thresholds {
    Thresholds {
        min_total: min_transactions.unwrap_or(defaults.min_total),
        min_credited: min_credited.unwrap_or(defaults.min_credited),
        min_unique: min_unique.unwrap_or(defaults.min_unique),
    }
}

fn require_non_empty(
    value: Option<String>,
    missing: &mut Vec<&'static str>,
    name: &'static str,
) -> String {
    match value {
        Some(value) if !value.trim().is_empty() => value,
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

impl VerifyBody {
    fn into_request(self, defaults: Thresholds) -> Result<VerifyRequest> {
        let mut missing = Vec::new();
        // An empty wallet string is "present" here; the pipeline's address
        // validation reports it as a format error.
        let wallet_address = self.wallet_address.unwrap_or_else(|| {
            missing.push("walletAddress");
            String::new()
        });
        let business_name = require_non_empty(self.business_name, &mut missing, "businessName");
        let external_user_id =
            require_non_empty(self.external_user_id, &mut missing, "externalUserId");
        if !missing.is_empty() {
            return Err(Error::BadRequest(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        if let Some(url) = self.webhook_url.as_deref() {
            validate_webhook_url(url)?;
        }

        Ok(VerifyRequest {
            wallet_address,
            business_name,
            external_user_id,
            force_refresh: self.force_refresh,
            webhook_url: self.webhook_url,
            webhook_secret: self.webhook_secret,
            thresholds: merged_thresholds(
                defaults,
                self.min_transactions,
                self.min_credited_transactions,
                self.min_unique_wallets,
            ),
        })
    }
}

impl BatchBody {
    fn into_request(self, defaults: Thresholds) -> Result<BatchRequest> {
        if let Some(url) = self.webhook_url.as_deref() {
            validate_webhook_url(url)?;
        }

        Ok(BatchRequest {
            entries: self
                .verifications
                .into_iter()
                .map(|entry| BatchEntry {
                    wallet_address: entry.wallet_address,
                    business_name: entry.business_name,
                    external_user_id: entry.external_user_id,
                })
                .collect(),
            force_refresh: self.force_refresh,
            webhook_url: self.webhook_url,
            webhook_secret: self.webhook_secret,
            thresholds: merged_thresholds(
                defaults,
                self.min_transactions,
                self.min_credited_transactions,
                self.min_unique_wallets,
            ),
        })
    }
}

/// Map a pipeline error onto its wire response.
pub fn error_response(error: &Error) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (
        status,
        Json(json!({ "success": false, "error": error.to_string() })),
    )
        .into_response();

    if let Error::RateLimited { limit, reset_at, .. } = error {
        let headers = response.headers_mut();
        if let Ok(value) = limit.to_string().parse() {
            headers.insert("X-RateLimit-Limit", value);
        }
        if let Ok(value) = "0".parse() {
            headers.insert("X-RateLimit-Remaining", value);
        }
        if let Ok(value) = reset_at.to_rfc3339().parse() {
            headers.insert("X-RateLimit-Reset", value);
        }
    }

    response
}

/// `POST /verify-business`.
pub async fn verify_business(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Json<VerifyBody>, JsonRejection>,
) -> Response {
    match handle_verify(state, headers, body).await {
        Ok(response) => response,
        Err(e) => error_response(&e),
    }
}

async fn handle_verify(
    state: AppState,
    headers: HeaderMap,
    body: std::result::Result<Json<VerifyBody>, JsonRejection>,
) -> Result<Response> {
    authorize(&headers, state.engine.config())?;

    let Json(body) = body.map_err(|e| Error::BadRequest(format!("Invalid JSON body: {e}")))?;
    let request = body.into_request(state.engine.config().thresholds())?;

    let outcome = state.engine.verify(request).await?;

    let mut response = (
        StatusCode::OK,
        Json(VerifyResponse {
            success: true,
            cached: outcome.cached,
            cache_expires_at: outcome.cache_expires_at,
            webhook_queued: outcome.webhook_queued,
            data: outcome.data(),
        }),
    )
        .into_response();

    let response_headers = response.headers_mut();
    if let Ok(value) = (if outcome.cached { "HIT" } else { "MISS" }).parse() {
        response_headers.insert("X-Cache", value);
    }
    if let Ok(value) = outcome.cache_expires_at.to_rfc3339().parse() {
        response_headers.insert("X-Cache-Expires", value);
    }

    Ok(response)
}

/// `POST /verify-business-batch`.
pub async fn verify_business_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Json<BatchBody>, JsonRejection>,
) -> Response {
    match handle_batch(state, headers, body).await {
        Ok(response) => response,
        Err(e) => error_response(&e),
    }
}

async fn handle_batch(
    state: AppState,
    headers: HeaderMap,
    body: std::result::Result<Json<BatchBody>, JsonRejection>,
) -> Result<Response> {
    authorize(&headers, state.engine.config())?;

    let Json(body) = body.map_err(|e| Error::BadRequest(format!("Invalid JSON body: {e}")))?;
    let request = body.into_request(state.engine.config().thresholds())?;

    let outcome = state.engine.verify_batch(request).await?;
    Ok((
        StatusCode::OK,
        Json(BatchResponse {
            success: true,
            outcome,
        }),
    )
        .into_response())
}

/// `GET /healthz`.
pub async fn healthz() -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_produce_specific_message() {
        let body = VerifyBody {
            wallet_address: None,
            business_name: Some("Acme".to_string()),
            external_user_id: None,
            force_refresh: false,
            webhook_url: None,
            webhook_secret: None,
            min_transactions: None,
            min_credited_transactions: None,
            min_unique_wallets: None,
        };
        let err = body
            .into_request(Thresholds::default())
            .expect_err("must reject");
        assert_eq!(
            err.to_string(),
            "Missing required fields: walletAddress, externalUserId"
        );
    }

    #[test]
    fn test_empty_wallet_passes_parse_for_pipeline_rejection() {
        let body = VerifyBody {
            wallet_address: Some(String::new()),
            business_name: Some("Acme".to_string()),
            external_user_id: Some("user-1".to_string()),
            force_refresh: false,
            webhook_url: None,
            webhook_secret: None,
            min_transactions: None,
            min_credited_transactions: None,
            min_unique_wallets: None,
        };
        let request = body.into_request(Thresholds::default()).expect("parse");
        assert!(request.wallet_address.is_empty());
    }

    #[test]
    fn test_webhook_url_policy_enforced_at_parse() {
        let body = VerifyBody {
            wallet_address: Some("G".repeat(56)),
            business_name: Some("Acme".to_string()),
            external_user_id: Some("user-1".to_string()),
            force_refresh: false,
            webhook_url: Some("ftp://example.com/hook".to_string()),
            webhook_secret: None,
            min_transactions: None,
            min_credited_transactions: None,
            min_unique_wallets: None,
        };
        let err = body
            .into_request(Thresholds::default())
            .expect_err("must reject");
        assert!(err.to_string().contains("Invalid webhook URL"));
    }

    #[test]
    fn test_threshold_overrides_merge_with_defaults() {
        let merged = merged_thresholds(Thresholds::default(), Some(5), None, Some(1));
        assert_eq!(merged.min_total, 5);
        assert_eq!(merged.min_credited, 50);
        assert_eq!(merged.min_unique, 1);
    }
}
