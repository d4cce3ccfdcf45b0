//! At-least-once webhook delivery with bounded retries.
//!
//! `enqueue` returns immediately; delivery runs on a detached task whose
//! lifetime is decoupled from the HTTP response. In-flight deliveries are
//! awaited by [`WebhookDispatcher::drain`] during shutdown.

use crate::error::{Error, Result};
use crate::event::{ServiceEvent, ServiceEventsSender};
use crate::store::{DeliveryStatus, DeliveryUpdate, VerificationStore, WebhookDeliveryEntry};
use crate::webhook::signature::signature_header;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Maximum response-body length kept in the delivery log.
const RESPONSE_SNIPPET_MAX: usize = 256;

/// Webhook event names on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A single verification finished.
    VerificationCompleted,
    /// A batch of verifications finished.
    BatchVerificationCompleted,
}

impl WebhookEvent {
    /// Wire name of the event.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WebhookEvent::VerificationCompleted => "verification.completed",
            WebhookEvent::BatchVerificationCompleted => "batch.verification.completed",
        }
    }
}

/// Check a caller-supplied webhook URL at request-parse time.
///
/// # Errors
///
/// Returns [`Error::BadRequest`] unless the URL uses `http` or `https`.
pub fn validate_webhook_url(url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::BadRequest(format!(
            "Invalid webhook URL: {url} (only http and https are supported)"
        )))
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Per-attempt connect+read timeout.
    pub timeout: Duration,
    /// Maximum delivery attempts.
    pub attempts: u32,
    /// Delay applied before each attempt, indexed by attempt number.
    pub backoff: Vec<Duration>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            attempts: 3,
            backoff: vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(5),
            ],
        }
    }
}

/// Outcome of one delivery attempt.
#[derive(Debug)]
enum AttemptOutcome {
    /// 2xx response.
    Success { status: u16, snippet: String },
    /// 4xx (other than 429): do not retry.
    Permanent { status: u16, snippet: String },
    /// 429, 5xx or a transport failure: retry if attempts remain.
    Retryable { status: Option<u16>, error: String },
}

/// Shared state each detached delivery task runs against.
struct DeliveryContext {
    client: reqwest::Client,
    store: Arc<dyn VerificationStore>,
    config: WebhookConfig,
    events: ServiceEventsSender,
}

/// Signs, POSTs and retries webhook deliveries as detached tasks.
pub struct WebhookDispatcher {
    context: Arc<DeliveryContext>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WebhookDispatcher {
    /// Create a dispatcher over the given delivery-log store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(
        store: Arc<dyn VerificationStore>,
        config: WebhookConfig,
        events: ServiceEventsSender,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Webhook(format!("failed to build client: {e}")))?;

        Ok(Self {
            context: Arc::new(DeliveryContext {
                client,
                store,
                config,
                events,
            }),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Enqueue a delivery and return its id immediately.
    ///
    /// The delivery runs on a detached task: it logs a pending row, signs
    /// the exact bytes it will send, then walks the retry schedule until a
    /// 2xx, a permanent 4xx, or attempt exhaustion.
    pub fn enqueue(
        &self,
        url: &str,
        secret: Option<&str>,
        event: WebhookEvent,
        data: serde_json::Value,
        verification_id: Option<Uuid>,
    ) -> Uuid {
        let delivery_id = Uuid::new_v4();
        let context = Arc::clone(&self.context);
        let url = url.to_string();
        let secret = secret.map(str::to_string);

        let handle = tokio::spawn(async move {
            if let Err(e) = context
                .deliver(
                    delivery_id,
                    &url,
                    secret.as_deref(),
                    event,
                    data,
                    verification_id,
                )
                .await
            {
                warn!(delivery_id = %delivery_id, error = %e, "webhook delivery failed");
                let _ = context.events.send(ServiceEvent::WebhookFailed {
                    delivery_id,
                    error: e.to_string(),
                });
            }
        });

        let mut tasks = self.tasks.lock();
        // Reap finished handles so the vector stays bounded under load.
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);

        delivery_id
    }

    /// Await all in-flight deliveries. Called during shutdown.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock();
            tasks.drain(..).collect()
        };
        if handles.is_empty() {
            return;
        }
        info!(count = handles.len(), "draining in-flight webhook deliveries");
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Number of deliveries not yet finished.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.lock().iter().filter(|h| !h.is_finished()).count()
    }
}

impl DeliveryContext {
    async fn deliver(
        &self,
        delivery_id: Uuid,
        url: &str,
        secret: Option<&str>,
        event: WebhookEvent,
        data: serde_json::Value,
        verification_id: Option<Uuid>,
    ) -> Result<()> {
        let timestamp = Utc::now();
        let payload = serde_json::json!({
            "event": event.as_str(),
            "timestamp": timestamp.to_rfc3339(),
            "data": data,
        });

        // The signature covers the exact bytes sent on the wire.
        let body = serde_json::to_vec(&payload)
            .map_err(|e| Error::Webhook(format!("payload serialization: {e}")))?;
        let signature = match secret {
            Some(secret) => Some(signature_header(secret, &body)?),
            None => None,
        };

        self.store
            .log_webhook_delivery(WebhookDeliveryEntry {
                delivery_id,
                verification_id,
                webhook_url: url.to_string(),
                payload,
                status: DeliveryStatus::Pending,
                http_status: None,
                response_snippet: None,
                error_message: None,
                attempt: 0,
                created_at: timestamp,
                completed_at: None,
            })
            .await?;

        let timestamp_header = timestamp.to_rfc3339();
        let mut attempt = 0u32;
        let mut last_retryable: Option<AttemptOutcome> = None;

        while attempt < self.config.attempts {
            let delay = self
                .config
                .backoff
                .get(attempt as usize)
                .or_else(|| self.config.backoff.last())
                .copied()
                .unwrap_or(Duration::ZERO);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;

            debug!(delivery_id = %delivery_id, attempt, url = %url, "webhook attempt");
            match self
                .attempt(url, &body, event, &timestamp_header, signature.as_deref())
                .await
            {
                AttemptOutcome::Success { status, snippet } => {
                    self.finalize(
                        delivery_id,
                        DeliveryUpdate {
                            status: DeliveryStatus::Succeeded,
                            http_status: Some(status),
                            response_snippet: Some(snippet),
                            error_message: None,
                            attempt,
                            completed_at: Utc::now(),
                        },
                    )
                    .await?;
                    info!(delivery_id = %delivery_id, attempt, "webhook delivered");
                    let _ = self
                        .events
                        .send(ServiceEvent::WebhookDelivered { delivery_id });
                    return Ok(());
                }
                AttemptOutcome::Permanent { status, snippet } => {
                    self.finalize(
                        delivery_id,
                        DeliveryUpdate {
                            status: DeliveryStatus::Failed,
                            http_status: Some(status),
                            response_snippet: Some(snippet),
                            error_message: Some(format!("permanent failure: HTTP {status}")),
                            attempt,
                            completed_at: Utc::now(),
                        },
                    )
                    .await?;
                    return Err(Error::Webhook(format!(
                        "target returned permanent HTTP {status}"
                    )));
                }
                outcome @ AttemptOutcome::Retryable { .. } => {
                    last_retryable = Some(outcome);
                }
            }
        }

        let (http_status, error) = match last_retryable {
            Some(AttemptOutcome::Retryable { status, error }) => (status, error),
            _ => (None, "no attempts performed".to_string()),
        };
        self.finalize(
            delivery_id,
            DeliveryUpdate {
                status: DeliveryStatus::Failed,
                http_status,
                response_snippet: None,
                error_message: Some(error.clone()),
                attempt,
                completed_at: Utc::now(),
            },
        )
        .await?;
        Err(Error::Webhook(format!(
            "exhausted {} attempts: {error}",
            self.config.attempts
        )))
    }

    async fn attempt(
        &self,
        url: &str,
        body: &[u8],
        event: WebhookEvent,
        timestamp: &str,
        signature: Option<&str>,
    ) -> AttemptOutcome {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Event", event.as_str())
            .header("X-Webhook-Timestamp", timestamp)
            .body(body.to_vec());
        if let Some(signature) = signature {
            request = request.header("X-Webhook-Signature", signature);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return AttemptOutcome::Retryable {
                    status: None,
                    error: e.to_string(),
                };
            }
        };

        let status = response.status().as_u16();
        let snippet: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(RESPONSE_SNIPPET_MAX)
            .collect();

        if (200..300).contains(&status) {
            AttemptOutcome::Success { status, snippet }
        } else if (400..500).contains(&status) && status != 429 {
            AttemptOutcome::Permanent { status, snippet }
        } else {
            AttemptOutcome::Retryable {
                status: Some(status),
                error: format!("HTTP {status}"),
            }
        }
    }

    async fn finalize(&self, delivery_id: Uuid, update: DeliveryUpdate) -> Result<()> {
        self.store.update_webhook_delivery(delivery_id, update).await
    }
}
