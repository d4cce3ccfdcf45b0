//! Shared test support: scripted ledger, engine assembly and local HTTP
//! receivers for webhook and Horizon stubs.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use pi_business_verifier::error::{Error, Result};
use pi_business_verifier::event::create_event_channel;
use pi_business_verifier::ledger::{Counters, LedgerSource};
use pi_business_verifier::store::{MemoryStore, VerificationStore};
use pi_business_verifier::verify::engine::VerificationEngine;
use pi_business_verifier::webhook::{WebhookConfig, WebhookDispatcher};
use pi_business_verifier::ServiceConfig;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// A syntactically valid wallet address with a recognisable suffix.
pub fn wallet(suffix: char) -> String {
    let mut address = String::from("G");
    address.push_str(&"A".repeat(54));
    address.push(suffix);
    address
}

/// Behaviour of the scripted ledger for one wallet.
#[derive(Debug, Clone, Copy)]
pub enum LedgerScript {
    /// Return these counters.
    Counters(Counters),
    /// Fail with `LedgerUnavailable`.
    Unavailable,
    /// Fail with `LedgerTimeout`.
    Timeout,
}

/// Ledger source with per-wallet scripted behaviour and a call log.
#[derive(Default)]
pub struct ScriptedLedger {
    scripts: Mutex<HashMap<String, LedgerScript>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedLedger {
    pub fn script(&self, wallet: &str, script: LedgerScript) {
        self.scripts.lock().insert(wallet.to_string(), script);
    }

    pub fn script_counters(&self, wallet: &str, total: u64, credited: u64, unique: u64) {
        self.script(
            wallet,
            LedgerScript::Counters(Counters {
                total,
                credited,
                unique_counterparties: unique,
            }),
        );
    }

    /// Wallets scanned so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl LedgerSource for ScriptedLedger {
    async fn fetch_payment_counters(&self, wallet: &str) -> Result<Counters> {
        self.calls.lock().push(wallet.to_string());
        match self.scripts.lock().get(wallet) {
            Some(LedgerScript::Counters(counters)) => Ok(*counters),
            Some(LedgerScript::Unavailable) => {
                Err(Error::LedgerUnavailable("scripted outage".to_string()))
            }
            Some(LedgerScript::Timeout) => Err(Error::LedgerTimeout),
            None => Ok(Counters::default()),
        }
    }
}

/// An engine wired to a memory store and a scripted ledger.
pub struct TestService {
    pub engine: VerificationEngine,
    pub store: MemoryStore,
    pub ledger: Arc<ScriptedLedger>,
    pub webhooks: Arc<WebhookDispatcher>,
}

/// Config suitable for tests: authenticated, fast webhook retries.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        api_key: "test-api-key".to_string(),
        webhook_backoff_secs: vec![0, 0, 0],
        webhook_timeout_secs: 2,
        ..ServiceConfig::default()
    }
}

/// Assemble an engine over a fresh memory store and scripted ledger.
pub fn test_service(config: ServiceConfig) -> TestService {
    let store = MemoryStore::new();
    let store_dyn: Arc<dyn VerificationStore> = Arc::new(store.clone());
    let ledger = Arc::new(ScriptedLedger::default());
    let (events_tx, _events_rx) = create_event_channel();

    let webhooks = Arc::new(
        WebhookDispatcher::new(
            Arc::clone(&store_dyn),
            WebhookConfig {
                timeout: config.webhook_timeout(),
                attempts: config.webhook_attempts,
                backoff: config.webhook_backoff(),
            },
            events_tx.clone(),
        )
        .expect("dispatcher"),
    );

    let engine = VerificationEngine::new(
        store_dyn,
        Arc::clone(&ledger) as Arc<dyn LedgerSource>,
        Arc::clone(&webhooks),
        Arc::new(config),
        events_tx,
    );

    TestService {
        engine,
        store,
        ledger,
        webhooks,
    }
}

/// One request captured by the webhook receiver.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Clone)]
struct ReceiverState {
    hits: Arc<Mutex<Vec<ReceivedRequest>>>,
    statuses: Arc<Mutex<VecDeque<u16>>>,
}

async fn receive_hook(
    State(state): State<ReceiverState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    state.hits.lock().push(ReceivedRequest {
        headers,
        body: body.to_vec(),
    });

    let status = state.statuses.lock().pop_front().unwrap_or(200);
    StatusCode::from_u16(status).unwrap_or(StatusCode::OK)
}

/// Webhook target that answers the scripted statuses in order, then 200.
pub struct WebhookReceiver {
    pub url: String,
    hits: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl WebhookReceiver {
    /// Bind a local receiver.
    pub async fn start(statuses: Vec<u16>) -> Self {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let state = ReceiverState {
            hits: Arc::clone(&hits),
            statuses: Arc::new(Mutex::new(VecDeque::from(statuses))),
        };
        let app = Router::new()
            .route("/hook", post(receive_hook))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind receiver");
        let addr = listener.local_addr().expect("receiver addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{addr}/hook"),
            hits,
        }
    }

    pub fn hits(&self) -> Vec<ReceivedRequest> {
        self.hits.lock().clone()
    }

    pub fn hit_count(&self) -> usize {
        self.hits.lock().len()
    }

    /// Poll until the receiver has seen `count` requests or time runs out.
    pub async fn wait_for_hits(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.hit_count() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.hit_count() >= count
    }
}

#[derive(Clone)]
struct HorizonStubState {
    /// Full descending record list per wallet.
    histories: Arc<Mutex<HashMap<String, Vec<serde_json::Value>>>>,
    /// Wallets that answer 404.
    unfunded: Arc<Mutex<Vec<String>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    cursor: Option<String>,
}

async fn horizon_payments(
    State(state): State<HorizonStubState>,
    Path(wallet): Path<String>,
    Query(params): Query<PageParams>,
) -> axum::response::Response {
    state.requests.lock().push(wallet.clone());

    if state.unfunded.lock().contains(&wallet) {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "status": 404, "title": "Resource Missing" })),
        )
            .into_response();
    }

    let histories = state.histories.lock();
    let records = histories.get(&wallet).cloned().unwrap_or_default();
    drop(histories);

    let limit = params.limit.unwrap_or(10).min(200);
    let start = match params.cursor.as_deref() {
        Some(cursor) => records
            .iter()
            .position(|r| r["paging_token"] == cursor)
            .map_or(records.len(), |i| i + 1),
        None => 0,
    };
    let page: Vec<serde_json::Value> = records.iter().skip(start).take(limit).cloned().collect();

    Json(serde_json::json!({
        "_links": { "next": { "href": "" } },
        "_embedded": { "records": page },
    }))
    .into_response()
}

/// Local Horizon stub serving scripted payment histories.
pub struct HorizonStub {
    pub base_url: String,
    histories: Arc<Mutex<HashMap<String, Vec<serde_json::Value>>>>,
    unfunded: Arc<Mutex<Vec<String>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl HorizonStub {
    pub async fn start() -> Self {
        let histories = Arc::new(Mutex::new(HashMap::new()));
        let unfunded = Arc::new(Mutex::new(Vec::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = HorizonStubState {
            histories: Arc::clone(&histories),
            unfunded: Arc::clone(&unfunded),
            requests: Arc::clone(&requests),
        };

        let app = Router::new()
            .route("/accounts/{wallet}/payments", get(horizon_payments))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind horizon stub");
        let addr: SocketAddr = listener.local_addr().expect("stub addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            histories,
            unfunded,
            requests,
        }
    }

    /// Script a payment record.
    pub fn push_payment(&self, wallet: &str, record_type: &str, from: &str, to: &str) {
        let mut histories = self.histories.lock();
        let records = histories.entry(wallet.to_string()).or_default();
        let token = format!("{}", records.len() + 1);
        records.push(serde_json::json!({
            "type": record_type,
            "from": from,
            "to": to,
            "paging_token": token,
        }));
    }

    /// Script `count` incoming payments from distinct senders.
    pub fn push_incoming_payments(&self, wallet: &str, count: usize) {
        for i in 0..count {
            self.push_payment(wallet, "payment", &format!("GSENDER{i}"), wallet);
        }
    }

    pub fn mark_unfunded(&self, wallet: &str) {
        self.unfunded.lock().push(wallet.to_string());
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}
