//! Service assembly: builder, HTTP listener and shutdown handling.

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::event::{create_event_channel, ServiceEvent, ServiceEventsChannel, ServiceEventsSender};
use crate::http;
use crate::ledger::{HorizonClient, HorizonConfig, LedgerSource};
use crate::store::{MemoryStore, VerificationStore};
use crate::verify::engine::VerificationEngine;
use crate::webhook::{WebhookConfig, WebhookDispatcher};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Builder for constructing the verification service.
pub struct ServiceBuilder {
    config: ServiceConfig,
    store: Option<Arc<dyn VerificationStore>>,
    ledger: Option<Arc<dyn LedgerSource>>,
}

impl ServiceBuilder {
    /// Create a new builder with the given configuration.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            store: None,
            ledger: None,
        }
    }

    /// Use a specific store instead of the in-memory default.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn VerificationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a specific ledger source instead of the Horizon client.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerSource>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Assemble the service.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client fails to build.
    pub fn build(self) -> Result<RunningService> {
        let config = Arc::new(self.config);
        let (events_tx, events_rx) = create_event_channel();

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn VerificationStore>);
        let ledger = match self.ledger {
            Some(ledger) => ledger,
            None => Arc::new(HorizonClient::new(HorizonConfig {
                base_url: config.ledger_base.clone(),
                timeout: config.ledger_timeout(),
            })?) as Arc<dyn LedgerSource>,
        };

        let webhooks = Arc::new(WebhookDispatcher::new(
            Arc::clone(&store),
            WebhookConfig {
                timeout: config.webhook_timeout(),
                attempts: config.webhook_attempts,
                backoff: config.webhook_backoff(),
            },
            events_tx.clone(),
        )?);

        let engine = VerificationEngine::new(
            store,
            ledger,
            Arc::clone(&webhooks),
            Arc::clone(&config),
            events_tx.clone(),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            bind_addr = %config.bind_addr,
            ledger_base = %config.ledger_base,
            "verification service assembled"
        );

        Ok(RunningService {
            config,
            engine,
            webhooks,
            shutdown_tx,
            shutdown_rx,
            events_tx,
            events_rx: Some(events_rx),
        })
    }
}

/// An assembled verification service.
pub struct RunningService {
    config: Arc<ServiceConfig>,
    engine: VerificationEngine,
    webhooks: Arc<WebhookDispatcher>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: ServiceEventsSender,
    events_rx: Option<ServiceEventsChannel>,
}

impl RunningService {
    /// The engine, for embedding or tests.
    #[must_use]
    pub fn engine(&self) -> &VerificationEngine {
        &self.engine
    }

    /// Get a receiver for service events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<ServiceEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to service events.
    #[must_use]
    pub fn subscribe_events(&self) -> ServiceEventsChannel {
        self.events_tx.subscribe()
    }

    /// Serve HTTP until shutdown is requested, then drain in-flight
    /// webhook deliveries.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or the server fails.
    pub async fn run(&mut self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, "verification service listening");
        let _ = self.events_tx.send(ServiceEvent::Started);

        let router = http::router(self.engine.clone());

        let mut shutdown_rx = self.shutdown_rx.clone();
        let shutdown = async move {
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Ctrl-C received, initiating shutdown");
                        break;
                    }
                }
            }
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        let _ = self.events_tx.send(ServiceEvent::ShuttingDown);
        self.webhooks.drain().await;
        info!("Service shutdown complete");
        Ok(())
    }

    /// Request the service to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
