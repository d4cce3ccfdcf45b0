//! Service event system.

use crate::verify::decision::VerificationStatus;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted by the service.
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    /// Service has started successfully.
    Started,

    /// Service is shutting down.
    ShuttingDown,

    /// A verification pipeline ran to completion.
    VerificationCompleted {
        /// Wallet that was verified.
        wallet_address: String,
        /// Decision status.
        status: VerificationStatus,
    },

    /// A webhook delivery succeeded.
    WebhookDelivered {
        /// Delivery identifier.
        delivery_id: Uuid,
    },

    /// A webhook delivery failed after all attempts.
    WebhookFailed {
        /// Delivery identifier.
        delivery_id: Uuid,
        /// Final error message.
        error: String,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Channel for receiving service events.
pub type ServiceEventsChannel = broadcast::Receiver<ServiceEvent>;

/// Sender for service events.
pub type ServiceEventsSender = broadcast::Sender<ServiceEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (ServiceEventsSender, ServiceEventsChannel) {
    broadcast::channel(256)
}
