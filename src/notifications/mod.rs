// ============================================================================
// Downstream Notifications
// ============================================================================
//
// Two independent notifications describe every persisted order:
// - a reservation message on the queue (inventory subsystem)
// - a delivery request POSTed to a webhook (delivery scheduling)
//
// Transports implement `ReservationPublisher` / `DeliveryScheduler`;
// `Notifier` builds the payloads and applies per-channel retry.
//
// ============================================================================

mod memory;
mod notifier;
mod payloads;

use async_trait::async_trait;

use crate::utils::IsTransient;

pub use memory::{InMemoryDeliveryScheduler, InMemoryReservationQueue};
pub use notifier::{FanOutReport, Notifier};
pub use payloads::{DeliveryRequest, ItemUnits, ReservationMessage};

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("order has no identity yet; only persisted orders can be announced")]
    UnpersistedOrder,

    #[error("failed to encode notification payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("queue send to '{topic}' failed: {reason}")]
    Queue { topic: String, reason: String },

    #[error("delivery webhook answered HTTP {status}")]
    Webhook { status: u16 },

    #[error("delivery webhook transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("circuit breaker open for {0}")]
    CircuitOpen(String),
}

impl IsTransient for NotificationError {
    fn is_transient(&self) -> bool {
        match self {
            NotificationError::UnpersistedOrder | NotificationError::Serialization(_) => false,
            NotificationError::Queue { .. } | NotificationError::CircuitOpen(_) => true,
            NotificationError::Webhook { status } => *status == 429 || *status >= 500,
            NotificationError::Transport(e) => e.is_timeout() || e.is_connect(),
        }
    }
}

/// Sends reservation messages to the queue
#[async_trait]
pub trait ReservationPublisher: Send + Sync {
    async fn publish(&self, message: &ReservationMessage) -> Result<(), NotificationError>;
}

/// Calls the delivery-scheduling webhook
#[async_trait]
pub trait DeliveryScheduler: Send + Sync {
    async fn schedule(&self, request: &DeliveryRequest) -> Result<(), NotificationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_status_classification() {
        assert!(NotificationError::Webhook { status: 503 }.is_transient());
        assert!(NotificationError::Webhook { status: 429 }.is_transient());
        assert!(!NotificationError::Webhook { status: 400 }.is_transient());
        assert!(!NotificationError::Webhook { status: 404 }.is_transient());
    }

    #[test]
    fn test_queue_and_breaker_errors_are_transient() {
        let queue = NotificationError::Queue {
            topic: "reservations".to_string(),
            reason: "broker down".to_string(),
        };

        assert!(queue.is_transient());
        assert!(NotificationError::CircuitOpen("redpanda".to_string()).is_transient());
        assert!(!NotificationError::UnpersistedOrder.is_transient());
    }
}
