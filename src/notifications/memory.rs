use async_trait::async_trait;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use tokio::sync::Mutex;

use super::{DeliveryRequest, DeliveryScheduler, NotificationError, ReservationMessage, ReservationPublisher};

// ============================================================================
// In-memory transports (tests and local runs)
// ============================================================================

/// Take one injected failure if any are left
fn take_failure(remaining: &AtomicU32) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Records published reservation messages
#[derive(Default)]
pub struct InMemoryReservationQueue {
    sent: Mutex<Vec<ReservationMessage>>,
    attempts: AtomicU32,
    failures_remaining: AtomicU32,
}

impl InMemoryReservationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` publishes with a transient queue error
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<ReservationMessage> {
        self.sent.lock().await.clone()
    }

    /// Publish calls seen, failed ones included
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReservationPublisher for InMemoryReservationQueue {
    async fn publish(&self, message: &ReservationMessage) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if take_failure(&self.failures_remaining) {
            return Err(NotificationError::Queue {
                topic: "reservations".to_string(),
                reason: "injected failure".to_string(),
            });
        }

        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

/// Records delivery requests instead of calling a webhook
pub struct InMemoryDeliveryScheduler {
    received: Mutex<Vec<DeliveryRequest>>,
    attempts: AtomicU32,
    failures_remaining: AtomicU32,
    failure_status: AtomicU16,
}

impl Default for InMemoryDeliveryScheduler {
    fn default() -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            attempts: AtomicU32::new(0),
            failures_remaining: AtomicU32::new(0),
            failure_status: AtomicU16::new(503),
        }
    }
}

impl InMemoryDeliveryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next `count` calls with HTTP `status`
    pub fn fail_next_with_status(&self, count: u32, status: u16) {
        self.failure_status.store(status, Ordering::SeqCst);
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub async fn received(&self) -> Vec<DeliveryRequest> {
        self.received.lock().await.clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryScheduler for InMemoryDeliveryScheduler {
    async fn schedule(&self, request: &DeliveryRequest) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if take_failure(&self.failures_remaining) {
            return Err(NotificationError::Webhook {
                status: self.failure_status.load(Ordering::SeqCst),
            });
        }

        self.received.lock().await.push(request.clone());
        Ok(())
    }
}
