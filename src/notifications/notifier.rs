use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::order::Order;
use crate::metrics::Metrics;
use crate::outbox::NotificationChannel;
use crate::utils::{retry_on_transient, IsTransient, RetryConfig};
use super::{DeliveryRequest, DeliveryScheduler, NotificationError, ReservationMessage, ReservationPublisher};

/// Outcome of announcing one order on both channels
#[derive(Debug)]
pub struct FanOutReport {
    pub reservation: Result<(), NotificationError>,
    pub delivery: Result<(), NotificationError>,
}

impl FanOutReport {
    pub fn all_delivered(&self) -> bool {
        self.reservation.is_ok() && self.delivery.is_ok()
    }

    pub fn result(&self, channel: NotificationChannel) -> &Result<(), NotificationError> {
        match channel {
            NotificationChannel::Reservations => &self.reservation,
            NotificationChannel::Delivery => &self.delivery,
        }
    }
}

// ============================================================================
// Notifier - builds payloads and sends them with per-channel retry
// ============================================================================

pub struct Notifier {
    reservations: Arc<dyn ReservationPublisher>,
    deliveries: Arc<dyn DeliveryScheduler>,
    reservation_retry: RetryConfig,
    delivery_retry: RetryConfig,
    metrics: Option<Arc<Metrics>>,
}

impl Notifier {
    pub fn new(reservations: Arc<dyn ReservationPublisher>, deliveries: Arc<dyn DeliveryScheduler>) -> Self {
        Self {
            reservations,
            deliveries,
            reservation_retry: RetryConfig::for_queue(),
            delivery_retry: RetryConfig::for_webhook(),
            metrics: None,
        }
    }

    pub fn with_retry(mut self, reservation_retry: RetryConfig, delivery_retry: RetryConfig) -> Self {
        self.reservation_retry = reservation_retry;
        self.delivery_retry = delivery_retry;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Announce a persisted order: queue first, then webhook.
    ///
    /// The two sends are independent; a queue failure does not skip the
    /// webhook and neither failure is raised. Inspect the report instead.
    pub async fn notify_downstream(&self, order: &Order) -> FanOutReport {
        let reservation = self.send(NotificationChannel::Reservations, order).await;
        let delivery = self.send(NotificationChannel::Delivery, order).await;

        FanOutReport { reservation, delivery }
    }

    /// Send one channel's notification for a persisted order
    pub async fn send(&self, channel: NotificationChannel, order: &Order) -> Result<(), NotificationError> {
        let start = Instant::now();

        let result = match channel {
            NotificationChannel::Reservations => self.publish_reservation(order).await,
            NotificationChannel::Delivery => self.schedule_delivery(order).await,
        };

        match &result {
            Ok(()) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.record_notification_sent(channel.as_str(), start.elapsed().as_secs_f64());
                }
                tracing::info!(
                    order_id = ?order.id(),
                    channel = %channel,
                    "📤 Notification sent"
                );
            }
            Err(e) => {
                if let Some(ref metrics) = self.metrics {
                    let reason = if e.is_transient() { "transient" } else { "permanent" };
                    metrics.record_notification_failed(channel.as_str(), reason);
                }
                tracing::error!(
                    order_id = ?order.id(),
                    channel = %channel,
                    error = %e,
                    "❌ Notification failed"
                );
            }
        }

        result
    }

    async fn publish_reservation(&self, order: &Order) -> Result<(), NotificationError> {
        let message = ReservationMessage::from_order(order)?;
        let publisher = self.reservations.clone();

        self.send_with_retry(NotificationChannel::Reservations, &self.reservation_retry, move || {
            let publisher = publisher.clone();
            let message = message.clone();
            async move { publisher.publish(&message).await }
        })
        .await
    }

    async fn schedule_delivery(&self, order: &Order) -> Result<(), NotificationError> {
        let request = DeliveryRequest::from_order(order)?;
        let scheduler = self.deliveries.clone();

        self.send_with_retry(NotificationChannel::Delivery, &self.delivery_retry, move || {
            let scheduler = scheduler.clone();
            let request = request.clone();
            async move { scheduler.schedule(&request).await }
        })
        .await
    }

    async fn send_with_retry<F, Fut>(
        &self,
        channel: NotificationChannel,
        config: &RetryConfig,
        mut send: F,
    ) -> Result<(), NotificationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), NotificationError>>,
    {
        let metrics = self.metrics.clone();

        retry_on_transient(config, |attempt| {
            if attempt > 1 {
                if let Some(ref metrics) = metrics {
                    metrics.record_retry_attempt(channel.as_str(), attempt);
                }
            }
            send()
        })
        .await
        .into_result()
    }
}
