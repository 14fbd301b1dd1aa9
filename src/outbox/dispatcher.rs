use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::errors::RepositoryError;
use crate::domain::order::{Order, OrderRepository};
use crate::metrics::Metrics;
use crate::notifications::Notifier;
use crate::utils::IsTransient;
use super::{NotificationChannel, OutboxEntry, OutboxStore};

// ============================================================================
// Outbox Dispatcher
// ============================================================================
//
// One pass:
//   1. claim a batch of claimable entries (oldest first)
//   2. split it into the reservation lane and the delivery lane
//   3. run both lanes concurrently; inside a lane entries go one at a time
//
// Per entry:
//   order gone or corrupt -> dead-letter
//   send ok               -> delivered
//   permanent error       -> dead-letter
//   transient, attempts<N -> record failure, back to pending
//   transient, attempts=N -> dead-letter
//   store error           -> logged, claim expires after `claim_timeout`
//
// Only claimed entries are sent, so an entry taken by an inline send or by
// another dispatcher is skipped here.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub batch_size: usize,
    /// Failed passes before an entry is dead-lettered
    pub max_attempts: i32,
    pub poll_interval: Duration,
    /// Age at which an unsettled claim is considered abandoned
    pub claim_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_attempts: 5,
            poll_interval: Duration::from_millis(1000),
            claim_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    /// Entries whose outcome could not be recorded; they stay claimed
    pub failed: usize,
}

impl DispatchReport {
    pub fn merge(self, other: DispatchReport) -> DispatchReport {
        DispatchReport {
            delivered: self.delivered + other.delivered,
            retried: self.retried + other.retried,
            dead_lettered: self.dead_lettered + other.dead_lettered,
            failed: self.failed + other.failed,
        }
    }

    pub fn total(&self) -> usize {
        self.delivered + self.retried + self.dead_lettered + self.failed
    }

    fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Delivered => self.delivered += 1,
            EntryOutcome::Retried => self.retried += 1,
            EntryOutcome::DeadLettered => self.dead_lettered += 1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("outbox store error: {0}")]
    Store(#[from] RepositoryError),
}

#[derive(Debug, Clone, Copy)]
enum EntryOutcome {
    Delivered,
    Retried,
    DeadLettered,
}

pub struct OutboxDispatcher {
    orders: Arc<dyn OrderRepository>,
    outbox: Arc<dyn OutboxStore>,
    notifier: Arc<Notifier>,
    config: DispatcherConfig,
    metrics: Option<Arc<Metrics>>,
    pass_lock: Mutex<()>,
}

impl OutboxDispatcher {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        outbox: Arc<dyn OutboxStore>,
        notifier: Arc<Notifier>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            orders,
            outbox,
            notifier,
            config,
            metrics: None,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Run one dispatch pass over the claimable outbox entries
    pub async fn dispatch_pending(&self) -> Result<DispatchReport, DispatchError> {
        let _pass = self.pass_lock.lock().await;

        let batch = self
            .outbox
            .claim_pending(self.config.batch_size, self.stale_before())
            .await?;
        if let Some(ref metrics) = self.metrics {
            metrics.set_outbox_pending(batch.len() as i64);
        }
        if batch.is_empty() {
            return Ok(DispatchReport::default());
        }

        let (reservations, deliveries): (Vec<_>, Vec<_>) = batch
            .into_iter()
            .partition(|e| e.channel == NotificationChannel::Reservations);

        tracing::debug!(
            reservations = reservations.len(),
            deliveries = deliveries.len(),
            "Dispatching outbox batch"
        );

        let (reservation_lane, delivery_lane) = tokio::join!(
            self.run_lane(reservations),
            self.run_lane(deliveries)
        );
        let report = reservation_lane.merge(delivery_lane);

        tracing::info!(
            delivered = report.delivered,
            retried = report.retried,
            dead_lettered = report.dead_lettered,
            failed = report.failed,
            "📬 Outbox pass complete"
        );

        Ok(report)
    }

    /// Claim and send the pending entries of a freshly persisted order,
    /// queue before webhook. Entries already claimed elsewhere are skipped.
    pub async fn dispatch_order(&self, order: &Order) -> Result<DispatchReport, DispatchError> {
        let Some(order_id) = order.id() else {
            return Ok(DispatchReport::default());
        };

        let mut claimed = self.outbox.claim_for_order(order_id).await?;
        claimed.sort_by_key(|e| e.channel != NotificationChannel::Reservations);

        let mut report = DispatchReport::default();
        for entry in &claimed {
            let result = self.deliver(entry, order).await;
            self.tally(&mut report, entry, result);
        }
        Ok(report)
    }

    fn stale_before(&self) -> DateTime<Utc> {
        let now = Utc::now();
        chrono::Duration::from_std(self.config.claim_timeout)
            .ok()
            .and_then(|timeout| now.checked_sub_signed(timeout))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    async fn run_lane(&self, entries: Vec<OutboxEntry>) -> DispatchReport {
        let mut report = DispatchReport::default();
        for entry in &entries {
            let result = self.dispatch_entry(entry).await;
            self.tally(&mut report, entry, result);
        }
        report
    }

    fn tally(&self, report: &mut DispatchReport, entry: &OutboxEntry, result: Result<EntryOutcome, DispatchError>) {
        match result {
            Ok(outcome) => report.record(outcome),
            Err(e) => {
                report.failed += 1;
                tracing::error!(
                    entry_id = %entry.id,
                    order_id = %entry.order_id,
                    channel = %entry.channel,
                    error = %e,
                    "❌ Outbox entry left in flight after a store error"
                );
            }
        }
    }

    async fn dispatch_entry(&self, entry: &OutboxEntry) -> Result<EntryOutcome, DispatchError> {
        let order = match self.orders.get(entry.order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                self.dead_letter(entry, "order no longer exists").await?;
                return Ok(EntryOutcome::DeadLettered);
            }
            Err(RepositoryError::Corrupt(reason)) => {
                self.dead_letter(entry, &format!("stored order is unreadable: {reason}")).await?;
                return Ok(EntryOutcome::DeadLettered);
            }
            Err(e) => return Err(e.into()),
        };

        self.deliver(entry, &order).await
    }

    async fn deliver(&self, entry: &OutboxEntry, order: &Order) -> Result<EntryOutcome, DispatchError> {
        match self.notifier.send(entry.channel, order).await {
            Ok(()) => {
                self.outbox.mark_delivered(entry.id).await?;
                Ok(EntryOutcome::Delivered)
            }
            Err(e) => {
                let reason = e.to_string();

                if !e.is_transient() || entry.attempts + 1 >= self.config.max_attempts {
                    self.dead_letter(entry, &reason).await?;
                    return Ok(EntryOutcome::DeadLettered);
                }

                match self.outbox.record_failure(entry.id, &reason).await? {
                    Some(attempts) => tracing::warn!(
                        entry_id = %entry.id,
                        order_id = %entry.order_id,
                        channel = %entry.channel,
                        attempts = attempts,
                        max_attempts = self.config.max_attempts,
                        error = %reason,
                        "🔄 Notification will be retried on a later pass"
                    ),
                    None => tracing::warn!(
                        entry_id = %entry.id,
                        channel = %entry.channel,
                        "Claim expired before the failure was recorded"
                    ),
                }
                Ok(EntryOutcome::Retried)
            }
        }
    }

    async fn dead_letter(&self, entry: &OutboxEntry, reason: &str) -> Result<(), DispatchError> {
        self.outbox.mark_dead_lettered(entry.id, reason).await?;

        if let Some(ref metrics) = self.metrics {
            metrics.record_dead_letter(entry.channel.as_str());
        }

        tracing::error!(
            entry_id = %entry.id,
            order_id = %entry.order_id,
            channel = %entry.channel,
            attempts = entry.attempts + 1,
            error = reason,
            "💀 Notification dead-lettered"
        );
        Ok(())
    }
}
