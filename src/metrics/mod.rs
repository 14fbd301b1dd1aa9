// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, IntGaugeVec, Opts, Registry,
};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Checkouts (orders created, failures by stage)
// - Notifications per channel (sent, failed, latency)
// - Retry attempts and dead letters
// - Circuit breaker state per transport
// - Outbox backlog and component health
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Checkout Metrics
    pub orders_created: IntCounter,
    pub checkout_failures: IntCounterVec,

    // Notification Metrics
    pub notifications_sent: IntCounterVec,
    pub notifications_failed: IntCounterVec,
    pub notification_duration: HistogramVec,

    // Retry / Dead Letter Metrics
    pub retry_attempts_total: IntCounterVec,
    pub dead_letters_total: IntCounterVec,

    // Outbox Metrics
    pub outbox_pending: IntGauge,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGaugeVec,
    pub circuit_breaker_transitions: IntCounterVec,

    // Health Metrics
    pub component_health_status: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Checkout Metrics
        let orders_created = IntCounter::new(
            "orders_created_total",
            "Total orders persisted by checkout",
        )?;
        registry.register(Box::new(orders_created.clone()))?;

        let checkout_failures = IntCounterVec::new(
            Opts::new("checkout_failures_total", "Failed checkouts by pipeline stage"),
            &["stage"],
        )?;
        registry.register(Box::new(checkout_failures.clone()))?;

        // Notification Metrics
        let notifications_sent = IntCounterVec::new(
            Opts::new("notifications_sent_total", "Notifications accepted downstream"),
            &["channel"],
        )?;
        registry.register(Box::new(notifications_sent.clone()))?;

        let notifications_failed = IntCounterVec::new(
            Opts::new("notifications_failed_total", "Notification sends that failed after retries"),
            &["channel", "reason"],
        )?;
        registry.register(Box::new(notifications_failed.clone()))?;

        let notification_duration = HistogramVec::new(
            HistogramOpts::new("notification_duration_seconds", "Time to deliver a notification, retries included")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["channel"],
        )?;
        registry.register(Box::new(notification_duration.clone()))?;

        // Retry / Dead Letter Metrics
        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let dead_letters_total = IntCounterVec::new(
            Opts::new("dead_letters_total", "Outbox entries given up on"),
            &["channel"],
        )?;
        registry.register(Box::new(dead_letters_total.clone()))?;

        // Outbox Metrics
        let outbox_pending = IntGauge::new(
            "outbox_pending_entries",
            "Pending outbox entries seen by the last dispatch pass (capped at batch size)",
        )?;
        registry.register(Box::new(outbox_pending.clone()))?;

        // Circuit Breaker Metrics
        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new("circuit_breaker_state", "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)"),
            &["target"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let circuit_breaker_transitions = IntCounterVec::new(
            Opts::new("circuit_breaker_transitions_total", "Circuit breaker state transitions"),
            &["target", "from_state", "to_state"],
        )?;
        registry.register(Box::new(circuit_breaker_transitions.clone()))?;

        // Health Metrics
        let component_health_status = IntGaugeVec::new(
            Opts::new("component_health_status", "Component health (0=Unhealthy, 1=Degraded, 2=Healthy)"),
            &["component"],
        )?;
        registry.register(Box::new(component_health_status.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            checkout_failures,
            notifications_sent,
            notifications_failed,
            notification_duration,
            retry_attempts_total,
            dead_letters_total,
            outbox_pending,
            circuit_breaker_state,
            circuit_breaker_transitions,
            component_health_status,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_created(&self) {
        self.orders_created.inc();
    }

    pub fn record_checkout_failure(&self, stage: &str) {
        self.checkout_failures.with_label_values(&[stage]).inc();
    }

    pub fn record_notification_sent(&self, channel: &str, duration_secs: f64) {
        self.notifications_sent.with_label_values(&[channel]).inc();
        self.notification_duration.with_label_values(&[channel]).observe(duration_secs);
    }

    pub fn record_notification_failed(&self, channel: &str, reason: &str) {
        self.notifications_failed.with_label_values(&[channel, reason]).inc();
    }

    /// Helper to record retry attempt
    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total.with_label_values(&[operation, &attempt.to_string()]).inc();
    }

    pub fn record_dead_letter(&self, channel: &str) {
        self.dead_letters_total.with_label_values(&[channel]).inc();
    }

    pub fn set_outbox_pending(&self, pending: i64) {
        self.outbox_pending.set(pending);
    }

    /// Helper to update circuit breaker state
    pub fn update_circuit_breaker_state(&self, target: &str, state: i64) {
        self.circuit_breaker_state.with_label_values(&[target]).set(state);
    }

    /// Helper to record circuit breaker transition
    pub fn record_circuit_breaker_transition(&self, target: &str, from_state: &str, to_state: &str) {
        self.circuit_breaker_transitions
            .with_label_values(&[target, from_state, to_state])
            .inc();
    }

    pub fn update_component_health(&self, component: &str, status: i64) {
        self.component_health_status.with_label_values(&[component]).set(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    fn render(metrics: &Metrics) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metrics.registry().gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_created();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_checkout_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_created();
        metrics.record_order_created();
        metrics.record_checkout_failure("assembly");

        let text = render(&metrics);
        assert!(text.contains("orders_created_total 2"));
        assert!(text.contains("checkout_failures_total{stage=\"assembly\"} 1"));
    }

    #[test]
    fn test_notification_metrics_by_channel() {
        let metrics = Metrics::new().unwrap();
        metrics.record_notification_sent("reservations", 0.02);
        metrics.record_notification_failed("delivery", "transient");
        metrics.record_dead_letter("delivery");

        let text = render(&metrics);
        assert!(text.contains("notifications_sent_total{channel=\"reservations\"} 1"));
        assert!(text.contains("notifications_failed_total{channel=\"delivery\",reason=\"transient\"} 1"));
        assert!(text.contains("dead_letters_total{channel=\"delivery\"} 1"));
        assert!(text.contains("notification_duration_seconds_count{channel=\"reservations\"} 1"));
    }

    #[test]
    fn test_record_retry() {
        let metrics = Metrics::new().unwrap();
        metrics.record_retry_attempt("reservations", 2);
        metrics.record_retry_attempt("reservations", 3);

        let gathered = metrics.registry().gather();
        let attempts = gathered.iter().find(|m| m.name() == "retry_attempts_total").unwrap();
        assert_eq!(attempts.metric.len(), 2); // Two different attempt labels
    }

    #[test]
    fn test_circuit_breaker_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.update_circuit_breaker_state("redpanda", 0);
        metrics.record_circuit_breaker_transition("redpanda", "Closed", "Open");
        metrics.update_circuit_breaker_state("redpanda", 1);

        let text = render(&metrics);
        assert!(text.contains("circuit_breaker_state{target=\"redpanda\"} 1"));
        assert!(text.contains(
            "circuit_breaker_transitions_total{from_state=\"Closed\",target=\"redpanda\",to_state=\"Open\"} 1"
        ));
    }
}
