use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    error::KafkaError,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};

use crate::config::KafkaConfig;
use crate::notifications::{NotificationError, ReservationMessage, ReservationPublisher};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

/// Long-lived Kafka/Redpanda producer guarded by a circuit breaker
pub struct RedpandaClient {
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
    message_timeout: std::time::Duration,
}

impl RedpandaClient {
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.message_timeout.as_millis().to_string())
            .set("enable.idempotence", "true")
            .create()?;

        // Configure circuit breaker for Redpanda
        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,           // Open after 5 failures
            timeout: std::time::Duration::from_secs(30),  // Wait 30s before retry
            success_threshold: 3,           // Need 3 successes to close
        };

        Ok(Self {
            producer,
            circuit_breaker: CircuitBreaker::new("redpanda", cb_config),
            message_timeout: config.message_timeout,
        })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), NotificationError> {
        // Use circuit breaker to protect against Redpanda failures
        let result = self.circuit_breaker.call(async {
            let record = FutureRecord::to(topic)
                .key(key)
                .payload(payload);

            self.producer
                .send(record, Timeout::After(self.message_timeout))
                .await
                .map(|_| ())
                .map_err(|(e, _)| e)
        }).await;

        match result {
            Ok(()) => {
                tracing::debug!(
                    topic = %topic,
                    key = %key,
                    "Published to Redpanda"
                );
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(
                    topic = %topic,
                    "Circuit breaker open - Redpanda unavailable"
                );
                Err(NotificationError::CircuitOpen(self.circuit_breaker.name().to_string()))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(
                    error = %e,
                    topic = %topic,
                    "Failed to publish to Redpanda"
                );
                Err(NotificationError::Queue {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }
}

// ============================================================================
// Reservation queue on top of the shared producer
// ============================================================================

/// Publishes reservation messages keyed by order id, so consumers can
/// drop duplicates of the same order
pub struct ReservationQueue {
    client: std::sync::Arc<RedpandaClient>,
    topic: String,
}

impl ReservationQueue {
    pub fn new(client: std::sync::Arc<RedpandaClient>, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl ReservationPublisher for ReservationQueue {
    async fn publish(&self, message: &ReservationMessage) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(message)?;
        let key = message.order_id.to_string();

        self.client.publish(&self.topic, &key, &payload).await
    }
}
