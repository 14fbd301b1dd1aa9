use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::WebhookConfig;
use crate::notifications::{DeliveryRequest, DeliveryScheduler, NotificationError};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

// ============================================================================
// Delivery Webhook Client
// ============================================================================
//
// POSTs the delivery request as JSON. Any 2xx is success and the body is
// never read. 429 and 5xx are transient; other statuses are permanent.
//
// ============================================================================

pub struct DeliveryWebhookClient {
    client: Client,
    url: String,
    circuit_breaker: CircuitBreaker,
}

impl DeliveryWebhookClient {
    pub fn new(config: &WebhookConfig) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            circuit_breaker: CircuitBreaker::new("delivery_webhook", CircuitBreakerConfig::default()),
        })
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    async fn post(&self, request: &DeliveryRequest) -> Result<(), NotificationError> {
        let response = self.client.post(&self.url).json(request).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            tracing::warn!(url = %self.url, status = %status, "Delivery webhook returned retryable status");
        } else {
            tracing::error!(url = %self.url, status = %status, "Delivery webhook rejected request");
        }

        Err(NotificationError::Webhook { status: status.as_u16() })
    }
}

#[async_trait]
impl DeliveryScheduler for DeliveryWebhookClient {
    async fn schedule(&self, request: &DeliveryRequest) -> Result<(), NotificationError> {
        match self.circuit_breaker.call(self.post(request)).await {
            Ok(()) => {
                tracing::debug!(order_id = %request.order_id, "Delivery scheduled");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                Err(NotificationError::CircuitOpen(self.circuit_breaker.name().to_string()))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
        }
    }
}
