use std::str::FromStr;
use std::time::Duration;

use crate::outbox::DispatcherConfig;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Read once from the environment at startup. Only the database URL and the
// delivery webhook URL are required; everything else has a default.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub reservations_topic: String,
    pub message_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub kafka: KafkaConfig,
    pub webhook: WebhookConfig,
    pub catalog_base_url: String,
    pub outbox: DispatcherConfig,
    /// Send notifications during checkout as well as from the dispatcher
    pub inline_notifications: bool,
    pub metrics_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let webhook_url = env.required("DELIVERY_WEBHOOK_URL")?;
        if !(webhook_url.starts_with("http://") || webhook_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "DELIVERY_WEBHOOK_URL",
                value: webhook_url,
                reason: "must be an http(s) URL".to_string(),
            });
        }

        Ok(Self {
            database_url: env.required("DATABASE_URL")?,
            database_max_connections: env.parsed("DATABASE_MAX_CONNECTIONS", 10)?,
            kafka: KafkaConfig {
                brokers: env.or("KAFKA_BROKERS", "localhost:9092"),
                reservations_topic: env.or("RESERVATIONS_TOPIC", "reservations"),
                message_timeout: Duration::from_millis(env.parsed("KAFKA_MESSAGE_TIMEOUT_MS", 5000)?),
            },
            webhook: WebhookConfig {
                url: webhook_url,
                timeout: Duration::from_secs(env.parsed("WEBHOOK_TIMEOUT_SECS", 10)?),
            },
            catalog_base_url: env.or("CATALOG_BASE_URL", "http://localhost:5106"),
            outbox: DispatcherConfig {
                poll_interval: Duration::from_millis(env.parsed("OUTBOX_POLL_INTERVAL_MS", 1000)?),
                batch_size: env.parsed("OUTBOX_BATCH_SIZE", 100)?,
                max_attempts: env.parsed("OUTBOX_MAX_ATTEMPTS", 5)?,
                claim_timeout: Duration::from_secs(env.parsed("OUTBOX_CLAIM_TIMEOUT_SECS", 300)?),
            },
            inline_notifications: env.parsed("INLINE_NOTIFICATIONS", false)?,
            metrics_port: env.parsed("METRICS_PORT", 9090)?,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/orders"),
        ("DELIVERY_WEBHOOK_URL", "https://delivery.example.com/api/schedule"),
    ];

    #[test]
    fn test_defaults_apply() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.kafka.brokers, "localhost:9092");
        assert_eq!(config.kafka.reservations_topic, "reservations");
        assert_eq!(config.webhook.timeout, Duration::from_secs(10));
        assert_eq!(config.outbox.batch_size, 100);
        assert_eq!(config.outbox.max_attempts, 5);
        assert_eq!(config.outbox.claim_timeout, Duration::from_secs(300));
        assert_eq!(config.metrics_port, 9090);
        assert!(!config.inline_notifications);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("RESERVATIONS_TOPIC", "order-reservations"),
            ("OUTBOX_POLL_INTERVAL_MS", "250"),
            ("OUTBOX_MAX_ATTEMPTS", "8"),
            ("OUTBOX_CLAIM_TIMEOUT_SECS", "45"),
            ("INLINE_NOTIFICATIONS", "true"),
        ]);

        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.kafka.reservations_topic, "order-reservations");
        assert_eq!(config.outbox.poll_interval, Duration::from_millis(250));
        assert_eq!(config.outbox.max_attempts, 8);
        assert_eq!(config.outbox.claim_timeout, Duration::from_secs(45));
        assert!(config.inline_notifications);
    }

    #[test]
    fn test_missing_database_url() {
        let result = AppConfig::from_lookup(lookup(&REQUIRED[1..]));
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("METRICS_PORT", "ninety"));

        let result = AppConfig::from_lookup(lookup(&pairs));

        assert!(matches!(result, Err(ConfigError::Invalid { key: "METRICS_PORT", .. })));
    }

    #[test]
    fn test_webhook_url_must_be_http() {
        let pairs = [
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("DELIVERY_WEBHOOK_URL", "ftp://delivery"),
        ];

        let result = AppConfig::from_lookup(lookup(&pairs));

        assert!(matches!(result, Err(ConfigError::Invalid { key: "DELIVERY_WEBHOOK_URL", .. })));
    }
}
