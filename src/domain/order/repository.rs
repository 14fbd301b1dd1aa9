use async_trait::async_trait;

use crate::domain::errors::RepositoryError;
use crate::outbox::NotificationChannel;
use super::aggregate::Order;
use super::value_objects::OrderId;

/// Durable order storage.
///
/// `add` is the single write of a checkout: the order, its items and one
/// pending outbox entry per requested channel commit together or not at all.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Store a new order and enqueue its notifications; returns the order with its identity
    async fn add(&self, order: Order, notifications: &[NotificationChannel]) -> Result<Order, RepositoryError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;
}
