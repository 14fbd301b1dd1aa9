use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::errors::RepositoryError;
use crate::domain::order::OrderId;

// ============================================================================
// Outbox Entries
// ============================================================================
//
// One entry per (order, channel), written in the same transaction as the
// order.
//
//   Pending ──claim──> InFlight ──> Delivered
//      ^                  │  └────> DeadLettered
//      └── failure ───────┘
//
// Only the holder of a claim sends. A claim older than the dispatcher's
// claim timeout is treated as abandoned and can be taken again.
//
// ============================================================================

/// Downstream system notified about a new order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationChannel {
    /// Queue message for the reservation/inventory subsystem
    Reservations,
    /// Webhook call for the delivery-scheduling subsystem
    Delivery,
}

impl NotificationChannel {
    pub const ALL: [NotificationChannel; 2] = [NotificationChannel::Reservations, NotificationChannel::Delivery];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Reservations => "reservations",
            NotificationChannel::Delivery => "delivery",
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationChannel {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reservations" => Ok(NotificationChannel::Reservations),
            "delivery" => Ok(NotificationChannel::Delivery),
            other => Err(RepositoryError::Corrupt(format!("unknown notification channel '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    Pending,
    /// Claimed by a sender
    InFlight,
    Delivered,
    DeadLettered,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::InFlight => "in_flight",
            OutboxStatus::Delivered => "delivered",
            OutboxStatus::DeadLettered => "dead_lettered",
        }
    }
}

impl FromStr for OutboxStatus {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "in_flight" => Ok(OutboxStatus::InFlight),
            "delivered" => Ok(OutboxStatus::Delivered),
            "dead_lettered" => Ok(OutboxStatus::DeadLettered),
            other => Err(RepositoryError::Corrupt(format!("unknown outbox status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub order_id: OrderId,
    pub channel: NotificationChannel,
    pub status: OutboxStatus,
    /// Failed delivery passes so far
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    /// Fresh pending entry; v7 ids sort by creation time
    pub fn pending(order_id: OrderId, channel: NotificationChannel) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_id,
            channel,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            claimed_at: None,
        }
    }

    /// Pending, or in flight under a claim taken before `stale_before`
    pub fn is_claimable(&self, stale_before: DateTime<Utc>) -> bool {
        match self.status {
            OutboxStatus::Pending => true,
            OutboxStatus::InFlight => self.claimed_at.is_some_and(|at| at < stale_before),
            OutboxStatus::Delivered | OutboxStatus::DeadLettered => false,
        }
    }
}

/// Read/update side of the outbox; entries are created by `OrderRepository::add`.
///
/// The three settle operations only act on `InFlight` entries and are
/// no-ops on anything else.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Oldest pending entries first, without claiming them
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxEntry>, RepositoryError>;

    /// Claim up to `limit` claimable entries, oldest first
    async fn claim_pending(
        &self,
        limit: usize,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<OutboxEntry>, RepositoryError>;

    /// Claim the pending entries of one order
    async fn claim_for_order(&self, order_id: OrderId) -> Result<Vec<OutboxEntry>, RepositoryError>;

    async fn mark_delivered(&self, entry_id: Uuid) -> Result<(), RepositoryError>;

    /// Release the claim after a failed send; returns the new attempt count,
    /// or `None` if the entry was no longer in flight
    async fn record_failure(&self, entry_id: Uuid, error: &str) -> Result<Option<i32>, RepositoryError>;

    /// Give up on the entry; it will not be dispatched again
    async fn mark_dead_lettered(&self, entry_id: Uuid, error: &str) -> Result<(), RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_round_trips_through_storage_name() {
        for channel in NotificationChannel::ALL {
            let parsed: NotificationChannel = channel.as_str().parse().unwrap();
            assert_eq!(parsed, channel);
        }
    }

    #[test]
    fn test_unknown_status_is_corrupt() {
        let result = "archived".parse::<OutboxStatus>();
        assert!(matches!(result, Err(RepositoryError::Corrupt(_))));
    }

    #[test]
    fn test_pending_entry_defaults() {
        let entry = OutboxEntry::pending(OrderId(5), NotificationChannel::Delivery);

        assert_eq!(entry.status, OutboxStatus::Pending);
        assert_eq!(entry.attempts, 0);
        assert!(entry.last_error.is_none());
        assert!(entry.claimed_at.is_none());
    }

    #[test]
    fn test_only_stale_claims_are_claimable_again() {
        let now = Utc::now();
        let mut entry = OutboxEntry::pending(OrderId(5), NotificationChannel::Delivery);
        assert!(entry.is_claimable(now));

        entry.status = OutboxStatus::InFlight;
        entry.claimed_at = Some(now);
        assert!(!entry.is_claimable(now - chrono::Duration::seconds(60)));
        assert!(entry.is_claimable(now + chrono::Duration::seconds(1)));

        entry.status = OutboxStatus::Delivered;
        assert!(!entry.is_claimable(now + chrono::Duration::seconds(1)));
    }
}
