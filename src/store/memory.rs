use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::errors::RepositoryError;
use crate::domain::order::{Order, OrderId, OrderItemId, OrderRepository};
use crate::domain::{Basket, BasketId, BasketRepository, CatalogItem, CatalogItemId, CatalogRepository};
use crate::outbox::{NotificationChannel, OutboxEntry, OutboxStatus, OutboxStore};

// ============================================================================
// Baskets and catalog - read-only, seeded at construction
// ============================================================================

pub struct InMemoryBasketStore {
    baskets: HashMap<BasketId, Basket>,
    fetches: AtomicUsize,
}

impl InMemoryBasketStore {
    pub fn new(baskets: impl IntoIterator<Item = Basket>) -> Self {
        Self {
            baskets: baskets.into_iter().map(|b| (b.id, b)).collect(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BasketRepository for InMemoryBasketStore {
    async fn get_with_items(&self, id: BasketId) -> Result<Option<Basket>, RepositoryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.baskets.get(&id).cloned())
    }
}

pub struct InMemoryCatalogStore {
    items: HashMap<CatalogItemId, CatalogItem>,
    fetches: AtomicUsize,
}

impl InMemoryCatalogStore {
    pub fn new(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.id, i)).collect(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of `list_by_ids` calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogStore {
    async fn list_by_ids(&self, ids: &BTreeSet<CatalogItemId>) -> Result<Vec<CatalogItem>, RepositoryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(ids.iter().filter_map(|id| self.items.get(id).cloned()).collect())
    }
}

// ============================================================================
// Orders and outbox - one lock, so `add` is all-or-nothing
// ============================================================================

#[derive(Default)]
struct OrderTables {
    next_id: i64,
    next_item_id: i64,
    orders: BTreeMap<OrderId, Order>,
    outbox: Vec<OutboxEntry>,
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    tables: Mutex<OrderTables>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `add` fail as if the database were down
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful `add` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.tables.lock().await.orders.values().cloned().collect()
    }

    pub async fn outbox_entries(&self) -> Vec<OutboxEntry> {
        self.tables.lock().await.outbox.clone()
    }

    /// Insert an outbox entry directly, bypassing `add`
    pub async fn push_entry(&self, entry: OutboxEntry) {
        self.tables.lock().await.outbox.push(entry);
    }

    /// Remove an order while leaving its outbox entries behind
    pub async fn remove_order(&self, id: OrderId) {
        self.tables.lock().await.orders.remove(&id);
    }

    /// Apply `update` if the entry is in flight; returns its attempt count afterwards
    async fn settle<F>(&self, entry_id: Uuid, update: F) -> Result<Option<i32>, RepositoryError>
    where
        F: FnOnce(&mut OutboxEntry),
    {
        let mut tables = self.tables.lock().await;

        let entry = tables
            .outbox
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| RepositoryError::Corrupt(format!("unknown outbox entry {entry_id}")))?;

        if entry.status != OutboxStatus::InFlight {
            return Ok(None);
        }

        update(entry);
        Ok(Some(entry.attempts))
    }

    async fn claim_where<P>(&self, limit: usize, claimable: P) -> Vec<OutboxEntry>
    where
        P: Fn(&OutboxEntry) -> bool,
    {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        let mut candidates: Vec<&mut OutboxEntry> = tables.outbox.iter_mut().filter(|e| claimable(e)).collect();
        candidates.sort_by_key(|e| (e.created_at, e.id));

        candidates
            .into_iter()
            .take(limit)
            .map(|entry| {
                entry.status = OutboxStatus::InFlight;
                entry.claimed_at = Some(now);
                entry.clone()
            })
            .collect()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderStore {
    async fn add(&self, order: Order, notifications: &[NotificationChannel]) -> Result<Order, RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("order store rejected the write".to_string()));
        }

        let mut tables = self.tables.lock().await;

        tables.next_id += 1;
        let id = OrderId(tables.next_id);

        let mut item_ids = Vec::with_capacity(order.items().len());
        for _ in order.items() {
            tables.next_item_id += 1;
            item_ids.push(OrderItemId(tables.next_item_id));
        }
        let saved = order.with_id(id).with_item_ids(item_ids);

        tables.orders.insert(id, saved.clone());
        for channel in notifications {
            tables.outbox.push(OutboxEntry::pending(id, *channel));
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(saved)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }
}

#[async_trait]
impl OutboxStore for InMemoryOrderStore {
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxEntry>, RepositoryError> {
        let tables = self.tables.lock().await;

        let mut pending: Vec<OutboxEntry> = tables
            .outbox
            .iter()
            .filter(|e| e.status == OutboxStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|e| (e.created_at, e.id));
        pending.truncate(limit);

        Ok(pending)
    }

    async fn claim_pending(
        &self,
        limit: usize,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<OutboxEntry>, RepositoryError> {
        Ok(self.claim_where(limit, |e| e.is_claimable(stale_before)).await)
    }

    async fn claim_for_order(&self, order_id: OrderId) -> Result<Vec<OutboxEntry>, RepositoryError> {
        Ok(self
            .claim_where(usize::MAX, |e| e.order_id == order_id && e.status == OutboxStatus::Pending)
            .await)
    }

    async fn mark_delivered(&self, entry_id: Uuid) -> Result<(), RepositoryError> {
        self.settle(entry_id, |e| {
            e.status = OutboxStatus::Delivered;
            e.claimed_at = None;
        })
        .await
        .map(|_| ())
    }

    async fn record_failure(&self, entry_id: Uuid, error: &str) -> Result<Option<i32>, RepositoryError> {
        self.settle(entry_id, |e| {
            e.status = OutboxStatus::Pending;
            e.claimed_at = None;
            e.attempts += 1;
            e.last_error = Some(error.to_string());
        })
        .await
    }

    async fn mark_dead_lettered(&self, entry_id: Uuid, error: &str) -> Result<(), RepositoryError> {
        self.settle(entry_id, |e| {
            e.status = OutboxStatus::DeadLettered;
            e.claimed_at = None;
            e.attempts += 1;
            e.last_error = Some(error.to_string());
        })
        .await
        .map(|_| ())
    }
}
