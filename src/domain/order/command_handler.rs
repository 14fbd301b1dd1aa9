use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::domain::basket::{BasketId, BasketRepository};
use crate::domain::catalog::{CatalogRepository, PictureUriResolver};
use crate::metrics::Metrics;
use crate::outbox::{NotificationChannel, OutboxDispatcher};

use super::aggregate::Order;
use super::commands::CreateOrder;
use super::errors::{CheckoutError, OrderAssemblyError};
use super::repository::OrderRepository;
use super::value_objects::{Address, CatalogItemOrdered, OrderItem};

// ============================================================================
// Order Service - checkout orchestration
// ============================================================================
//
// CreateOrder: Basket → Assembly → Persistence (order + outbox) → [inline fan-out]
//
// Notifications are normally sent by the outbox dispatcher's passes. With
// inline notifications enabled the service asks the dispatcher to claim and
// send the new order's entries right after the write; whatever fails is
// left to later passes.
//
// ============================================================================

pub struct OrderService {
    baskets: Arc<dyn BasketRepository>,
    catalog: Arc<dyn CatalogRepository>,
    orders: Arc<dyn OrderRepository>,
    uri_composer: Arc<dyn PictureUriResolver>,
    inline: Option<Arc<OutboxDispatcher>>,
    metrics: Option<Arc<Metrics>>,
}

impl OrderService {
    pub fn new(
        baskets: Arc<dyn BasketRepository>,
        catalog: Arc<dyn CatalogRepository>,
        orders: Arc<dyn OrderRepository>,
        uri_composer: Arc<dyn PictureUriResolver>,
    ) -> Self {
        Self {
            baskets,
            catalog,
            orders,
            uri_composer,
            inline: None,
            metrics: None,
        }
    }

    /// Send notifications during `create_order` instead of waiting for the next pass
    pub fn with_inline_notifications(mut self, dispatcher: Arc<OutboxDispatcher>) -> Self {
        self.inline = Some(dispatcher);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Check out a basket: assemble, persist, and (inline mode) notify.
    ///
    /// Returns the persisted order. Notification outcomes never fail the
    /// checkout; undelivered notifications remain in the outbox.
    pub async fn create_order(&self, command: CreateOrder) -> Result<Order, CheckoutError> {
        let basket_id = command.basket_id;

        let result = self.checkout(command).await;

        match &result {
            Ok(order) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.record_order_created();
                }
                tracing::info!(
                    basket_id = %basket_id,
                    order_id = ?order.id(),
                    items = order.items().len(),
                    total = %order.total(),
                    "✅ Order created"
                );
            }
            Err(e) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.record_checkout_failure(e.stage().as_str());
                }
                if e.is_client_error() {
                    tracing::warn!(basket_id = %basket_id, error = %e, "Checkout rejected");
                } else {
                    tracing::error!(
                        basket_id = %basket_id,
                        stage = e.stage().as_str(),
                        error = %e,
                        "❌ Checkout failed"
                    );
                }
            }
        }

        result
    }

    async fn checkout(&self, command: CreateOrder) -> Result<Order, CheckoutError> {
        let order = self.assemble_order(command.basket_id, command.shipping_address).await?;
        let order = self.persist_order(order).await?;

        if let Some(ref dispatcher) = self.inline {
            notify_inline(dispatcher, &order).await;
        }

        Ok(order)
    }

    /// Build the order snapshot from a basket; nothing is written
    pub async fn assemble_order(
        &self,
        basket_id: BasketId,
        shipping_address: Address,
    ) -> Result<Order, OrderAssemblyError> {
        let basket = self
            .baskets
            .get_with_items(basket_id)
            .await?
            .ok_or(OrderAssemblyError::BasketNotFound(basket_id))?;

        if basket.is_empty() {
            return Err(OrderAssemblyError::EmptyBasket(basket_id));
        }

        let ids: BTreeSet<_> = basket.items.iter().map(|i| i.catalog_item_id).collect();
        let catalog: HashMap<_, _> = self
            .catalog
            .list_by_ids(&ids)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        tracing::debug!(
            basket_id = %basket_id,
            lines = basket.items.len(),
            distinct_items = ids.len(),
            found = catalog.len(),
            "Catalog items loaded"
        );

        let mut items = Vec::with_capacity(basket.items.len());
        for line in &basket.items {
            let catalog_item = catalog.get(&line.catalog_item_id).ok_or(
                OrderAssemblyError::CatalogItemMissing {
                    basket_id,
                    catalog_item_id: line.catalog_item_id,
                },
            )?;

            let ordered = CatalogItemOrdered::new(
                catalog_item.id,
                catalog_item.name.clone(),
                self.uri_composer.compose(&catalog_item.picture_uri),
            );
            let item = OrderItem::new(ordered, line.unit_price, line.quantity)
                .map_err(|source| OrderAssemblyError::InvalidOrderItem { basket_id, source })?;

            items.push(item);
        }

        Order::new(basket.buyer_id, shipping_address, items)
            .map_err(|source| OrderAssemblyError::InvalidOrderItem { basket_id, source })
    }

    /// Store the order with one pending outbox entry per channel
    pub async fn persist_order(&self, order: Order) -> Result<Order, CheckoutError> {
        self.orders
            .add(order, &NotificationChannel::ALL)
            .await
            .map_err(CheckoutError::Persistence)
    }
}

async fn notify_inline(dispatcher: &OutboxDispatcher, order: &Order) {
    match dispatcher.dispatch_order(order).await {
        Ok(report) => tracing::debug!(
            order_id = ?order.id(),
            delivered = report.delivered,
            retried = report.retried,
            dead_lettered = report.dead_lettered,
            "Inline notifications done"
        ),
        Err(e) => tracing::warn!(
            order_id = ?order.id(),
            error = %e,
            "Inline notifications skipped; entries stay pending"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{CatalogItem, CatalogItemId, CatalogUriComposer};
    use crate::domain::order::{Money, OrderError, OrderId};
    use crate::domain::{Basket, BasketItem};
    use crate::domain::order::OrderItemId;
    use crate::notifications::{InMemoryDeliveryScheduler, InMemoryReservationQueue, ItemUnits, Notifier};
    use crate::outbox::{DispatcherConfig, OutboxStatus, OutboxStore};
    use crate::store::{InMemoryBasketStore, InMemoryCatalogStore, InMemoryOrderStore};
    use crate::utils::RetryConfig;

    struct Fixture {
        baskets: Arc<InMemoryBasketStore>,
        catalog: Arc<InMemoryCatalogStore>,
        orders: Arc<InMemoryOrderStore>,
        queue: Arc<InMemoryReservationQueue>,
        webhook: Arc<InMemoryDeliveryScheduler>,
    }

    impl Fixture {
        fn new(baskets: Vec<Basket>) -> Self {
            Self {
                baskets: Arc::new(InMemoryBasketStore::new(baskets)),
                catalog: Arc::new(InMemoryCatalogStore::new(vec![
                    CatalogItem::new(CatalogItemId(1), "Widget", "http://catalogbaseurltobereplaced/images/products/1.png"),
                    CatalogItem::new(CatalogItemId(2), "Gadget", "http://catalogbaseurltobereplaced/images/products/2.png"),
                ])),
                orders: Arc::new(InMemoryOrderStore::new()),
                queue: Arc::new(InMemoryReservationQueue::new()),
                webhook: Arc::new(InMemoryDeliveryScheduler::new()),
            }
        }

        fn service(&self) -> OrderService {
            OrderService::new(
                self.baskets.clone(),
                self.catalog.clone(),
                self.orders.clone(),
                Arc::new(CatalogUriComposer::new("https://cdn.example.com")),
            )
        }

        fn inline_service(&self) -> OrderService {
            let notifier = Notifier::new(self.queue.clone(), self.webhook.clone())
                .with_retry(RetryConfig::no_retry(), RetryConfig::no_retry());
            let dispatcher = OutboxDispatcher::new(
                self.orders.clone(),
                self.orders.clone(),
                Arc::new(notifier),
                DispatcherConfig::default(),
            );
            self.service().with_inline_notifications(Arc::new(dispatcher))
        }
    }

    fn address() -> Address {
        Address::new("1 Main St", "Redmond", "WA", "US", "98052")
    }

    fn basket_42() -> Basket {
        Basket::new(
            BasketId(42),
            "buyer-1",
            vec![
                BasketItem::new(CatalogItemId(1), Money::from_cents(999), 2),
                BasketItem::new(CatalogItemId(2), Money::from_cents(450), 1),
            ],
        )
    }

    #[tokio::test]
    async fn test_checkout_builds_and_persists_order() {
        let fx = Fixture::new(vec![basket_42()]);

        let order = fx.service().create_order(CreateOrder::new(BasketId(42), address())).await.unwrap();

        assert_eq!(order.id(), Some(OrderId(1)));
        assert_eq!(order.buyer_id(), "buyer-1");
        assert_eq!(order.ship_to_address(), &address());
        assert_eq!(order.total(), Money::from_cents(2448));
        assert_eq!(order.total().to_string(), "24.48");

        let names: Vec<_> = order.items().iter().map(|i| i.item_ordered().product_name()).collect();
        assert_eq!(names, vec!["Widget", "Gadget"]);
        assert_eq!(
            order.items()[0].item_ordered().picture_uri(),
            "https://cdn.example.com/images/products/1.png"
        );
        assert_eq!(fx.catalog.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_checkout_enqueues_one_entry_per_channel() {
        let fx = Fixture::new(vec![basket_42()]);

        let order = fx.service().create_order(CreateOrder::new(BasketId(42), address())).await.unwrap();

        let entries = fx.orders.outbox_entries().await;
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.order_id == OrderId(1) && e.status == OutboxStatus::Pending));
        assert!(order.id().is_some());
        // nothing is sent without inline notifications
        assert_eq!(fx.queue.attempts(), 0);
    }

    #[tokio::test]
    async fn test_inline_checkout_sends_and_marks_delivered() {
        let fx = Fixture::new(vec![basket_42()]);

        fx.inline_service().create_order(CreateOrder::new(BasketId(42), address())).await.unwrap();

        let sent = fx.queue.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].order_id, OrderId(1));
        assert_eq!(
            sent[0].items,
            vec![
                ItemUnits { id: OrderItemId(1), units: 2 },
                ItemUnits { id: OrderItemId(2), units: 1 },
            ]
        );
        assert_eq!(fx.webhook.received().await[0].address, address());

        let entries = fx.orders.outbox_entries().await;
        assert!(entries.iter().all(|e| e.status == OutboxStatus::Delivered));
    }

    #[tokio::test]
    async fn test_inline_webhook_failure_keeps_checkout_successful() {
        let fx = Fixture::new(vec![basket_42()]);
        fx.webhook.fail_next_with_status(1, 503);

        let order = fx.inline_service().create_order(CreateOrder::new(BasketId(42), address())).await;

        assert!(order.is_ok());
        let pending = fx.orders.pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].channel, NotificationChannel::Delivery);
        assert_eq!(pending[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_empty_basket_is_rejected_before_catalog_and_write() {
        let fx = Fixture::new(vec![Basket::new(BasketId(7), "buyer-2", vec![])]);

        let result = fx.inline_service().create_order(CreateOrder::new(BasketId(7), address())).await;

        let err = result.unwrap_err();
        assert!(matches!(err, CheckoutError::Assembly(OrderAssemblyError::EmptyBasket(BasketId(7)))));
        assert!(err.is_client_error());
        assert_eq!(fx.catalog.fetch_count(), 0);
        assert_eq!(fx.orders.write_count(), 0);
        assert_eq!(fx.queue.attempts(), 0);
        assert_eq!(fx.webhook.attempts(), 0);
    }

    #[tokio::test]
    async fn test_unknown_basket_is_rejected() {
        let fx = Fixture::new(vec![]);

        let err = fx.service().create_order(CreateOrder::new(BasketId(99), address())).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Assembly(OrderAssemblyError::BasketNotFound(BasketId(99)))));
        assert_eq!(fx.catalog.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_catalog_item_fails_assembly() {
        let basket = Basket::new(
            BasketId(5),
            "buyer-3",
            vec![
                BasketItem::new(CatalogItemId(1), Money::from_cents(999), 1),
                BasketItem::new(CatalogItemId(77), Money::from_cents(100), 1),
            ],
        );
        let fx = Fixture::new(vec![basket]);

        let err = fx.service().create_order(CreateOrder::new(BasketId(5), address())).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Assembly(OrderAssemblyError::CatalogItemMissing {
                catalog_item_id: CatalogItemId(77),
                ..
            })
        ));
        assert_eq!(err.stage(), crate::domain::order::CheckoutStage::Assembly);
        assert_eq!(fx.orders.write_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_quantity_fails_assembly() {
        let basket = Basket::new(
            BasketId(6),
            "buyer-4",
            vec![BasketItem::new(CatalogItemId(1), Money::from_cents(999), 0)],
        );
        let fx = Fixture::new(vec![basket]);

        let err = fx.service().create_order(CreateOrder::new(BasketId(6), address())).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Assembly(OrderAssemblyError::InvalidOrderItem {
                source: OrderError::InvalidQuantity(0),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_lines_fetch_catalog_once() {
        let basket = Basket::new(
            BasketId(8),
            "buyer-5",
            vec![
                BasketItem::new(CatalogItemId(2), Money::from_cents(450), 1),
                BasketItem::new(CatalogItemId(1), Money::from_cents(999), 1),
                BasketItem::new(CatalogItemId(2), Money::from_cents(400), 3),
            ],
        );
        let fx = Fixture::new(vec![basket]);

        let order = fx.service().create_order(CreateOrder::new(BasketId(8), address())).await.unwrap();

        assert_eq!(fx.catalog.fetch_count(), 1);
        let lines: Vec<_> = order
            .items()
            .iter()
            .map(|i| (i.item_ordered().catalog_item_id().0, i.unit_price().cents(), i.units()))
            .collect();
        assert_eq!(lines, vec![(2, 450, 1), (1, 999, 1), (2, 400, 3)]);
    }

    #[tokio::test]
    async fn test_repeated_catalog_item_is_announced_per_order_line() {
        let basket = Basket::new(
            BasketId(9),
            "buyer-6",
            vec![
                BasketItem::new(CatalogItemId(2), Money::from_cents(450), 1),
                BasketItem::new(CatalogItemId(2), Money::from_cents(400), 3),
            ],
        );
        let fx = Fixture::new(vec![basket]);

        let order = fx.inline_service().create_order(CreateOrder::new(BasketId(9), address())).await.unwrap();

        let line_ids: Vec<_> = order.items().iter().map(|i| i.id().unwrap()).collect();
        assert_eq!(line_ids, vec![OrderItemId(1), OrderItemId(2)]);

        let expected = vec![
            ItemUnits { id: OrderItemId(1), units: 1 },
            ItemUnits { id: OrderItemId(2), units: 3 },
        ];
        assert_eq!(fx.queue.sent().await[0].items, expected);
        assert_eq!(fx.webhook.received().await[0].items, expected);
    }

    #[tokio::test]
    async fn test_overflowing_basket_fails_assembly() {
        let basket = Basket::new(
            BasketId(10),
            "buyer-7",
            vec![BasketItem::new(CatalogItemId(1), Money::from_cents(i64::MAX / 2), 3)],
        );
        let fx = Fixture::new(vec![basket]);

        let err = fx.service().create_order(CreateOrder::new(BasketId(10), address())).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Assembly(OrderAssemblyError::InvalidOrderItem {
                source: OrderError::AmountOverflow,
                ..
            })
        ));
        assert_eq!(fx.orders.write_count(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_sends_nothing() {
        let fx = Fixture::new(vec![basket_42()]);
        fx.orders.fail_writes(true);

        let err = fx.inline_service().create_order(CreateOrder::new(BasketId(42), address())).await.unwrap_err();

        assert_eq!(err.stage(), crate::domain::order::CheckoutStage::Persistence);
        assert!(fx.orders.outbox_entries().await.is_empty());
        assert_eq!(fx.queue.attempts(), 0);
        assert_eq!(fx.webhook.attempts(), 0);
    }
}
