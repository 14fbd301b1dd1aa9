use actix::prelude::*;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_checkout::actors::{CoordinatorActor, Shutdown};
use order_checkout::config::AppConfig;
use order_checkout::domain::order::{Address, CreateOrder, Money, OrderService};
use order_checkout::domain::{Basket, BasketId, BasketItem, CatalogItem, CatalogItemId, CatalogUriComposer};
use order_checkout::messaging::{DeliveryWebhookClient, RedpandaClient, ReservationQueue};
use order_checkout::metrics::{self, Metrics};
use order_checkout::notifications::Notifier;
use order_checkout::outbox::OutboxDispatcher;
use order_checkout::store::{InMemoryBasketStore, InMemoryCatalogStore, PgOrderStore};

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_checkout=debug"))
        )
        .init();

    tracing::info!("🚀 Starting order checkout service");

    let config = AppConfig::from_env()?;

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // Start metrics HTTP server in its own actix system
    let server_metrics = metrics.clone();
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let result = actix::System::new().block_on(metrics::start_metrics_server(server_metrics, metrics_port));
        if let Err(e) = result {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 2. Order store (orders + outbox) ===
    tracing::info!("Connecting to PostgreSQL...");
    let orders = Arc::new(PgOrderStore::connect(&config.database_url, config.database_max_connections).await?);
    orders.ensure_schema().await?;

    // Baskets and catalog are owned elsewhere; seed a demo basket locally
    let baskets = Arc::new(InMemoryBasketStore::new(vec![Basket::new(
        BasketId(42),
        "demo-buyer",
        vec![
            BasketItem::new(CatalogItemId(1), Money::from_cents(999), 2),
            BasketItem::new(CatalogItemId(2), Money::from_cents(450), 1),
        ],
    )]));
    let catalog = Arc::new(InMemoryCatalogStore::new(vec![
        CatalogItem::new(CatalogItemId(1), "Widget", "http://catalogbaseurltobereplaced/images/products/1.png"),
        CatalogItem::new(CatalogItemId(2), "Gadget", "http://catalogbaseurltobereplaced/images/products/2.png"),
    ]));

    // === 3. Transport clients (with circuit breakers), created once ===
    let redpanda = Arc::new(RedpandaClient::new(&config.kafka)?);
    let webhook = Arc::new(DeliveryWebhookClient::new(&config.webhook)?);
    let breakers = vec![
        redpanda.circuit_breaker().clone(),
        webhook.circuit_breaker().clone(),
    ];

    let notifier = Arc::new(
        Notifier::new(
            Arc::new(ReservationQueue::new(redpanda.clone(), config.kafka.reservations_topic.clone())),
            webhook.clone(),
        )
        .with_metrics(metrics.clone()),
    );

    // === 4. Outbox dispatcher under the coordinator ===
    let dispatcher = Arc::new(
        OutboxDispatcher::new(orders.clone(), orders.clone(), notifier, config.outbox.clone())
            .with_metrics(metrics.clone()),
    );

    tracing::info!("Starting coordinator actor with supervision");
    let coordinator = CoordinatorActor::new(dispatcher.clone(), breakers)
        .with_metrics(metrics.clone())
        .start();

    // === 5. Checkout service ===
    let mut service = OrderService::new(
        baskets,
        catalog,
        orders.clone(),
        Arc::new(CatalogUriComposer::new(config.catalog_base_url.clone())),
    )
    .with_metrics(metrics.clone());
    if config.inline_notifications {
        service = service.with_inline_notifications(dispatcher);
    }

    // === 6. Demo checkout ===
    let basket_id = BasketId(42);
    tracing::info!(basket_id = %basket_id, "📝 Checking out demo basket");
    let address = Address::new("123 Main St.", "Kent", "OH", "United States", "44240");
    match service.create_order(CreateOrder::new(basket_id, address)).await {
        Ok(order) => tracing::info!(order_id = ?order.id(), total = %order.total(), "✅ Demo order placed"),
        Err(e) => tracing::error!(error = %e, stage = e.stage().as_str(), "Demo checkout failed"),
    }

    // Keep the dispatcher running until interrupted
    tracing::info!("⏳ Dispatching notifications; press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    if let Err(e) = coordinator.send(Shutdown).await? {
        tracing::error!("Shutdown failed: {}", e);
    }

    tracing::info!("🎉 Shutdown complete");

    Ok(())
}
