use actix::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::{HealthStatus, StopActor};
use crate::outbox::{DispatchError, DispatchReport, OutboxDispatcher};
use super::{HealthMonitorActor, UpdateHealth};

// ============================================================================
// Outbox Dispatcher Actor - drives dispatch passes on a timer
// ============================================================================
//
// Runs `dispatch_pending` every poll interval. A tick that fires while the
// previous pass is still running is skipped. `DispatchNow` runs a pass on
// demand; the dispatcher itself serializes passes.
//
// ============================================================================

const COMPONENT: &str = "outbox_dispatcher";

/// Consecutive failed passes before the dispatcher reports itself unhealthy
const UNHEALTHY_AFTER: u32 = 3;

#[derive(Message)]
#[rtype(result = "Result<DispatchReport, DispatchError>")]
pub struct DispatchNow;

pub struct OutboxDispatcherActor {
    dispatcher: Arc<OutboxDispatcher>,
    poll_interval: Duration,
    health_monitor: Option<Addr<HealthMonitorActor>>,
    pass_running: bool,
    consecutive_failures: u32,
}

impl OutboxDispatcherActor {
    pub fn new(dispatcher: Arc<OutboxDispatcher>) -> Self {
        let poll_interval = dispatcher.config().poll_interval;
        Self {
            dispatcher,
            poll_interval,
            health_monitor: None,
            pass_running: false,
            consecutive_failures: 0,
        }
    }

    pub fn with_health_monitor(mut self, health_monitor: Addr<HealthMonitorActor>) -> Self {
        self.health_monitor = Some(health_monitor);
        self
    }

    fn run_pass(&mut self, ctx: &mut Context<Self>) {
        if self.pass_running {
            tracing::debug!("Previous outbox pass still running, skipping tick");
            return;
        }
        self.pass_running = true;

        let dispatcher = self.dispatcher.clone();
        let pass = async move { dispatcher.dispatch_pending().await };

        ctx.spawn(pass.into_actor(self).map(|result, act, _ctx| {
            act.pass_running = false;
            act.pass_finished(&result);
        }));
    }

    fn pass_finished(&mut self, result: &Result<DispatchReport, DispatchError>) {
        let (status, details) = match result {
            Ok(report) if report.failed > 0 => {
                self.consecutive_failures = 0;
                let message = format!("{} entries could not be settled in last pass", report.failed);
                (HealthStatus::Degraded(message), None)
            }
            Ok(report) => {
                self.consecutive_failures = 0;
                let details = (report.dead_lettered > 0)
                    .then(|| format!("{} entries dead-lettered in last pass", report.dead_lettered));
                (HealthStatus::Healthy, details)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                tracing::error!(
                    error = %e,
                    consecutive_failures = self.consecutive_failures,
                    "❌ Outbox pass failed"
                );
                let message = e.to_string();
                if self.consecutive_failures >= UNHEALTHY_AFTER {
                    (HealthStatus::Unhealthy(message), None)
                } else {
                    (HealthStatus::Degraded(message), None)
                }
            }
        };

        if let Some(ref health_monitor) = self.health_monitor {
            health_monitor.do_send(UpdateHealth {
                component: COMPONENT.to_string(),
                status,
                details,
            });
        }
    }
}

impl Actor for OutboxDispatcherActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "📮 OutboxDispatcherActor started"
        );

        ctx.run_interval(self.poll_interval, |act, ctx| act.run_pass(ctx));
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("🛑 OutboxDispatcherActor stopped");
    }
}

impl Handler<DispatchNow> for OutboxDispatcherActor {
    type Result = ResponseFuture<Result<DispatchReport, DispatchError>>;

    fn handle(&mut self, _msg: DispatchNow, _ctx: &mut Self::Context) -> Self::Result {
        let dispatcher = self.dispatcher.clone();
        Box::pin(async move { dispatcher.dispatch_pending().await })
    }
}

impl Handler<StopActor> for OutboxDispatcherActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("OutboxDispatcherActor received stop signal");
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::CatalogItemId;
    use crate::domain::order::{Address, CatalogItemOrdered, Money, Order, OrderItem, OrderRepository};
    use crate::notifications::{InMemoryDeliveryScheduler, InMemoryReservationQueue, Notifier};
    use crate::outbox::{DispatcherConfig, NotificationChannel, OutboxStore};
    use crate::store::InMemoryOrderStore;
    use crate::utils::RetryConfig;

    fn order() -> Order {
        let item = OrderItem::new(CatalogItemOrdered::new(CatalogItemId(1), "Widget", "u1"), Money::from_cents(999), 2).unwrap();
        Order::new("buyer-1", Address::new("1 Main St", "Redmond", "WA", "US", "98052"), vec![item]).unwrap()
    }

    fn dispatcher(store: Arc<InMemoryOrderStore>, poll_interval: Duration) -> (Arc<OutboxDispatcher>, Arc<InMemoryReservationQueue>) {
        let queue = Arc::new(InMemoryReservationQueue::new());
        let notifier = Notifier::new(queue.clone(), Arc::new(InMemoryDeliveryScheduler::new()))
            .with_retry(RetryConfig::no_retry(), RetryConfig::no_retry());
        let config = DispatcherConfig {
            poll_interval,
            ..DispatcherConfig::default()
        };
        let dispatcher = OutboxDispatcher::new(store.clone(), store, Arc::new(notifier), config);
        (Arc::new(dispatcher), queue)
    }

    #[actix::test]
    async fn test_dispatch_now_runs_a_pass() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.add(order(), &NotificationChannel::ALL).await.unwrap();
        let (dispatcher, queue) = dispatcher(store.clone(), Duration::from_secs(3600));

        let actor = OutboxDispatcherActor::new(dispatcher).start();
        let report = actor.send(DispatchNow).await.unwrap().unwrap();

        assert_eq!(report.delivered, 2);
        assert_eq!(queue.sent().await.len(), 1);
    }

    #[actix::test]
    async fn test_timer_drains_outbox() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.add(order(), &NotificationChannel::ALL).await.unwrap();
        let (dispatcher, queue) = dispatcher(store.clone(), Duration::from_millis(10));

        let _actor = OutboxDispatcherActor::new(dispatcher).start();
        actix::clock::sleep(Duration::from_millis(100)).await;

        assert!(store.pending(10).await.unwrap().is_empty());
        assert_eq!(queue.sent().await.len(), 1);
    }
}
