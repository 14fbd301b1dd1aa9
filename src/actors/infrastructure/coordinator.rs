use actix::prelude::*;
use std::sync::Arc;

use crate::actors::core::{HealthStatus, StopActor};
use crate::metrics::Metrics;
use crate::outbox::OutboxDispatcher;
use crate::utils::CircuitBreaker;
use super::{GetSystemHealth, HealthMonitorActor, OutboxDispatcherActor, UpdateHealth};

// ============================================================================
// Coordinator Actor - Orchestrates all system actors
// ============================================================================
//
// Responsibilities:
// - Manages lifecycle of child actors (HealthMonitor, OutboxDispatcher)
// - Coordinates graceful shutdown
// - Reports system health
//
// Actor Hierarchy:
//   CoordinatorActor (Supervisor)
//   ├── HealthMonitorActor
//   └── OutboxDispatcherActor
//
// ============================================================================

pub struct CoordinatorActor {
    dispatcher: Arc<OutboxDispatcher>,
    breakers: Vec<CircuitBreaker>,
    metrics: Option<Arc<Metrics>>,
    health_monitor: Option<Addr<HealthMonitorActor>>,
    outbox_dispatcher: Option<Addr<OutboxDispatcherActor>>,
}

impl CoordinatorActor {
    pub fn new(dispatcher: Arc<OutboxDispatcher>, breakers: Vec<CircuitBreaker>) -> Self {
        Self {
            dispatcher,
            breakers,
            metrics: None,
            health_monitor: None,
            outbox_dispatcher: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn start_child_actors(&mut self, _ctx: &mut Context<Self>) {
        tracing::info!("Starting supervised child actors");

        // Start health monitor actor
        let mut monitor = HealthMonitorActor::new(self.breakers.clone());
        if let Some(ref metrics) = self.metrics {
            monitor = monitor.with_metrics(metrics.clone());
        }
        let health_monitor = monitor.start();
        self.health_monitor = Some(health_monitor.clone());

        // Start outbox dispatcher
        let outbox_dispatcher = OutboxDispatcherActor::new(self.dispatcher.clone())
            .with_health_monitor(health_monitor.clone())
            .start();
        self.outbox_dispatcher = Some(outbox_dispatcher);

        health_monitor.do_send(UpdateHealth {
            component: "outbox_dispatcher".to_string(),
            status: HealthStatus::Healthy,
            details: Some("Outbox dispatcher started".to_string()),
        });

        tracing::info!("✅ All supervised actors started successfully");
    }
}

impl Actor for CoordinatorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("🎯 CoordinatorActor started - order checkout notifications");
        self.start_child_actors(ctx);

        // Schedule periodic health checks
        ctx.run_interval(
            std::time::Duration::from_secs(30),
            |act, _ctx| {
                if let Some(ref health_monitor) = act.health_monitor {
                    let health_monitor = health_monitor.clone();
                    actix::spawn(async move {
                        match health_monitor.send(GetSystemHealth).await {
                            Ok(health) => {
                                match health.overall_status {
                                    HealthStatus::Healthy => {
                                        tracing::debug!("System health check: Healthy");
                                    }
                                    HealthStatus::Degraded(ref msg) => {
                                        tracing::warn!("System health check: Degraded - {}", msg);
                                    }
                                    HealthStatus::Unhealthy(ref msg) => {
                                        tracing::error!("System health check: Unhealthy - {}", msg);
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to get system health: {}", e);
                            }
                        }
                    });
                }
            },
        );
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        tracing::info!("🛑 CoordinatorActor stopping - initiating graceful shutdown");
        Running::Stop
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("🛑 CoordinatorActor stopped");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "Result<(), String>")]
pub struct Shutdown;

impl Handler<Shutdown> for CoordinatorActor {
    type Result = Result<(), String>;

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        tracing::info!("Received shutdown signal");

        // Stop the dispatcher first so no pass starts after the monitor is gone
        if let Some(ref outbox_dispatcher) = self.outbox_dispatcher {
            outbox_dispatcher.do_send(StopActor);
        }

        if let Some(ref health_monitor) = self.health_monitor {
            health_monitor.do_send(StopActor);
        }

        // Stop coordinator
        ctx.stop();

        Ok(())
    }
}

#[derive(Message)]
#[rtype(result = "Option<Addr<OutboxDispatcherActor>>")]
pub struct GetOutboxDispatcher;

impl Handler<GetOutboxDispatcher> for CoordinatorActor {
    type Result = MessageResult<GetOutboxDispatcher>;

    fn handle(&mut self, _msg: GetOutboxDispatcher, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.outbox_dispatcher.clone())
    }
}

#[derive(Message)]
#[rtype(result = "Option<Addr<HealthMonitorActor>>")]
pub struct GetHealthMonitor;

impl Handler<GetHealthMonitor> for CoordinatorActor {
    type Result = MessageResult<GetHealthMonitor>;

    fn handle(&mut self, _msg: GetHealthMonitor, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.health_monitor.clone())
    }
}
