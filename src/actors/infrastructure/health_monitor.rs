use actix::prelude::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::{ComponentHealth, HealthStatus, StopActor};
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitState};

// ============================================================================
// Health Monitor Actor - Monitors system health
// ============================================================================
//
// Responsibilities:
// - Poll transport circuit breakers (queue producer, delivery webhook)
// - Track health reported by other actors (outbox dispatcher)
// - Aggregate system-wide health
//
// ============================================================================

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "()")]
pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
    pub details: Option<String>,
}

#[derive(Message)]
#[rtype(result = "SystemHealth")]
pub struct GetSystemHealth;

#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub check_time: chrono::DateTime<Utc>,
}

// ============================================================================
// Health Monitor Actor
// ============================================================================

pub struct HealthMonitorActor {
    components: HashMap<String, ComponentHealth>,
    breakers: Vec<CircuitBreaker>,
    breaker_states: HashMap<String, CircuitState>,
    check_interval: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl HealthMonitorActor {
    pub fn new(breakers: Vec<CircuitBreaker>) -> Self {
        Self {
            components: HashMap::new(),
            breakers,
            breaker_states: HashMap::new(),
            check_interval: Duration::from_secs(10),
            metrics: None,
        }
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn poll_breakers(&mut self, ctx: &mut Context<Self>) {
        let breakers = self.breakers.clone();

        let states = async move {
            let mut states = Vec::with_capacity(breakers.len());
            for breaker in &breakers {
                states.push((breaker.name().to_string(), breaker.get_state().await));
            }
            states
        };

        ctx.spawn(states.into_actor(self).map(|states, act, _ctx| {
            for (name, state) in states {
                act.apply_breaker_state(name, state);
            }
        }));
    }

    fn apply_breaker_state(&mut self, name: String, state: CircuitState) {
        let previous = self.breaker_states.insert(name.clone(), state);

        if let Some(ref metrics) = self.metrics {
            metrics.update_circuit_breaker_state(&name, state.code());
            if let Some(previous) = previous.filter(|p| *p != state) {
                metrics.record_circuit_breaker_transition(&name, &format!("{previous:?}"), &format!("{state:?}"));
            }
        }

        self.record(name, HealthStatus::from_circuit(state), None);
    }

    fn record(&mut self, component: String, status: HealthStatus, details: Option<String>) {
        if let Some(ref metrics) = self.metrics {
            metrics.update_component_health(&component, status.code());
        }

        tracing::debug!(
            component = %component,
            status = ?status,
            "Updated component health"
        );

        let health = ComponentHealth::new(component.clone(), status).with_details(details);
        self.components.insert(component, health);
    }

    fn compute_overall_status(&self) -> HealthStatus {
        let mut has_degraded = false;
        let mut unhealthy_components = Vec::new();

        for (name, health) in &self.components {
            match &health.status {
                HealthStatus::Unhealthy(msg) => {
                    unhealthy_components.push(format!("{}: {}", name, msg));
                }
                HealthStatus::Degraded(_) => {
                    has_degraded = true;
                }
                HealthStatus::Healthy => {}
            }
        }

        if !unhealthy_components.is_empty() {
            unhealthy_components.sort();
            HealthStatus::Unhealthy(unhealthy_components.join(", "))
        } else if has_degraded {
            HealthStatus::Degraded("Some components degraded".to_string())
        } else {
            HealthStatus::Healthy
        }
    }
}

impl Actor for HealthMonitorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(breakers = self.breakers.len(), "HealthMonitorActor started");

        self.poll_breakers(ctx);
        ctx.run_interval(self.check_interval, |act, ctx| act.poll_breakers(ctx));
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Handler<UpdateHealth> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, msg: UpdateHealth, _ctx: &mut Self::Context) {
        self.record(msg.component, msg.status, msg.details);
    }
}

impl Handler<GetSystemHealth> for HealthMonitorActor {
    type Result = MessageResult<GetSystemHealth>;

    fn handle(&mut self, _msg: GetSystemHealth, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(SystemHealth {
            overall_status: self.compute_overall_status(),
            components: self.components.clone(),
            check_time: Utc::now(),
        })
    }
}

impl Handler<StopActor> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("HealthMonitorActor received stop signal");
        ctx.stop();
    }
}
