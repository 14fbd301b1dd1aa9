// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// Reusable infrastructure actors for system concerns:
// - Outbox dispatching on a timer
// - Health monitoring
// - Coordination and shutdown
//
// ============================================================================

// Private module declarations
mod coordinator;
mod health_monitor;
mod outbox_dispatcher;

// Re-export for public API
pub use coordinator::{CoordinatorActor, GetHealthMonitor, GetOutboxDispatcher, Shutdown};
pub use health_monitor::{GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth};
pub use outbox_dispatcher::{DispatchNow, OutboxDispatcherActor};
