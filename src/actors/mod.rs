// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure for asynchronous, concurrent operations.
//
// Structure:
// - core/           - Shared types (HealthStatus, ComponentHealth, StopActor)
// - infrastructure/ - Concrete infrastructure actors (Outbox, Health, Coordinator)
//
// Note: Checkout itself (OrderService) is plain async code, NOT an actor.
//       Actors are reserved for infrastructure concerns only.
//
// ============================================================================

// Private module declarations
mod core;
mod infrastructure;

// Re-export only what's needed in the public API
pub use self::core::{ComponentHealth, HealthStatus};
pub use infrastructure::{
    CoordinatorActor,
    DispatchNow,
    GetHealthMonitor,
    GetOutboxDispatcher,
    GetSystemHealth,
    HealthMonitorActor,
    OutboxDispatcherActor,
    Shutdown,
    SystemHealth,
    UpdateHealth,
};
