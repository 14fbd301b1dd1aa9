// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// - Value objects (OrderId, Money, Address, CatalogItemOrdered, OrderItem)
// - Aggregate (immutable Order)
// - Commands (CreateOrder)
// - Errors (OrderError, OrderAssemblyError, CheckoutError)
// - Repository contract (OrderRepository)
// - Command handler (OrderService: assembly + persistence)
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod repository;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use repository::*;
pub use command_handler::*;
