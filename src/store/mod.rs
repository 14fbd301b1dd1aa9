// ============================================================================
// Storage Adapters
// ============================================================================
//
// - memory:   in-process stores for tests and local runs
// - postgres: durable order store with the notification outbox
//
// ============================================================================

mod memory;
mod postgres;

pub use memory::{InMemoryBasketStore, InMemoryCatalogStore, InMemoryOrderStore};
pub use postgres::PgOrderStore;
