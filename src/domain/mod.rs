// ============================================================================
// Domain Layer - Checkout Business Logic
// ============================================================================
//
// - basket:  read-only basket snapshot + its repository contract
// - catalog: catalog reference data, repository and picture URI resolver
// - order:   the Order aggregate, its errors, repository contract and the
//            checkout service that assembles and persists orders
//
// Storage and transport adapters live outside this module.
//
// ============================================================================

pub mod basket;
pub mod catalog;
pub mod errors;
pub mod order;

pub use basket::{Basket, BasketId, BasketItem, BasketRepository};
pub use catalog::{CatalogItem, CatalogItemId, CatalogRepository, CatalogUriComposer, PictureUriResolver};
pub use errors::RepositoryError;
