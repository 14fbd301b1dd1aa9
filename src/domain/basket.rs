use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::catalog::CatalogItemId;
use super::errors::RepositoryError;
use super::order::Money;

// ============================================================================
// Basket - read-only snapshot taken at checkout
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasketId(pub i64);

impl fmt::Display for BasketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One basket line; the price was captured when the item was added
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketItem {
    pub catalog_item_id: CatalogItemId,
    pub unit_price: Money,
    pub quantity: i32,
}

impl BasketItem {
    pub fn new(catalog_item_id: CatalogItemId, unit_price: Money, quantity: i32) -> Self {
        Self {
            catalog_item_id,
            unit_price,
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Basket {
    pub id: BasketId,
    pub buyer_id: String,
    pub items: Vec<BasketItem>,
}

impl Basket {
    pub fn new(id: BasketId, buyer_id: impl Into<String>, items: Vec<BasketItem>) -> Self {
        Self {
            id,
            buyer_id: buyer_id.into(),
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Basket storage, owned by another part of the application
#[async_trait]
pub trait BasketRepository: Send + Sync {
    /// Load a basket together with its items; `None` when no basket has that id
    async fn get_with_items(&self, id: BasketId) -> Result<Option<Basket>, RepositoryError>;
}
