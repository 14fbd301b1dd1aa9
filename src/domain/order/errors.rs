use crate::domain::basket::BasketId;
use crate::domain::catalog::CatalogItemId;
use crate::domain::errors::RepositoryError;
use super::value_objects::Money;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order items cannot be empty")]
    EmptyItems,

    #[error("Order must have a buyer")]
    MissingBuyer,

    #[error("Invalid item quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Unit price cannot be negative: {0}")]
    NegativeUnitPrice(Money),

    #[error("Order amount exceeds the supported range")]
    AmountOverflow,
}

// ============================================================================
// Order Assembly Errors - raised before anything is written
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderAssemblyError {
    #[error("Basket {0} not found")]
    BasketNotFound(BasketId),

    #[error("Basket {0} is empty; cannot check out")]
    EmptyBasket(BasketId),

    #[error("Basket {basket_id} references catalog item {catalog_item_id}, which no longer exists")]
    CatalogItemMissing {
        basket_id: BasketId,
        catalog_item_id: CatalogItemId,
    },

    #[error("Basket {basket_id} has an invalid line: {source}")]
    InvalidOrderItem {
        basket_id: BasketId,
        #[source]
        source: OrderError,
    },

    #[error("Failed to read basket or catalog: {0}")]
    Store(#[from] RepositoryError),
}

// ============================================================================
// Checkout Errors - what `create_order` surfaces to callers
// ============================================================================

/// Pipeline stage at which a checkout failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStage {
    Assembly,
    Persistence,
}

impl CheckoutStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStage::Assembly => "assembly",
            CheckoutStage::Persistence => "persistence",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Assembly(#[from] OrderAssemblyError),

    #[error("Failed to persist order: {0}")]
    Persistence(#[source] RepositoryError),
}

impl CheckoutError {
    pub fn stage(&self) -> CheckoutStage {
        match self {
            CheckoutError::Assembly(_) => CheckoutStage::Assembly,
            CheckoutError::Persistence(_) => CheckoutStage::Persistence,
        }
    }

    /// Caller mistakes (unknown or empty basket) as opposed to system faults
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CheckoutError::Assembly(OrderAssemblyError::BasketNotFound(_))
                | CheckoutError::Assembly(OrderAssemblyError::EmptyBasket(_))
        )
    }
}
