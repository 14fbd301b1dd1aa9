use crate::domain::basket::BasketId;
use super::value_objects::Address;

// ============================================================================
// Order Commands
// ============================================================================

/// Check out a basket to the given shipping address
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub basket_id: BasketId,
    pub shipping_address: Address,
}

impl CreateOrder {
    pub fn new(basket_id: BasketId, shipping_address: Address) -> Self {
        Self {
            basket_id,
            shipping_address,
        }
    }
}
