use chrono::{DateTime, Utc};

use super::errors::OrderError;
use super::value_objects::{Address, Money, OrderId, OrderItem, OrderItemId};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// Built once per successful checkout and never modified afterwards.
// Fields are private and there are no mutators; assigning the identity
// consumes the unsaved order and returns the saved one.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: Option<OrderId>,
    buyer_id: String,
    order_date: DateTime<Utc>,
    ship_to_address: Address,
    items: Vec<OrderItem>,
    total: Money,
}

impl Order {
    /// Create an unsaved order, stamped with the current time
    pub fn new(
        buyer_id: impl Into<String>,
        ship_to_address: Address,
        items: Vec<OrderItem>,
    ) -> Result<Self, OrderError> {
        Self::build(None, buyer_id.into(), Utc::now(), ship_to_address, items)
    }

    /// Rehydrate a stored order
    pub fn restore(
        id: OrderId,
        buyer_id: impl Into<String>,
        order_date: DateTime<Utc>,
        ship_to_address: Address,
        items: Vec<OrderItem>,
    ) -> Result<Self, OrderError> {
        Self::build(Some(id), buyer_id.into(), order_date, ship_to_address, items)
    }

    fn build(
        id: Option<OrderId>,
        buyer_id: String,
        order_date: DateTime<Utc>,
        ship_to_address: Address,
        items: Vec<OrderItem>,
    ) -> Result<Self, OrderError> {
        if buyer_id.trim().is_empty() {
            return Err(OrderError::MissingBuyer);
        }
        if items.is_empty() {
            return Err(OrderError::EmptyItems);
        }
        let total = items
            .iter()
            .try_fold(Money::ZERO, |sum, item| sum.checked_add(item.line_total()))
            .ok_or(OrderError::AmountOverflow)?;

        Ok(Self {
            id,
            buyer_id,
            order_date,
            ship_to_address,
            items,
            total,
        })
    }

    /// Called by the order store once the write has assigned an identity
    pub fn with_id(self, id: OrderId) -> Self {
        Self { id: Some(id), ..self }
    }

    /// Attach store-assigned line ids, one per item in item order
    pub fn with_item_ids(self, ids: impl IntoIterator<Item = OrderItemId>) -> Self {
        let items = self
            .items
            .into_iter()
            .zip(ids)
            .map(|(item, id)| item.with_id(id))
            .collect();
        Self { items, ..self }
    }

    /// Saved orders have an id and so does every line
    pub fn is_persisted(&self) -> bool {
        self.id.is_some() && self.items.iter().all(|item| item.id().is_some())
    }

    pub fn id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn buyer_id(&self) -> &str {
        &self.buyer_id
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn ship_to_address(&self) -> &Address {
        &self.ship_to_address
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total(&self) -> Money {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::CatalogItemId;
    use crate::domain::order::CatalogItemOrdered;

    fn address() -> Address {
        Address::new("1 Main St", "Redmond", "WA", "US", "98052")
    }

    fn item(id: i64, name: &str, cents: i64, units: i32) -> OrderItem {
        OrderItem::new(
            CatalogItemOrdered::new(CatalogItemId(id), name, format!("https://cdn/{id}.png")),
            Money::from_cents(cents),
            units,
        )
        .unwrap()
    }

    #[test]
    fn test_new_order_has_no_identity() {
        let order = Order::new("buyer-1", address(), vec![item(1, "Widget", 999, 2)]).unwrap();

        assert_eq!(order.id(), None);
        assert_eq!(order.buyer_id(), "buyer-1");
        assert_eq!(order.items().len(), 1);
    }

    #[test]
    fn test_with_id_keeps_everything_else() {
        let order = Order::new("buyer-1", address(), vec![item(1, "Widget", 999, 2)]).unwrap();
        let saved = order.clone().with_id(OrderId(17));

        assert_eq!(saved.id(), Some(OrderId(17)));
        assert_eq!(saved.items(), order.items());
        assert_eq!(saved.order_date(), order.order_date());
        assert_eq!(saved.ship_to_address(), order.ship_to_address());
    }

    #[test]
    fn test_empty_order_is_rejected() {
        let result = Order::new("buyer-1", address(), vec![]);
        assert!(matches!(result, Err(OrderError::EmptyItems)));
    }

    #[test]
    fn test_blank_buyer_is_rejected() {
        let result = Order::new("  ", address(), vec![item(1, "Widget", 999, 1)]);
        assert!(matches!(result, Err(OrderError::MissingBuyer)));
    }

    #[test]
    fn test_total_sums_captured_prices() {
        let order = Order::new(
            "buyer-1",
            address(),
            vec![item(1, "Widget", 999, 2), item(2, "Gadget", 450, 1)],
        )
        .unwrap();

        assert_eq!(order.total(), Money::from_cents(2448));
    }

    #[test]
    fn test_total_overflow_is_rejected() {
        let half = i64::MAX / 2 + 1;
        let result = Order::new(
            "buyer-1",
            address(),
            vec![item(1, "Widget", half, 1), item(2, "Gadget", half, 1)],
        );

        assert!(matches!(result, Err(OrderError::AmountOverflow)));
    }

    #[test]
    fn test_item_ids_follow_item_order() {
        let order = Order::new(
            "buyer-1",
            address(),
            vec![item(2, "Gadget", 450, 1), item(2, "Gadget", 400, 3)],
        )
        .unwrap();
        assert!(!order.clone().with_id(OrderId(1)).is_persisted());

        let saved = order.with_id(OrderId(1)).with_item_ids([OrderItemId(10), OrderItemId(11)]);

        let ids: Vec<_> = saved.items().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec![Some(OrderItemId(10)), Some(OrderItemId(11))]);
        assert!(saved.is_persisted());
    }
}
