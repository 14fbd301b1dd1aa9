use serde::{Deserialize, Serialize};

use crate::domain::order::{Address, Order, OrderId, OrderItemId};
use super::NotificationError;

// ============================================================================
// Wire Payloads
// ============================================================================
//
// Both payloads are built from the persisted order only, so they always
// carry the final order id and the store-assigned order item ids. Keys are
// PascalCase on the wire:
//
//   reservations: { "OrderId": 7, "Items": [{ "Id": 1, "Units": 2 }] }
//   delivery:     { "OrderId": 7, "Address": {..}, "Items": [..] }
//
// ============================================================================

/// Order item id and ordered units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemUnits {
    pub id: OrderItemId,
    pub units: i32,
}

fn item_units(order: &Order) -> Result<Vec<ItemUnits>, NotificationError> {
    order
        .items()
        .iter()
        .map(|item| {
            let id = item.id().ok_or(NotificationError::UnpersistedOrder)?;
            Ok(ItemUnits { id, units: item.units() })
        })
        .collect()
}

fn persisted_id(order: &Order) -> Result<OrderId, NotificationError> {
    order.id().ok_or(NotificationError::UnpersistedOrder)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReservationMessage {
    pub order_id: OrderId,
    pub items: Vec<ItemUnits>,
}

impl ReservationMessage {
    pub fn from_order(order: &Order) -> Result<Self, NotificationError> {
        Ok(Self {
            order_id: persisted_id(order)?,
            items: item_units(order)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeliveryRequest {
    pub order_id: OrderId,
    pub address: Address,
    pub items: Vec<ItemUnits>,
}

impl DeliveryRequest {
    pub fn from_order(order: &Order) -> Result<Self, NotificationError> {
        Ok(Self {
            order_id: persisted_id(order)?,
            address: order.ship_to_address().clone(),
            items: item_units(order)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::CatalogItemId;
    use crate::domain::order::{CatalogItemOrdered, Money, OrderItem};
    use serde_json::json;

    fn order() -> Order {
        let items = vec![
            OrderItem::new(CatalogItemOrdered::new(CatalogItemId(1), "Widget", "u1"), Money::from_cents(999), 2).unwrap(),
            OrderItem::new(CatalogItemOrdered::new(CatalogItemId(2), "Gadget", "u2"), Money::from_cents(450), 1).unwrap(),
        ];
        Order::new("buyer-1", Address::new("1 Main St", "Redmond", "WA", "US", "98052"), items).unwrap()
    }

    fn saved_order() -> Order {
        order()
            .with_id(OrderId(7))
            .with_item_ids([OrderItemId(31), OrderItemId(32)])
    }

    #[test]
    fn test_reservation_wire_format() {
        let message = ReservationMessage::from_order(&saved_order()).unwrap();

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "OrderId": 7, "Items": [{ "Id": 31, "Units": 2 }, { "Id": 32, "Units": 1 }] })
        );
    }

    #[test]
    fn test_repeated_catalog_item_keeps_distinct_line_ids() {
        let items = vec![
            OrderItem::new(CatalogItemOrdered::new(CatalogItemId(2), "Gadget", "u2"), Money::from_cents(450), 1).unwrap(),
            OrderItem::new(CatalogItemOrdered::new(CatalogItemId(2), "Gadget", "u2"), Money::from_cents(400), 3).unwrap(),
        ];
        let order = Order::new("buyer-1", Address::new("1 Main St", "Redmond", "WA", "US", "98052"), items)
            .unwrap()
            .with_id(OrderId(8))
            .with_item_ids([OrderItemId(40), OrderItemId(41)]);

        let message = ReservationMessage::from_order(&order).unwrap();

        assert_eq!(
            message.items,
            vec![
                ItemUnits { id: OrderItemId(40), units: 1 },
                ItemUnits { id: OrderItemId(41), units: 3 },
            ]
        );
    }

    #[test]
    fn test_delivery_wire_format_includes_address() {
        let request = DeliveryRequest::from_order(&saved_order()).unwrap();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "OrderId": 7,
                "Address": {
                    "Street": "1 Main St",
                    "City": "Redmond",
                    "State": "WA",
                    "Country": "US",
                    "ZipCode": "98052"
                },
                "Items": [{ "Id": 31, "Units": 2 }, { "Id": 32, "Units": 1 }]
            })
        );
    }

    #[test]
    fn test_unsaved_order_is_rejected() {
        assert!(matches!(
            ReservationMessage::from_order(&order()),
            Err(NotificationError::UnpersistedOrder)
        ));
        assert!(matches!(
            DeliveryRequest::from_order(&order()),
            Err(NotificationError::UnpersistedOrder)
        ));
        // an order id alone is not enough; every line needs its id too
        assert!(matches!(
            ReservationMessage::from_order(&order().with_id(OrderId(7))),
            Err(NotificationError::UnpersistedOrder)
        ));
    }
}
