use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::catalog::CatalogItemId;
use super::errors::OrderError;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Identity assigned by the order store on first write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one order line, assigned by the order store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderItemId(pub i64);

impl fmt::Display for OrderItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monetary amount in cents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_times(&self, units: i32) -> Option<Money> {
        self.0.checked_mul(i64::from(units)).map(Money)
    }

    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Shipping destination; serialized as-is into the delivery webhook body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        country: impl Into<String>,
        zip_code: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            state: state.into(),
            country: country.into(),
            zip_code: zip_code.into(),
        }
    }
}

/// Catalog data frozen into the order at checkout time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItemOrdered {
    catalog_item_id: CatalogItemId,
    product_name: String,
    picture_uri: String,
}

impl CatalogItemOrdered {
    pub fn new(
        catalog_item_id: CatalogItemId,
        product_name: impl Into<String>,
        picture_uri: impl Into<String>,
    ) -> Self {
        Self {
            catalog_item_id,
            product_name: product_name.into(),
            picture_uri: picture_uri.into(),
        }
    }

    pub fn catalog_item_id(&self) -> CatalogItemId {
        self.catalog_item_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn picture_uri(&self) -> &str {
        &self.picture_uri
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    id: Option<OrderItemId>,
    item_ordered: CatalogItemOrdered,
    unit_price: Money,
    units: i32,
    line_total: Money,
}

impl OrderItem {
    /// Units must be positive, the captured price non-negative, and the
    /// line total must fit in an `i64` of cents
    pub fn new(item_ordered: CatalogItemOrdered, unit_price: Money, units: i32) -> Result<Self, OrderError> {
        if units <= 0 {
            return Err(OrderError::InvalidQuantity(units));
        }
        if unit_price.is_negative() {
            return Err(OrderError::NegativeUnitPrice(unit_price));
        }
        let line_total = unit_price
            .checked_times(units)
            .ok_or(OrderError::AmountOverflow)?;

        Ok(Self {
            id: None,
            item_ordered,
            unit_price,
            units,
            line_total,
        })
    }

    /// Called by the order store once the line has been written
    pub fn with_id(self, id: OrderItemId) -> Self {
        Self { id: Some(id), ..self }
    }

    pub fn id(&self) -> Option<OrderItemId> {
        self.id
    }

    pub fn item_ordered(&self) -> &CatalogItemOrdered {
        &self.item_ordered
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn units(&self) -> i32 {
        self.units
    }

    pub fn line_total(&self) -> Money {
        self.line_total
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> CatalogItemOrdered {
        CatalogItemOrdered::new(CatalogItemId(1), "Widget", "https://cdn.example.com/1.png")
    }

    #[test]
    fn test_order_item_captures_values() {
        let item = OrderItem::new(widget(), Money::from_cents(999), 2).unwrap();

        assert_eq!(item.units(), 2);
        assert_eq!(item.unit_price(), Money::from_cents(999));
        assert_eq!(item.line_total(), Money::from_cents(1998));
        assert_eq!(item.item_ordered().product_name(), "Widget");
    }

    #[test]
    fn test_order_item_rejects_non_positive_units() {
        let zero = OrderItem::new(widget(), Money::from_cents(100), 0);
        let negative = OrderItem::new(widget(), Money::from_cents(100), -3);

        assert!(matches!(zero, Err(OrderError::InvalidQuantity(0))));
        assert!(matches!(negative, Err(OrderError::InvalidQuantity(-3))));
    }

    #[test]
    fn test_order_item_rejects_negative_price() {
        let result = OrderItem::new(widget(), Money::from_cents(-1), 1);
        assert!(matches!(result, Err(OrderError::NegativeUnitPrice(_))));
    }

    #[test]
    fn test_free_item_is_allowed() {
        assert!(OrderItem::new(widget(), Money::ZERO, 1).is_ok());
    }

    #[test]
    fn test_order_item_rejects_overflowing_line_total() {
        let result = OrderItem::new(widget(), Money::from_cents(i64::MAX / 2), 3);
        assert!(matches!(result, Err(OrderError::AmountOverflow)));
    }

    #[test]
    fn test_new_item_has_no_identity() {
        let item = OrderItem::new(widget(), Money::from_cents(100), 1).unwrap();
        assert_eq!(item.id(), None);
        assert_eq!(item.with_id(OrderItemId(12)).id(), Some(OrderItemId(12)));
    }

    #[test]
    fn test_money_display_and_checked_math() {
        let total = Money::from_cents(1998).checked_add(Money::from_cents(450)).unwrap();

        assert_eq!(total, Money::from_cents(2448));
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_times(2), None);
        assert_eq!(total.to_string(), "24.48");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn test_address_uses_pascal_case_keys() {
        let address = Address::new("1 Main St", "Redmond", "WA", "US", "98052");
        let json = serde_json::to_value(&address).unwrap();

        assert_eq!(json["Street"], "1 Main St");
        assert_eq!(json["ZipCode"], "98052");
    }
}
