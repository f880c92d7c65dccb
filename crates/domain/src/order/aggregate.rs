//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::{
    Money, OrderCompletedData, OrderCreatedData, OrderError, OrderEvent, OrderExpiredData,
    OrderStatus,
};

/// A line item of an order.
///
/// The unit price is a snapshot taken when the order was created, not a live
/// reference to the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit at creation time.
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }

    /// `quantity` units at the captured price.
    pub fn subtotal(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// An order that has been priced but not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Builds a pending order from priced items, fixing the total.
    pub fn new(
        user_id: UserId,
        items: Vec<OrderItem>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let total = items.iter().map(OrderItem::subtotal).sum();

        Ok(Self {
            user_id,
            items,
            total,
            status: OrderStatus::Pending,
            created_at,
        })
    }

    /// Attaches the store-assigned identifier.
    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            user_id: self.user_id,
            items: self.items,
            total: self.total,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Order aggregate root: the order row plus its owned line items.
///
/// The total is computed once at creation and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Query methods
impl Order {
    /// Returns the sum of item subtotals.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(OrderItem::subtotal).sum()
    }

    /// Returns true if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Event constructors
impl Order {
    /// Builds the event announcing this order's creation.
    pub fn created_event(&self) -> OrderEvent {
        OrderEvent::OrderCreated(OrderCreatedData {
            order_id: self.id,
            user_id: self.user_id,
            total: self.total,
            created_at: self.created_at,
        })
    }

    /// Builds the event announcing completion, stamped with the last update.
    pub fn completed_event(&self) -> OrderEvent {
        OrderEvent::OrderCompleted(OrderCompletedData {
            order_id: self.id,
            user_id: self.user_id,
            total: self.total,
            completed_at: self.updated_at,
        })
    }

    /// Builds the event announcing expiry, stamped with the last update.
    pub fn expired_event(&self, expiry_threshold_minutes: u32) -> OrderEvent {
        OrderEvent::OrderExpired(OrderExpiredData {
            order_id: self.id,
            user_id: self.user_id,
            total: self.total,
            expired_at: self.updated_at,
            expiry_threshold_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_items() -> Vec<OrderItem> {
        vec![
            OrderItem::new(ProductId::new(1), 2, Money::from_cents(9999)),
            OrderItem::new(ProductId::new(2), 1, Money::from_cents(14999)),
        ]
    }

    #[test]
    fn test_new_order_computes_total_from_snapshots() {
        let order = NewOrder::new(UserId::new(1), sample_items(), Utc::now()).unwrap();
        assert_eq!(order.total.cents(), 2 * 9999 + 14999);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_new_order_requires_items() {
        let result = NewOrder::new(UserId::new(1), vec![], Utc::now());
        assert_eq!(result, Err(OrderError::NoItems));
    }

    #[test]
    fn test_into_order_sets_matching_timestamps() {
        let created_at = Utc::now();
        let order = NewOrder::new(UserId::new(1), sample_items(), created_at)
            .unwrap()
            .into_order(OrderId::new(10));

        assert_eq!(order.id, OrderId::new(10));
        assert_eq!(order.created_at, created_at);
        assert_eq!(order.updated_at, created_at);
        assert_eq!(order.items_total(), order.total);
    }

    #[test]
    fn test_expired_event_carries_threshold() {
        let order = NewOrder::new(UserId::new(4), sample_items(), Utc::now())
            .unwrap()
            .into_order(OrderId::new(8));

        match order.expired_event(30) {
            OrderEvent::OrderExpired(data) => {
                assert_eq!(data.order_id, OrderId::new(8));
                assert_eq!(data.user_id, UserId::new(4));
                assert_eq!(data.expiry_threshold_minutes, 30);
                assert_eq!(data.expired_at, order.updated_at);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
