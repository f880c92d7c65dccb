//! Order domain events.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;

use super::Money;

/// Events published at order lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was created and stock reserved.
    OrderCreated(OrderCreatedData),

    /// Payment succeeded and the order completed.
    OrderCompleted(OrderCompletedData),

    /// Order was reclaimed by the expiry sweep.
    OrderExpired(OrderExpiredData),
}

impl OrderEvent {
    pub const CREATED: &'static str = "OrderCreated";
    pub const COMPLETED: &'static str = "OrderCompleted";
    pub const EXPIRED: &'static str = "OrderExpired";

    /// Returns the user who owns the order.
    pub fn user_id(&self) -> UserId {
        match self {
            OrderEvent::OrderCreated(data) => data.user_id,
            OrderEvent::OrderCompleted(data) => data.user_id,
            OrderEvent::OrderExpired(data) => data.user_id,
        }
    }

    /// Returns the order total carried by the event.
    pub fn total(&self) -> Money {
        match self {
            OrderEvent::OrderCreated(data) => data.total,
            OrderEvent::OrderCompleted(data) => data.total,
            OrderEvent::OrderExpired(data) => data.total,
        }
    }
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => Self::CREATED,
            OrderEvent::OrderCompleted(_) => Self::COMPLETED,
            OrderEvent::OrderExpired(_) => Self::EXPIRED,
        }
    }

    fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::OrderCreated(data) => data.order_id,
            OrderEvent::OrderCompleted(data) => data.order_id,
            OrderEvent::OrderExpired(data) => data.order_id,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(data) => data.created_at,
            OrderEvent::OrderCompleted(data) => data.completed_at,
            OrderEvent::OrderExpired(data) => data.expired_at,
        }
    }
}

/// Data for OrderCreated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

/// Data for OrderCompleted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompletedData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub completed_at: DateTime<Utc>,
}

/// Data for OrderExpired event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExpiredData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub expired_at: DateTime<Utc>,

    /// The threshold the sweep used, kept for audit.
    pub expiry_threshold_minutes: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created() -> OrderEvent {
        OrderEvent::OrderCreated(OrderCreatedData {
            order_id: OrderId::new(12),
            user_id: UserId::new(1),
            total: Money::from_cents(19998),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        })
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(created().event_type(), "OrderCreated");

        let expired = OrderEvent::OrderExpired(OrderExpiredData {
            order_id: OrderId::new(1),
            user_id: UserId::new(1),
            total: Money::zero(),
            expired_at: Utc::now(),
            expiry_threshold_minutes: 5,
        });
        assert_eq!(expired.event_type(), OrderEvent::EXPIRED);
    }

    #[test]
    fn test_idempotency_key_is_stable_per_transition() {
        let event = created();
        assert_eq!(event.idempotency_key(), event.clone().idempotency_key());
        assert_eq!(event.idempotency_key(), "12:OrderCreated:1735689600000");
    }

    #[test]
    fn test_serialization_is_tagged() {
        let json = serde_json::to_value(created()).unwrap();
        assert_eq!(json["type"], "OrderCreated");
        assert_eq!(json["data"]["total"], 19998);

        let back: OrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, created());
    }
}
