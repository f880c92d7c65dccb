//! Notification audit records.

use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId};
use serde::{Deserialize, Serialize};

use crate::order::{Money, OrderEvent};

/// The event a notification was recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    OrderCreated,
    OrderCompleted,
    OrderExpired,
}

impl NotificationKind {
    /// Returns the tag as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderCreated => OrderEvent::CREATED,
            NotificationKind::OrderCompleted => OrderEvent::COMPLETED,
            NotificationKind::OrderExpired => OrderEvent::EXPIRED,
        }
    }

    /// Parses a stored tag.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            OrderEvent::CREATED => Some(NotificationKind::OrderCreated),
            OrderEvent::COMPLETED => Some(NotificationKind::OrderCompleted),
            OrderEvent::EXPIRED => Some(NotificationKind::OrderExpired),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted notification. Purely additive: never updated except for the
/// email flag, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub message: String,
    pub email_sent: bool,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A notification that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub message: String,
    pub email_sent: bool,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    /// Audit record written when an order is created.
    pub fn order_created(order_id: OrderId, total: Money) -> Self {
        Self::build(
            order_id,
            NotificationKind::OrderCreated,
            format!("Order #{order_id} created with total {total}"),
        )
    }

    /// Record written when an order completes.
    pub fn order_completed(order_id: OrderId) -> Self {
        Self::build(
            order_id,
            NotificationKind::OrderCompleted,
            format!("Order #{order_id} completed successfully"),
        )
    }

    /// Record written when an order expires.
    pub fn order_expired(order_id: OrderId, expiry_threshold_minutes: u32) -> Self {
        Self::build(
            order_id,
            NotificationKind::OrderExpired,
            format!("Order #{order_id} expired after {expiry_threshold_minutes} minutes"),
        )
    }

    /// Keys the record so that a redelivered event does not record it twice.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Attaches the store-assigned identifier.
    pub fn into_notification(self, id: NotificationId) -> Notification {
        Notification {
            id,
            order_id: self.order_id,
            kind: self.kind,
            message: self.message,
            email_sent: self.email_sent,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
        }
    }

    fn build(order_id: OrderId, kind: NotificationKind, message: String) -> Self {
        Self {
            order_id,
            kind,
            message,
            email_sent: false,
            idempotency_key: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_message_formats_total() {
        let n = NewNotification::order_created(OrderId::new(3), Money::from_cents(19998));
        assert_eq!(n.message, "Order #3 created with total $199.98");
        assert_eq!(n.kind, NotificationKind::OrderCreated);
        assert!(!n.email_sent);
    }

    #[test]
    fn test_expired_message_mentions_threshold() {
        let n = NewNotification::order_expired(OrderId::new(9), 30);
        assert_eq!(n.message, "Order #9 expired after 30 minutes");
    }

    #[test]
    fn test_kind_tags_roundtrip() {
        for kind in [
            NotificationKind::OrderCreated,
            NotificationKind::OrderCompleted,
            NotificationKind::OrderExpired,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::parse("OrderShipped"), None);
    }
}
