use serde::{Deserialize, Serialize};

/// Unique identifier for an order.
///
/// Orders are rows in the relational store, so the identifier is the
/// store-assigned surrogate key wrapped for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(i64);

impl OrderId {
    /// Creates an order ID from a raw key.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<OrderId> for i64 {
    fn from(id: OrderId) -> Self {
        id.0
    }
}

/// Unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Creates a user ID from a raw key.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Unique identifier for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    /// Creates a product ID from a raw key.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProductId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<ProductId> for i64 {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

/// Unique identifier for a notification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(i64);

impl NotificationId {
    /// Creates a notification ID from a raw key.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NotificationId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
