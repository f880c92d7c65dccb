//! Shared types for the order-processing system.

pub mod types;

pub use types::{NotificationId, OrderId, ProductId, UserId};
