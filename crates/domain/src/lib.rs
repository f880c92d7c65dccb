//! Domain layer for the order-processing system.
//!
//! This crate provides the core domain types including:
//! - Order aggregate with line-item price snapshots and an immutable total
//! - OrderStatus state machine with explicit allowed transitions
//! - Domain events published at each lifecycle transition
//! - Product, user and notification records

pub mod catalog;
pub mod event;
pub mod notification;
pub mod order;

pub use catalog::{CatalogError, NewProduct, NewUser, Product, User};
pub use event::DomainEvent;
pub use notification::{NewNotification, Notification, NotificationKind};
pub use order::{
    CreateOrder, Money, NewOrder, Order, OrderCompletedData, OrderCreatedData, OrderError,
    OrderEvent, OrderExpiredData, OrderItem, OrderLine, OrderStatus,
};
