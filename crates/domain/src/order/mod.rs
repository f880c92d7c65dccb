//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod status;
mod value_objects;

pub use aggregate::{NewOrder, Order, OrderItem};
pub use commands::{CreateOrder, OrderLine};
pub use events::{OrderCompletedData, OrderCreatedData, OrderEvent, OrderExpiredData};
pub use status::OrderStatus;
pub use value_objects::Money;

use common::ProductId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The status string is not one of the recognized values.
    #[error("Invalid order status: {value}")]
    InvalidStatus { value: String },

    /// Order has no items.
    #[error("Order must contain at least one item")]
    NoItems,

    /// Invalid quantity.
    #[error("Invalid quantity for product {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// The automated lifecycle does not allow this edge.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
