use common::{ProductId, UserId};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stock decrement would have taken the count below zero.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A stock decrement referenced a product that does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Restoring stock would push the count past what the store can hold.
    #[error("Stock overflow for product {product_id}: {stock} in stock, adding {quantity}")]
    StockOverflow {
        product_id: ProductId,
        stock: u32,
        quantity: u32,
    },

    /// Another user already has this email address.
    #[error("Email already exists: {0}")]
    DuplicateEmail(String),

    /// The user still owns orders and cannot be deleted.
    #[error("User {0} still has orders")]
    UserHasOrders(UserId),

    /// A stored row could not be mapped back into a domain value.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
