//! Workflow error types.

use bus::BusError;
use common::{OrderId, ProductId, UserId};
use domain::{CatalogError, OrderError};
use store::StoreError;
use thiserror::Error;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced user, product or order does not exist.
    NotFound,
    /// The request itself is malformed.
    InvalidInput,
    /// Not enough stock to satisfy the request.
    InsufficientStock,
    /// An automated transition hit a status it may not leave that way.
    InvalidTransition,
    /// The request conflicts with data that still depends on the target.
    Conflict,
    /// An event on the channel could not be decoded or had the wrong type.
    MalformedEvent,
    /// The event channel rejected a publish.
    TransportFailure,
    /// The store failed or is unavailable.
    PersistenceFailure,
}

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Stock overflow for product {product_id}: {stock} in stock, adding {quantity}")]
    StockOverflow {
        product_id: ProductId,
        stock: u32,
        quantity: u32,
    },

    #[error("Email already exists: {0}")]
    EmailTaken(String),

    #[error("User {0} still has orders")]
    UserHasOrders(UserId),

    /// Validation or state-machine error from the domain.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Product or user input failed validation.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Event channel error: {0}")]
    Transport(#[from] BusError),

    #[error("Store error: {0}")]
    Persistence(StoreError),
}

impl WorkflowError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound(_) | Self::ProductNotFound(_) | Self::OrderNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::Order(OrderError::InvalidTransition { .. }) => ErrorKind::InvalidTransition,
            Self::Order(_) | Self::Catalog(_) | Self::EmailTaken(_) => ErrorKind::InvalidInput,
            Self::StockOverflow { .. } | Self::UserHasOrders(_) => ErrorKind::Conflict,
            Self::Transport(BusError::Serialization(_) | BusError::UnexpectedEventType { .. }) => {
                ErrorKind::MalformedEvent
            }
            Self::Transport(BusError::Transport(_)) => ErrorKind::TransportFailure,
            Self::Persistence(_) => ErrorKind::PersistenceFailure,
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => Self::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::ProductNotFound(id) => Self::ProductNotFound(id),
            StoreError::StockOverflow {
                product_id,
                stock,
                quantity,
            } => Self::StockOverflow {
                product_id,
                stock,
                quantity,
            },
            StoreError::DuplicateEmail(email) => Self::EmailTaken(email),
            StoreError::UserHasOrders(id) => Self::UserHasOrders(id),
            other => Self::Persistence(other),
        }
    }
}

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{OrderStatus, Product};

    #[test]
    fn test_store_errors_keep_business_meaning() {
        let err: WorkflowError = StoreError::InsufficientStock {
            product_id: ProductId::new(1),
            requested: 5,
            available: 2,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        let err: WorkflowError = StoreError::ProductNotFound(ProductId::new(9)).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: WorkflowError = StoreError::Unavailable("down".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    }

    #[test]
    fn test_domain_errors_split_by_kind() {
        let err: WorkflowError = OrderError::NoItems.into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err: WorkflowError = OrderError::InvalidTransition {
            from: OrderStatus::Completed,
            to: OrderStatus::Expired,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn test_transport_kind() {
        let err: WorkflowError = BusError::Transport("down".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert!(err.to_string().contains("down"));
    }

    #[test]
    fn test_bad_events_are_not_transport_failures() {
        let err: WorkflowError = BusError::UnexpectedEventType {
            expected: "OrderCreated",
            actual: "OrderExpired".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::MalformedEvent);

        let decode = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: WorkflowError = BusError::Serialization(decode).into();
        assert_eq!(err.kind(), ErrorKind::MalformedEvent);
    }

    #[test]
    fn test_catalog_errors_split_by_kind() {
        let err: WorkflowError = CatalogError::EmptyName.into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err: WorkflowError = StoreError::DuplicateEmail("a@b.com".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err: WorkflowError = StoreError::UserHasOrders(UserId::new(1)).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: WorkflowError = StoreError::StockOverflow {
            product_id: ProductId::new(1),
            stock: Product::MAX_STOCK,
            quantity: 1,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
