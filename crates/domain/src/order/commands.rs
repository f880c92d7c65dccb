//! Order commands.

use common::{ProductId, UserId};

use super::OrderError;

/// One requested line of a new order.
///
/// The quantity is kept signed so that non-positive requests can be rejected
/// with a typed error instead of failing to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    /// The product to order.
    pub product_id: ProductId,

    /// Requested quantity.
    pub quantity: i64,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to create a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The user placing the order.
    pub user_id: UserId,

    /// The requested lines, in order.
    pub lines: Vec<OrderLine>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command.
    pub fn new(user_id: UserId, lines: Vec<OrderLine>) -> Self {
        Self {
            user_id,
            lines,
        }
    }

    /// Validates the request shape and returns the lines with unsigned quantities.
    ///
    /// Fails if the list is empty or any quantity is not positive.
    pub fn validated_lines(&self) -> Result<Vec<(ProductId, u32)>, OrderError> {
        if self.lines.is_empty() {
            return Err(OrderError::NoItems);
        }

        self.lines
            .iter()
            .map(|line| match u32::try_from(line.quantity) {
                Ok(quantity) if quantity > 0 => Ok((line.product_id, quantity)),
                _ => Err(OrderError::InvalidQuantity {
                    product_id: line.product_id,
                    quantity: line.quantity,
                }),
            })
            .collect()
    }
}
