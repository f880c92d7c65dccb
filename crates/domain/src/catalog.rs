//! Product and user records referenced by orders.

use chrono::{DateTime, Utc};
use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::Money;

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_EMAIL_LEN: usize = 100;

/// Validation failures for product and user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Name is required")]
    EmptyName,

    #[error("Name must be at most {max} characters")]
    NameTooLong { max: usize },

    #[error("Description must be at most {max} characters")]
    DescriptionTooLong { max: usize },

    #[error("Price must not be negative: {0}")]
    NegativePrice(i64),

    #[error("Stock must be between 0 and {max}: {value}")]
    InvalidStock { value: i64, max: u32 },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}

fn check_name(name: &str) -> Result<String, CatalogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CatalogError::NameTooLong { max: MAX_NAME_LEN });
    }
    Ok(name.to_string())
}

/// A product with its inventory count.
///
/// `stock` is never negative; it is decremented only by order creation and
/// incremented only by order deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Largest stock count any store can hold.
    pub const MAX_STOCK: u32 = i32::MAX as u32;

    /// Returns true if `quantity` units can be taken from stock.
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }
}

/// A product that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
}

impl NewProduct {
    /// Creates a new product definition.
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            price,
            stock,
        }
    }

    /// Builds a product definition from raw request values.
    ///
    /// The name is trimmed and a blank description is treated as absent.
    pub fn parse(
        name: &str,
        description: Option<&str>,
        price_cents: i64,
        stock: i64,
    ) -> Result<Self, CatalogError> {
        let name = check_name(name)?;
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        if description
            .as_deref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
        {
            return Err(CatalogError::DescriptionTooLong {
                max: MAX_DESCRIPTION_LEN,
            });
        }
        if price_cents < 0 {
            return Err(CatalogError::NegativePrice(price_cents));
        }
        let stock = u32::try_from(stock)
            .ok()
            .filter(|s| *s <= Product::MAX_STOCK)
            .ok_or(CatalogError::InvalidStock {
                value: stock,
                max: Product::MAX_STOCK,
            })?;

        Ok(Self {
            name,
            description,
            price: Money::from_cents(price_cents),
            stock,
        })
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A user who can own orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// A user that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

impl NewUser {
    /// Creates a new user definition.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Builds a user definition from raw request values.
    pub fn parse(name: &str, email: &str) -> Result<Self, CatalogError> {
        let name = check_name(name)?;
        let email = email.trim();
        let valid = email.len() <= MAX_EMAIL_LEN
            && !email.contains(char::is_whitespace)
            && email.split_once('@').is_some_and(|(local, host)| {
                !local.is_empty() && host.contains('.') && !host.contains('@')
            });
        if !valid {
            return Err(CatalogError::InvalidEmail(email.to_string()));
        }
        Ok(Self::new(name, email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_product_trims_and_accepts() {
        let product = NewProduct::parse("  Widget ", Some("  "), 1500, 10).unwrap();
        assert_eq!(product.name, "Widget");
        assert_eq!(product.description, None);
        assert_eq!(product.price, Money::from_cents(1500));
        assert_eq!(product.stock, 10);
    }

    #[test]
    fn test_parse_product_rejects_bad_input() {
        assert_eq!(
            NewProduct::parse(" ", None, 1, 1).unwrap_err(),
            CatalogError::EmptyName
        );
        assert!(matches!(
            NewProduct::parse(&"x".repeat(101), None, 1, 1),
            Err(CatalogError::NameTooLong { max: 100 })
        ));
        assert!(matches!(
            NewProduct::parse("Widget", Some(&"d".repeat(501)), 1, 1),
            Err(CatalogError::DescriptionTooLong { .. })
        ));
        assert_eq!(
            NewProduct::parse("Widget", None, -1, 1).unwrap_err(),
            CatalogError::NegativePrice(-1)
        );
        assert!(matches!(
            NewProduct::parse("Widget", None, 1, -5),
            Err(CatalogError::InvalidStock { value: -5, .. })
        ));
        assert!(matches!(
            NewProduct::parse("Widget", None, 1, i64::from(i32::MAX) + 1),
            Err(CatalogError::InvalidStock { .. })
        ));
    }

    #[test]
    fn test_parse_product_accepts_max_stock() {
        let product = NewProduct::parse("Widget", None, 0, i64::from(i32::MAX)).unwrap();
        assert_eq!(product.stock, Product::MAX_STOCK);
    }

    #[test]
    fn test_parse_user() {
        let user = NewUser::parse(" Alice ", " alice@example.com ").unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(user.email, "alice@example.com");

        for bad in [
            "",
            "alice",
            "@example.com",
            "alice@localhost",
            "a b@example.com",
            "a@b@c.com",
        ] {
            assert!(
                matches!(NewUser::parse("Alice", bad), Err(CatalogError::InvalidEmail(_))),
                "{bad} should be rejected"
            );
        }
        assert_eq!(
            NewUser::parse("", "alice@example.com").unwrap_err(),
            CatalogError::EmptyName
        );
    }
}
