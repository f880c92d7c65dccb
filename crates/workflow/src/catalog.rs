//! Product and user management.

use common::{ProductId, UserId};
use domain::{NewProduct, NewUser, Product, User};
use store::OrderStore;

use crate::error::{Result, WorkflowError};

/// Administrative product and user operations over a store.
///
/// Borrows the store an [`OrderService`](crate::OrderService) already owns,
/// so catalog writes and order writes always see the same data.
pub struct CatalogService<'a, S> {
    store: &'a S,
}

impl<'a, S> CatalogService<'a, S>
where
    S: OrderStore,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.store.list_products().await?)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.store
            .find_product(id)
            .await?
            .ok_or(WorkflowError::ProductNotFound(id))
    }

    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let product = self.store.insert_product(product).await?;
        tracing::info!(product_id = %product.id, stock = product.stock, "Product created");
        Ok(product)
    }

    /// Replaces every field of a product, stock included.
    ///
    /// Stock reserved by existing orders is not recomputed; deleting such an
    /// order later adds its quantity on top of the new count.
    #[tracing::instrument(skip(self, product))]
    pub async fn update_product(&self, id: ProductId, product: NewProduct) -> Result<Product> {
        let product = self
            .store
            .update_product(id, product)
            .await?
            .ok_or(WorkflowError::ProductNotFound(id))?;
        tracing::info!(product_id = %id, stock = product.stock, "Product updated");
        Ok(product)
    }

    /// Deletes a product. Orders that reference it keep their snapshots.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        if !self.store.delete_product(id).await? {
            return Err(WorkflowError::ProductNotFound(id));
        }
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    pub async fn get_user(&self, id: UserId) -> Result<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or(WorkflowError::UserNotFound(id))
    }

    #[tracing::instrument(skip(self, user))]
    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        let user = self.store.insert_user(user).await?;
        tracing::info!(user_id = %user.id, "User created");
        Ok(user)
    }

    #[tracing::instrument(skip(self, user))]
    pub async fn update_user(&self, id: UserId, user: NewUser) -> Result<User> {
        let user = self
            .store
            .update_user(id, user)
            .await?
            .ok_or(WorkflowError::UserNotFound(id))?;
        tracing::info!(user_id = %id, "User updated");
        Ok(user)
    }

    /// Deletes a user that owns no orders.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, id: UserId) -> Result<()> {
        if !self.store.delete_user(id).await? {
            return Err(WorkflowError::UserNotFound(id));
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use domain::Money;
    use store::InMemoryStore;

    use super::*;
    use crate::ErrorKind;

    #[tokio::test]
    async fn test_missing_records_are_not_found() {
        let store = InMemoryStore::with_sample_data();
        let catalog = CatalogService::new(&store);

        let err = catalog
            .update_product(ProductId::new(9), NewProduct::new("X", Money::zero(), 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            catalog.delete_product(ProductId::new(9)).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            catalog.delete_user(UserId::new(9)).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            catalog.get_user(UserId::new(9)).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_duplicate_email_is_invalid_input() {
        let store = InMemoryStore::with_sample_data();
        let catalog = CatalogService::new(&store);

        let err = catalog
            .create_user(NewUser::new("Copy", "admin@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.to_string(), "Email already exists: admin@example.com");
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let store = InMemoryStore::new();
        let catalog = CatalogService::new(&store);

        let product = catalog
            .create_product(NewProduct::new("Widget", Money::from_cents(250), 3))
            .await
            .unwrap();
        assert_eq!(catalog.get_product(product.id).await.unwrap(), product);
        assert_eq!(catalog.list_products().await.unwrap(), vec![product]);

        let user = catalog
            .create_user(NewUser::new("Ann", "ann@example.com"))
            .await
            .unwrap();
        assert_eq!(catalog.list_users().await.unwrap(), vec![user]);
    }
}
