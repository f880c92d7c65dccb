use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId, ProductId, UserId};
use domain::{
    NewNotification, NewOrder, NewProduct, NewUser, Notification, Order, OrderStatus,
    Product, User,
};

use crate::Result;

/// A unit of work against the store.
///
/// Nothing is visible to other readers until [`commit`](Self::commit);
/// dropping the transaction without committing discards every change.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Loads a user.
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>>;

    /// Loads a product with its current stock.
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Loads an order with its items.
    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Takes `quantity` units from a product's stock.
    ///
    /// The check and the decrement are one atomic step against live stock.
    /// Fails with `InsufficientStock` or `ProductNotFound` and leaves stock
    /// unchanged. Returns the product after the decrement.
    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<Product>;

    /// Puts `quantity` units back onto a product's stock.
    ///
    /// Returns `None` if the product no longer exists. Fails with
    /// `StockOverflow` and leaves stock unchanged if the result would exceed
    /// [`Product::MAX_STOCK`].
    async fn increment_stock(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Option<Product>>;

    /// Inserts an order and its items.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    /// Deletes an order and its items. Returns false if it did not exist.
    async fn delete_order(&mut self, id: OrderId) -> Result<bool>;

    /// Makes every change visible atomically.
    async fn commit(self) -> Result<()>;

    /// Discards every change.
    async fn rollback(self) -> Result<()>;
}

/// Core trait for store implementations.
///
/// Every method outside [`begin`](Self::begin) is individually atomic.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// The transaction type handed out by [`begin`](Self::begin).
    type Transaction: StoreTransaction;

    /// Opens a transaction scope.
    async fn begin(&self) -> Result<Self::Transaction>;

    /// Loads a user.
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    /// Lists all users ordered by id.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Inserts a user. Fails with `DuplicateEmail` if the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    /// Replaces a user's name and email.
    ///
    /// Returns `None` if the user does not exist. Fails with `DuplicateEmail`
    /// if another user has the email.
    async fn update_user(&self, id: UserId, user: NewUser) -> Result<Option<User>>;

    /// Deletes a user. Returns false if it did not exist.
    ///
    /// Fails with `UserHasOrders` while any order references the user.
    async fn delete_user(&self, id: UserId) -> Result<bool>;

    /// Loads a product.
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists all products ordered by id.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Inserts a product.
    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    /// Replaces a product's name, description, price and stock.
    ///
    /// Existing order snapshots are unaffected. Returns `None` if the product
    /// does not exist.
    async fn update_product(&self, id: ProductId, product: NewProduct) -> Result<Option<Product>>;

    /// Deletes a product. Returns false if it did not exist.
    ///
    /// Order items keep the id and price snapshot of a deleted product.
    async fn delete_product(&self, id: ProductId) -> Result<bool>;

    /// Loads an order with its items.
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists all orders ordered by id.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// Lists orders in one of `statuses` created at or before `cutoff`.
    async fn list_orders_by_status_older_than(
        &self,
        statuses: &[OrderStatus],
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>>;

    /// Overwrites an order's status unconditionally.
    ///
    /// Returns the updated order, or `None` if it does not exist.
    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Order>>;

    /// Moves an order to `to` only if its stored status is one of `from`.
    ///
    /// The comparison and the write are one atomic step. Returns the updated
    /// order, or `None` if it does not exist or its status did not match.
    async fn transition_order_status(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Order>>;

    /// Records a notification.
    ///
    /// Returns `None` without writing if a notification with the same
    /// idempotency key already exists.
    async fn save_notification(&self, notification: NewNotification)
    -> Result<Option<Notification>>;

    /// Flags a notification's email as sent.
    async fn mark_notification_email_sent(&self, id: NotificationId) -> Result<()>;

    /// Lists notifications recorded for an order, oldest first.
    async fn list_notifications(&self, order_id: OrderId) -> Result<Vec<Notification>>;
}
