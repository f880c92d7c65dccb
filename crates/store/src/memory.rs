use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId, ProductId, UserId};
use domain::{
    Money, NewNotification, NewOrder, NewProduct, NewUser, Notification, Order, OrderStatus,
    Product, User,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{OrderStore, Result, StoreError, StoreTransaction};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    notifications: Vec<Notification>,
    next_user_id: i64,
    next_product_id: i64,
    next_order_id: i64,
    next_notification_id: i64,
}

impl MemoryState {
    fn insert_user(&mut self, user: NewUser) -> User {
        self.next_user_id += 1;
        let user = User {
            id: UserId::new(self.next_user_id),
            name: user.name,
            email: user.email,
        };
        self.users.insert(user.id, user.clone());
        user
    }

    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn insert_product(&mut self, product: NewProduct) -> Product {
        self.next_product_id += 1;
        let product = Product {
            id: ProductId::new(self.next_product_id),
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            created_at: Utc::now(),
        };
        self.products.insert(product.id, product.clone());
        product
    }

    fn insert_order(&mut self, order: NewOrder) -> Order {
        self.next_order_id += 1;
        let order = order.into_order(OrderId::new(self.next_order_id));
        self.orders.insert(order.id, order.clone());
        order
    }
}

/// In-memory store implementation for testing and local runs.
///
/// Transactions take an exclusive lock on the whole state and work on a copy
/// that replaces the shared state on commit, so they are serializable.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_on_notification: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the sample user and products.
    ///
    /// User 1 "Administrator"; product 1 at $99.99 with 100 in stock;
    /// product 2 at $149.99 with 50 in stock.
    pub fn with_sample_data() -> Self {
        let mut state = MemoryState::default();
        state.insert_user(NewUser::new("Administrator", "admin@example.com"));
        state.insert_product(
            NewProduct::new("Sample Product 1", Money::from_cents(9999), 100)
                .with_description("This is a sample product for testing"),
        );
        state.insert_product(
            NewProduct::new("Sample Product 2", Money::from_cents(14999), 50)
                .with_description("Another sample product"),
        );

        Self {
            state: Arc::new(Mutex::new(state)),
            fail_on_notification: Arc::default(),
        }
    }

    /// Configures notification writes to fail.
    pub fn set_fail_on_notification(&self, fail: bool) {
        self.fail_on_notification.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of notifications stored.
    pub async fn notification_count(&self) -> usize {
        self.state.lock().await.notifications.len()
    }

    /// Rewrites an order's creation time.
    ///
    /// Lets tests age an order past the expiry threshold without waiting.
    pub async fn backdate_order(&self, id: OrderId, created_at: DateTime<Utc>) -> bool {
        match self.state.lock().await.orders.get_mut(&id) {
            Some(order) => {
                order.created_at = created_at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction { guard, working })
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.state.lock().await.users.values().cloned().collect())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.lock().await;
        if state.email_taken(&user.email, None) {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        Ok(state.insert_user(user))
    }

    async fn update_user(&self, id: UserId, user: NewUser) -> Result<Option<User>> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&id) {
            return Ok(None);
        }
        if state.email_taken(&user.email, Some(id)) {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        let updated = User {
            id,
            name: user.name,
            email: user.email,
        };
        state.users.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&id) {
            return Ok(false);
        }
        if state.orders.values().any(|o| o.user_id == id) {
            return Err(StoreError::UserHasOrders(id));
        }
        Ok(state.users.remove(&id).is_some())
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.state.lock().await.products.values().cloned().collect())
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        Ok(self.state.lock().await.insert_product(product))
    }

    async fn update_product(&self, id: ProductId, update: NewProduct) -> Result<Option<Product>> {
        let mut state = self.state.lock().await;
        Ok(state.products.get_mut(&id).map(|product| {
            product.name = update.name;
            product.description = update.description;
            product.price = update.price;
            product.stock = update.stock;
            product.clone()
        }))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        Ok(self.state.lock().await.products.remove(&id).is_some())
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.state.lock().await.orders.values().cloned().collect())
    }

    async fn list_orders_by_status_older_than(
        &self,
        statuses: &[OrderStatus],
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| statuses.contains(&o.status) && o.created_at <= cutoff)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut state = self.state.lock().await;
        Ok(state.orders.get_mut(&id).map(|order| {
            order.status = status;
            order.updated_at = updated_at;
            order.clone()
        }))
    }

    async fn transition_order_status(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut state = self.state.lock().await;
        Ok(state
            .orders
            .get_mut(&id)
            .filter(|order| from.contains(&order.status))
            .map(|order| {
                order.status = to;
                order.updated_at = updated_at;
                order.clone()
            }))
    }

    async fn save_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>> {
        if self.fail_on_notification.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "notification table unavailable".to_string(),
            ));
        }

        let mut state = self.state.lock().await;

        if let Some(key) = notification.idempotency_key.as_deref()
            && state
                .notifications
                .iter()
                .any(|n| n.idempotency_key.as_deref() == Some(key))
        {
            return Ok(None);
        }

        state.next_notification_id += 1;
        let notification =
            notification.into_notification(NotificationId::new(state.next_notification_id));
        state.notifications.push(notification.clone());
        Ok(Some(notification))
    }

    async fn mark_notification_email_sent(&self, id: NotificationId) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(notification) = state.notifications.iter_mut().find(|n| n.id == id) {
            notification.email_sent = true;
        }
        Ok(())
    }

    async fn list_notifications(&self, order_id: OrderId) -> Result<Vec<Notification>> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.order_id == order_id)
            .cloned()
            .collect())
    }
}

/// Transaction over an [`InMemoryStore`].
///
/// Holds the store lock for its whole lifetime.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<Product> {
        let product = self
            .working
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;

        if !product.has_stock_for(quantity) {
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            });
        }

        product.stock -= quantity;
        Ok(product.clone())
    }

    async fn increment_stock(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Option<Product>> {
        let Some(product) = self.working.products.get_mut(&product_id) else {
            return Ok(None);
        };

        product.stock = product
            .stock
            .checked_add(quantity)
            .filter(|stock| *stock <= Product::MAX_STOCK)
            .ok_or(StoreError::StockOverflow {
                product_id,
                stock: product.stock,
                quantity,
            })?;
        Ok(Some(product.clone()))
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        Ok(self.working.insert_order(order))
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool> {
        Ok(self.working.orders.remove(&id).is_some())
    }

    async fn commit(self) -> Result<()> {
        let Self { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OrderItem;

    fn new_order(user_id: UserId, product_id: ProductId, quantity: u32) -> NewOrder {
        NewOrder::new(
            user_id,
            vec![OrderItem::new(product_id, quantity, Money::from_cents(9999))],
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_sample_data_is_seeded() {
        let store = InMemoryStore::with_sample_data();

        let user = store.find_user(UserId::new(1)).await.unwrap().unwrap();
        assert_eq!(user.name, "Administrator");

        let products = store.list_products().await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].price, Money::from_cents(9999));
        assert_eq!(products[0].stock, 100);
        assert_eq!(products[1].stock, 50);
    }

    #[tokio::test]
    async fn test_committed_transaction_is_visible() {
        let store = InMemoryStore::with_sample_data();

        let mut tx = store.begin().await.unwrap();
        tx.decrement_stock(ProductId::new(1), 2).await.unwrap();
        let order = tx
            .insert_order(new_order(UserId::new(1), ProductId::new(1), 2))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let product = store.find_product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(product.stock, 98);
        assert!(store.find_order(order.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_changes() {
        let store = InMemoryStore::with_sample_data();

        {
            let mut tx = store.begin().await.unwrap();
            tx.decrement_stock(ProductId::new(1), 5).await.unwrap();
            tx.insert_order(new_order(UserId::new(1), ProductId::new(1), 5))
                .await
                .unwrap();
        }

        let product = store.find_product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(product.stock, 100);
        assert!(store.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decrement_checks_live_stock() {
        let store = InMemoryStore::with_sample_data();
        let mut tx = store.begin().await.unwrap();

        let err = tx.decrement_stock(ProductId::new(2), 51).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 51,
                available: 50,
                ..
            }
        ));

        let err = tx.decrement_stock(ProductId::new(99), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::ProductNotFound(id) if id == ProductId::new(99)));
    }

    #[tokio::test]
    async fn test_increment_missing_product_returns_none() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert!(
            tx.increment_stock(ProductId::new(1), 3)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_increment_past_max_stock_is_rejected() {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Bulk", Money::from_cents(1), Product::MAX_STOCK - 1))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.increment_stock(product.id, 2).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::StockOverflow { stock, quantity: 2, .. } if stock == Product::MAX_STOCK - 1
        ));
        assert!(matches!(
            tx.increment_stock(product.id, u32::MAX).await,
            Err(StoreError::StockOverflow { .. })
        ));

        let restored = tx.increment_stock(product.id, 1).await.unwrap().unwrap();
        assert_eq!(restored.stock, Product::MAX_STOCK);
    }

    #[tokio::test]
    async fn test_user_email_must_be_unique() {
        let store = InMemoryStore::with_sample_data();

        let err = store
            .insert_user(NewUser::new("Copy", "admin@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(email) if email == "admin@example.com"));

        let bob = store
            .insert_user(NewUser::new("Bob", "bob@example.com"))
            .await
            .unwrap();
        let err = store
            .update_user(bob.id, NewUser::new("Bob", "admin@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(_)));

        // Keeping your own email is not a conflict.
        let renamed = store
            .update_user(bob.id, NewUser::new("Robert", "bob@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "Robert");
        assert_eq!(store.list_users().await.unwrap().len(), 2);

        assert!(
            store
                .update_user(UserId::new(99), NewUser::new("Nobody", "x@example.com"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_user_with_orders_cannot_be_deleted() {
        let store = InMemoryStore::with_sample_data();
        let mut tx = store.begin().await.unwrap();
        let order = tx
            .insert_order(new_order(UserId::new(1), ProductId::new(1), 1))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let err = store.delete_user(UserId::new(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::UserHasOrders(id) if id == UserId::new(1)));

        let mut tx = store.begin().await.unwrap();
        tx.delete_order(order.id).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.delete_user(UserId::new(1)).await.unwrap());
        assert!(!store.delete_user(UserId::new(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_delete_product() {
        let store = InMemoryStore::with_sample_data();

        let updated = store
            .update_product(
                ProductId::new(1),
                NewProduct::new("Renamed", Money::from_cents(500), 7),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.description, None);
        assert_eq!(updated.price, Money::from_cents(500));
        assert_eq!(updated.stock, 7);

        assert!(store.delete_product(ProductId::new(1)).await.unwrap());
        assert!(!store.delete_product(ProductId::new(1)).await.unwrap());
        assert!(
            store
                .update_product(ProductId::new(1), NewProduct::new("Gone", Money::zero(), 0))
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(store.list_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transition_is_guarded_by_current_status() {
        let store = InMemoryStore::with_sample_data();
        let mut tx = store.begin().await.unwrap();
        let order = tx
            .insert_order(new_order(UserId::new(1), ProductId::new(1), 1))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let now = Utc::now();
        let moved = store
            .transition_order_status(
                order.id,
                &[OrderStatus::Processing],
                OrderStatus::Completed,
                now,
            )
            .await
            .unwrap();
        assert!(moved.is_none());

        let moved = store
            .transition_order_status(
                order.id,
                &[OrderStatus::Pending],
                OrderStatus::Processing,
                now,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.status, OrderStatus::Processing);
        assert_eq!(moved.updated_at, now);
    }

    #[tokio::test]
    async fn test_list_by_status_older_than() {
        let store = InMemoryStore::with_sample_data();
        let mut tx = store.begin().await.unwrap();
        let old = tx
            .insert_order(new_order(UserId::new(1), ProductId::new(1), 1))
            .await
            .unwrap();
        let fresh = tx
            .insert_order(new_order(UserId::new(1), ProductId::new(2), 1))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        store
            .backdate_order(old.id, Utc::now() - chrono::Duration::hours(2))
            .await;

        let cutoff = Utc::now() - chrono::Duration::hours(1);
        let found = store
            .list_orders_by_status_older_than(&OrderStatus::OPEN, cutoff)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, old.id);
        assert_ne!(found[0].id, fresh.id);
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key_is_not_recorded() {
        let store = InMemoryStore::new();
        let first = NewNotification::order_completed(OrderId::new(1)).with_idempotency_key("k1");

        assert!(store.save_notification(first.clone()).await.unwrap().is_some());
        assert!(store.save_notification(first).await.unwrap().is_none());
        assert_eq!(store.notification_count().await, 1);

        // Unkeyed notifications are never deduplicated.
        let unkeyed = NewNotification::order_created(OrderId::new(1), Money::zero());
        store.save_notification(unkeyed.clone()).await.unwrap();
        store.save_notification(unkeyed).await.unwrap();
        assert_eq!(store.notification_count().await, 3);
    }

    #[tokio::test]
    async fn test_mark_email_sent() {
        let store = InMemoryStore::new();
        let saved = store
            .save_notification(NewNotification::order_completed(OrderId::new(4)))
            .await
            .unwrap()
            .unwrap();
        assert!(!saved.email_sent);

        store.mark_notification_email_sent(saved.id).await.unwrap();

        let listed = store.list_notifications(OrderId::new(4)).await.unwrap();
        assert!(listed[0].email_sent);
    }

    #[tokio::test]
    async fn test_fail_on_notification() {
        let store = InMemoryStore::new();
        store.set_fail_on_notification(true);

        let result = store
            .save_notification(NewNotification::order_completed(OrderId::new(1)))
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
