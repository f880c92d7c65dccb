use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId, ProductId, UserId};
use domain::{
    Money, NewNotification, NewOrder, NewProduct, NewUser, Notification, NotificationKind, Order,
    OrderItem, OrderStatus, Product, User,
};
use sqlx::{
    PgConnection, PgPool, Postgres, Row,
    postgres::{PgPoolOptions, PgRow},
};

use crate::{OrderStore, Result, StoreError, StoreTransaction};

const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, stock, created_at";
const ORDER_COLUMNS: &str = "id, user_id, total_cents, status, created_at, updated_at";
const NOTIFICATION_COLUMNS: &str =
    "id, order_id, event_type, message, email_sent, idempotency_key, created_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool against `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidData(format!("negative {column}: {value}")))
}

fn stock_param(product: &NewProduct) -> Result<i32> {
    i32::try_from(product.stock)
        .map_err(|_| StoreError::InvalidData(format!("stock too large: {}", product.stock)))
}

fn duplicate_email(err: sqlx::Error, email: &str) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::DuplicateEmail(email.to_string())
        }
        other => StoreError::Database(other),
    }
}

fn row_to_user(row: &PgRow) -> Result<User> {
    Ok(User {
        id: UserId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
    })
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_u32(row.try_get("stock")?, "stock")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::InvalidData(e.to_string()))?;

    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        items,
        total: Money::from_cents(row.try_get("total_cents")?),
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem::new(
        ProductId::new(row.try_get("product_id")?),
        to_u32(row.try_get("quantity")?, "quantity")?,
        Money::from_cents(row.try_get("price_cents")?),
    ))
}

fn row_to_notification(row: &PgRow) -> Result<Notification> {
    let event_type: String = row.try_get("event_type")?;
    let kind = NotificationKind::parse(&event_type).ok_or_else(|| {
        StoreError::InvalidData(format!("unknown notification type: {event_type}"))
    })?;

    Ok(Notification {
        id: NotificationId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        kind,
        message: row.try_get("message")?,
        email_sent: row.try_get("email_sent")?,
        idempotency_key: row.try_get("idempotency_key")?,
        created_at: row.try_get("created_at")?,
    })
}

fn status_names(statuses: &[OrderStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

async fn find_user(conn: &mut PgConnection, id: UserId) -> Result<Option<User>> {
    sqlx::query("SELECT id, name, email FROM users WHERE id = $1")
        .bind(id.as_i64())
        .fetch_optional(conn)
        .await?
        .as_ref()
        .map(row_to_user)
        .transpose()
}

async fn find_product(conn: &mut PgConnection, id: ProductId) -> Result<Option<Product>> {
    sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id.as_i64())
    .fetch_optional(conn)
    .await?
    .as_ref()
    .map(row_to_product)
    .transpose()
}

/// Loads the line items of the given orders, keyed by order id, in insertion order.
async fn load_items(
    conn: &mut PgConnection,
    order_ids: &[i64],
) -> Result<HashMap<i64, Vec<OrderItem>>> {
    let rows = sqlx::query(
        r#"
        SELECT order_id, product_id, quantity, price_cents
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY order_id ASC, position ASC
        "#,
    )
    .bind(order_ids)
    .fetch_all(conn)
    .await?;

    let mut items: HashMap<i64, Vec<OrderItem>> = HashMap::new();
    for row in &rows {
        let order_id: i64 = row.try_get("order_id")?;
        items.entry(order_id).or_default().push(row_to_item(row)?);
    }
    Ok(items)
}

async fn orders_with_items(conn: &mut PgConnection, rows: Vec<PgRow>) -> Result<Vec<Order>> {
    let ids = rows
        .iter()
        .map(|row| row.try_get::<i64, _>("id"))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut items = load_items(conn, &ids).await?;

    rows.iter()
        .zip(ids)
        .map(|(row, id)| row_to_order(row, items.remove(&id).unwrap_or_default()))
        .collect()
}

async fn find_order(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>> {
    let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(orders_with_items(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        find_user(&mut conn, id).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT id, name, email FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_user).collect()
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query("INSERT INTO users (name, email) VALUES ($1, $2) RETURNING id, name, email")
            .bind(&user.name)
            .bind(&user.email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| duplicate_email(e, &user.email))?;
        row_to_user(&row)
    }

    async fn update_user(&self, id: UserId, user: NewUser) -> Result<Option<User>> {
        sqlx::query("UPDATE users SET name = $2, email = $3 WHERE id = $1 RETURNING id, name, email")
            .bind(id.as_i64())
            .bind(&user.name)
            .bind(&user.email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| duplicate_email(e, &user.email))?
            .as_ref()
            .map(row_to_user)
            .transpose()
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        // orders.user_id has no cascade, so a referenced user fails the foreign key.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    StoreError::UserHasOrders(id)
                }
                other => StoreError::Database(other),
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        find_product(&mut conn, id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let stock = stock_param(&product)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (name, description, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(stock)
        .fetch_one(&self.pool)
        .await?;

        row_to_product(&row)
    }

    async fn update_product(&self, id: ProductId, product: NewProduct) -> Result<Option<Product>> {
        let stock = stock_param(&product)?;

        sqlx::query(&format!(
            r#"
            UPDATE products SET name = $2, description = $3, price_cents = $4, stock = $5
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(stock)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(row_to_product)
        .transpose()
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        find_order(&mut conn, id).await
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY id ASC"))
            .fetch_all(&mut *conn)
            .await?;

        orders_with_items(&mut conn, rows).await
    }

    async fn list_orders_by_status_older_than(
        &self,
        statuses: &[OrderStatus],
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE status = ANY($1) AND created_at <= $2
            ORDER BY created_at ASC
            "#
        ))
        .bind(status_names(statuses))
        .bind(cutoff)
        .fetch_all(&mut *conn)
        .await?;

        orders_with_items(&mut conn, rows).await
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!(
            "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_i64())
        .bind(status.as_str())
        .bind(updated_at)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(orders_with_items(&mut conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn transition_order_status(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders SET status = $3, updated_at = $4
            WHERE id = $1 AND status = ANY($2)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(status_names(from))
        .bind(to.as_str())
        .bind(updated_at)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(orders_with_items(&mut conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn save_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>> {
        sqlx::query(&format!(
            r#"
            INSERT INTO notifications (order_id, event_type, message, email_sent, idempotency_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(notification.order_id.as_i64())
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.email_sent)
        .bind(&notification.idempotency_key)
        .bind(notification.created_at)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(row_to_notification)
        .transpose()
    }

    async fn mark_notification_email_sent(&self, id: NotificationId) -> Result<()> {
        sqlx::query("UPDATE notifications SET email_sent = TRUE WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_notifications(&self, order_id: OrderId) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE order_id = $1 ORDER BY id ASC"
        ))
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_notification).collect()
    }
}

/// A database transaction over a [`PostgresStore`].
///
/// Dropping it without committing rolls back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>> {
        find_user(&mut self.tx, id).await
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        find_product(&mut self.tx, id).await
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        find_order(&mut self.tx, id).await
    }

    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<Product> {
        // Check and decrement in one statement so concurrent orders cannot oversell.
        // The quantity is bound as BIGINT so values past the column range just fail the check.
        let row = sqlx::query(&format!(
            r#"
            UPDATE products SET stock = stock - $2
            WHERE id = $1 AND stock >= $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id.as_i64())
        .bind(i64::from(quantity))
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(row) = row {
            return row_to_product(&row);
        }

        match find_product(&mut self.tx, product_id).await? {
            Some(product) => Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            }),
            None => Err(StoreError::ProductNotFound(product_id)),
        }
    }

    async fn increment_stock(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products SET stock = stock + $2
            WHERE id = $1 AND stock::BIGINT + $2 <= $3
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id.as_i64())
        .bind(i64::from(quantity))
        .bind(i64::from(Product::MAX_STOCK))
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(row) = row {
            return row_to_product(&row).map(Some);
        }

        match find_product(&mut self.tx, product_id).await? {
            Some(product) => Err(StoreError::StockOverflow {
                product_id,
                stock: product.stock,
                quantity,
            }),
            None => Ok(None),
        }
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (user_id, total_cents, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id
            "#,
        )
        .bind(order.user_id.as_i64())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                StoreError::InvalidData(format!("quantity too large: {}", item.quantity))
            })?;

            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, quantity, price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id)
            .bind(position as i32)
            .bind(item.product_id.as_i64())
            .bind(quantity)
            .bind(item.unit_price.cents())
            .execute(&mut *self.tx)
            .await?;
        }

        tracing::debug!(order_id = id, items = order.items.len(), "Inserted order");
        Ok(order.into_order(OrderId::new(id)))
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
