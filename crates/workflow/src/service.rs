//! Order lifecycle operations shared by the API and the background workers.

use bus::{EventPublisher, EventPublisherExt};
use chrono::Utc;
use common::OrderId;
use domain::{
    CreateOrder, DomainEvent, NewNotification, NewOrder, Notification, Order, OrderError, OrderEvent,
    OrderItem, OrderStatus,
};
use store::{OrderStore, StoreTransaction};

use crate::error::{Result, WorkflowError};

/// Creates, deletes and moves orders through their lifecycle.
///
/// Every multi-step mutation runs in one store transaction. Events are
/// published only after that transaction commits.
#[derive(Clone)]
pub struct OrderService<S, P> {
    store: S,
    publisher: P,
}

impl<S, P> OrderService<S, P>
where
    S: OrderStore,
    P: EventPublisher,
{
    pub fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    /// Gets a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reserves stock and records a pending order.
    ///
    /// The user lookup, every stock decrement and the order insert commit
    /// together or not at all. Once committed the order stands even if
    /// publishing OrderCreated or recording its audit notification fails.
    #[tracing::instrument(skip(self, command), fields(user_id = %command.user_id, lines = command.lines.len()))]
    pub async fn create_order(&self, command: CreateOrder) -> Result<Order> {
        let lines = command.validated_lines()?;

        let mut tx = self.store.begin().await?;

        if tx.find_user(command.user_id).await?.is_none() {
            return Err(WorkflowError::UserNotFound(command.user_id));
        }

        let mut items = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            let product = tx.decrement_stock(product_id, quantity).await?;
            items.push(OrderItem::new(product_id, quantity, product.price));
        }

        let order = tx
            .insert_order(NewOrder::new(command.user_id, items, Utc::now())?)
            .await?;
        tx.commit().await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, total = %order.total, "Order created");

        if let Err(e) = self.publish(&order.created_event()).await {
            tracing::warn!(order_id = %order.id, error = %e, "OrderCreated not published; order kept");
        }

        self.record_notification(NewNotification::order_created(order.id, order.total))
            .await;

        Ok(order)
    }

    /// Deletes an order and puts its reserved stock back.
    ///
    /// Items whose product no longer exists are skipped. A restore that would
    /// push stock past its maximum fails the whole deletion. No event is
    /// published. Returns the order as it was before deletion.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;

        let order = tx
            .find_order(id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(id))?;

        for item in &order.items {
            if tx
                .increment_stock(item.product_id, item.quantity)
                .await?
                .is_none()
            {
                tracing::warn!(
                    order_id = %id,
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    "Product gone; stock not restored"
                );
            }
        }

        tx.delete_order(id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, status = %order.status, "Order deleted");
        Ok(order)
    }

    /// Administrative status write that accepts any of the four statuses.
    ///
    /// Backward or sideways moves are allowed but logged at warn level.
    #[tracing::instrument(skip(self))]
    pub async fn override_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let current = self
            .store
            .find_order(id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(id))?;

        if !current.status.is_monotonic_to(status) {
            tracing::warn!(
                order_id = %id,
                from = %current.status,
                to = %status,
                "Non-monotonic status override"
            );
        }

        let updated = self
            .store
            .set_order_status(id, status, Utc::now())
            .await?
            .ok_or(WorkflowError::OrderNotFound(id))?;

        tracing::info!(order_id = %id, status = %updated.status, "Order status overridden");
        Ok(updated)
    }

    /// Parses a status string and applies it as an administrative override.
    pub async fn update_status(&self, id: OrderId, status: &str) -> Result<Order> {
        let status = status.parse::<OrderStatus>()?;
        self.override_status(id, status).await
    }

    /// Automated transition along an allowed edge of the status graph.
    ///
    /// The stored status is compared and replaced in one atomic step, so a
    /// concurrent writer that moved the order first makes this fail with
    /// an invalid transition instead of being overwritten.
    #[tracing::instrument(skip(self))]
    pub async fn transition(&self, id: OrderId, to: OrderStatus) -> Result<Order> {
        let moved = self
            .store
            .transition_order_status(id, to.allowed_from(), to, Utc::now())
            .await?;

        if let Some(order) = moved {
            tracing::debug!(order_id = %id, status = %to, "Order transitioned");
            return Ok(order);
        }

        match self.store.find_order(id).await? {
            Some(current) => Err(OrderError::InvalidTransition {
                from: current.status,
                to,
            }
            .into()),
            None => Err(WorkflowError::OrderNotFound(id)),
        }
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.store
            .find_order(id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(id))
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.list_orders().await?)
    }

    /// Lists an order's notifications. They outlive the order itself.
    pub async fn list_notifications(&self, order_id: OrderId) -> Result<Vec<Notification>> {
        Ok(self.store.list_notifications(order_id).await?)
    }

    /// Publishes an order event.
    pub async fn publish(&self, event: &OrderEvent) -> Result<()> {
        self.publisher.publish_event(event).await?;
        tracing::debug!(order_id = %event.order_id(), event_type = event.event_type(), "Event published");
        Ok(())
    }

    /// Records a notification, logging instead of failing.
    ///
    /// Returns `None` when the write failed or the record already existed.
    pub async fn record_notification(&self, notification: NewNotification) -> Option<Notification> {
        let order_id = notification.order_id;
        let kind = notification.kind;

        match self.store.save_notification(notification).await {
            Ok(Some(saved)) => {
                metrics::counter!("notifications_recorded_total", "kind" => kind.as_str())
                    .increment(1);
                Some(saved)
            }
            Ok(None) => {
                tracing::debug!(%order_id, %kind, "Notification already recorded");
                None
            }
            Err(e) => {
                tracing::error!(%order_id, %kind, error = %e, "Failed to record notification");
                None
            }
        }
    }
}
