//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bus::EventPublisher;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{CreateOrder, Notification, Order, OrderItem, OrderLine};
use serde::{Deserialize, Serialize};
use store::OrderStore;

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub total: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: i64,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct NotificationResponse {
    pub id: i64,
    pub order_id: i64,
    pub event_type: String,
    pub message: String,
    pub email_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.as_i64(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.as_i64(),
            user_id: order.user_id.as_i64(),
            status: order.status.to_string(),
            items: order.items.iter().map(OrderItemResponse::from).collect(),
            total_cents: order.total.cents(),
            total: order.total.to_string(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id.as_i64(),
            order_id: notification.order_id.as_i64(),
            event_type: notification.kind.to_string(),
            message: notification.message,
            email_sent: notification.email_sent,
            created_at: notification.created_at,
        }
    }
}

// -- Handlers --

/// POST /orders: reserve stock and create a pending order.
#[tracing::instrument(skip(state, req), fields(user_id = req.user_id))]
pub async fn create<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let command = CreateOrder::new(
        UserId::new(req.user_id),
        req.items
            .iter()
            .map(|line| OrderLine::new(ProductId::new(line.product_id), line.quantity))
            .collect(),
    );

    let order = state.order_service.create_order(command).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders: list every order.
#[tracing::instrument(skip(state))]
pub async fn list<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let orders = state.order_service.list_orders().await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let order = state.order_service.get_order(OrderId::new(id)).await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}: administrative status override.
#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn update_status<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let order = state
        .order_service
        .update_status(OrderId::new(id), &req.status)
        .await?;
    Ok(Json(order.into()))
}

/// DELETE /orders/{id}: delete and restore reserved stock.
#[tracing::instrument(skip(state))]
pub async fn delete<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    state.order_service.delete_order(OrderId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /orders/{id}/notifications: the order's audit trail.
#[tracing::instrument(skip(state))]
pub async fn notifications<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<NotificationResponse>>, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let notifications = state
        .order_service
        .list_notifications(OrderId::new(id))
        .await?;
    Ok(Json(
        notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
    ))
}
