//! Product and user management endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bus::EventPublisher;
use chrono::{DateTime, Utc};
use common::{ProductId, UserId};
use domain::{NewProduct, NewUser, Product, User};
use serde::{Deserialize, Serialize};
use store::OrderStore;

use super::AppState;
use crate::error::ApiError;

// -- Request types --

/// Body of POST /products and PUT /products/{id}; PUT replaces every field.
#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: i64,
}

/// Body of POST /users and PUT /users/{id}.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub name: String,
    pub email: String,
}

impl ProductRequest {
    fn parse(&self) -> Result<NewProduct, ApiError> {
        Ok(NewProduct::parse(
            &self.name,
            self.description.as_deref(),
            self.price_cents,
            self.stock,
        )?)
    }
}

impl UserRequest {
    fn parse(&self) -> Result<NewUser, ApiError> {
        Ok(NewUser::parse(&self.name, &self.email)?)
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub price: String,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name,
            description: product.description,
            price_cents: product.price.cents(),
            price: product.price.to_string(),
            stock: product.stock,
            created_at: product.created_at,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.as_i64(),
            name: user.name,
            email: user.email,
        }
    }
}

// -- Handlers --

/// GET /products
pub async fn list_products<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let products = state.catalog().list_products().await?;
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

/// GET /products/{id}
pub async fn get_product<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<i64>,
) -> Result<Json<ProductResponse>, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let product = state.catalog().get_product(ProductId::new(id)).await?;
    Ok(Json(product.into()))
}

/// POST /products
#[tracing::instrument(skip(state, req), fields(name = %req.name))]
pub async fn create_product<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let product = state.catalog().create_product(req.parse()?).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PUT /products/{id}
#[tracing::instrument(skip(state, req))]
pub async fn update_product<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<i64>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<ProductResponse>, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let product = state
        .catalog()
        .update_product(ProductId::new(id), req.parse()?)
        .await?;
    Ok(Json(product.into()))
}

/// DELETE /products/{id}
#[tracing::instrument(skip(state))]
pub async fn delete_product<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    state.catalog().delete_product(ProductId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users
pub async fn list_users<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
) -> Result<Json<Vec<UserResponse>>, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let users = state.catalog().list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// GET /users/{id}
pub async fn get_user<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let user = state.catalog().get_user(UserId::new(id)).await?;
    Ok(Json(user.into()))
}

/// POST /users: 400 if the email is already registered.
#[tracing::instrument(skip(state, req))]
pub async fn create_user<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Json(req): Json<UserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let user = state.catalog().create_user(req.parse()?).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// PUT /users/{id}
#[tracing::instrument(skip(state, req))]
pub async fn update_user<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<i64>,
    Json(req): Json<UserRequest>,
) -> Result<Json<UserResponse>, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let user = state
        .catalog()
        .update_user(UserId::new(id), req.parse()?)
        .await?;
    Ok(Json(user.into()))
}

/// DELETE /users/{id}: 409 while the user still owns orders.
#[tracing::instrument(skip(state))]
pub async fn delete_user<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    state.catalog().delete_user(UserId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
