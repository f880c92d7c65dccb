//! HTTP API for the order-processing service.
//!
//! Exposes order creation, deletion and status override plus product and
//! user management, with structured logging (tracing) and Prometheus
//! metrics. Background event processing is started by the binary.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use bus::EventPublisher;
use metrics_exporter_prometheus::PrometheusHandle;
use store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, P>(state: Arc<AppState<S, P>>, metrics_handle: PrometheusHandle) -> Router
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S, P>))
        .route(
            "/orders",
            get(routes::orders::list::<S, P>).post(routes::orders::create::<S, P>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S, P>)
                .put(routes::orders::update_status::<S, P>)
                .delete(routes::orders::delete::<S, P>),
        )
        .route(
            "/orders/{id}/notifications",
            get(routes::orders::notifications::<S, P>),
        )
        .route(
            "/products",
            get(routes::catalog::list_products::<S, P>)
                .post(routes::catalog::create_product::<S, P>),
        )
        .route(
            "/products/{id}",
            get(routes::catalog::get_product::<S, P>)
                .put(routes::catalog::update_product::<S, P>)
                .delete(routes::catalog::delete_product::<S, P>),
        )
        .route(
            "/users",
            get(routes::catalog::list_users::<S, P>).post(routes::catalog::create_user::<S, P>),
        )
        .route(
            "/users/{id}",
            get(routes::catalog::get_user::<S, P>)
                .put(routes::catalog::update_user::<S, P>)
                .delete(routes::catalog::delete_user::<S, P>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
