//! Liveness endpoint that checks the store.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use bus::EventPublisher;
use serde::Serialize;
use store::OrderStore;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
}

/// GET /health: 200 when the store answers, 503 otherwise.
pub async fn check<S, P>(State(state): State<Arc<AppState<S, P>>>) -> (StatusCode, Json<HealthResponse>)
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    match state.order_service.store().list_products().await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                store: "ok",
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    store: "unavailable",
                }),
            )
        }
    }
}
