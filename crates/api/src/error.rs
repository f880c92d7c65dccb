//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use workflow::{ErrorKind, WorkflowError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Workflow operation failed.
    Workflow(WorkflowError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Workflow(err) => workflow_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn workflow_error_to_response(err: WorkflowError) -> (StatusCode, String) {
    let status = match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidInput | ErrorKind::InsufficientStock => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidTransition | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::MalformedEvent | ErrorKind::TransportFailure | ErrorKind::PersistenceFailure => {
            tracing::error!(error = %err, "workflow failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<domain::CatalogError> for ApiError {
    fn from(err: domain::CatalogError) -> Self {
        ApiError::Workflow(err.into())
    }
}

impl From<store::StoreError> for ApiError {
    fn from(err: store::StoreError) -> Self {
        ApiError::Workflow(err.into())
    }
}
