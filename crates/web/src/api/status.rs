//! Health endpoint and the shared API error type.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use docdraft_core::draft::ConflictPayload;
use docdraft_core::errors::{DraftError, StoreError};

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/status/health", get(health_check))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ---------------------------------------------------------------------------
// Shared error type for API handlers
// ---------------------------------------------------------------------------

/// API error type that converts to an Axum response.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    /// A merge needs manual resolution; the body is the conflict payload.
    Conflict(Box<ConflictPayload>),
    /// The draft branch moved during the request; re-read and retry.
    HeadMoved(String),
    /// The remote store failed or was unavailable.
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Conflict(payload) => {
                return (StatusCode::CONFLICT, Json(payload)).into_response();
            }
            AppError::HeadMoved(msg) => (
                StatusCode::PRECONDITION_FAILED,
                serde_json::json!({ "error": msg, "code": "head_moved" }),
            ),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, serde_json::json!({ "error": msg }))
            }
            AppError::BadGateway(msg) => {
                (StatusCode::BAD_GATEWAY, serde_json::json!({ "error": msg }))
            }
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": msg }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DraftError> for AppError {
    fn from(err: DraftError) -> Self {
        let msg = err.to_string();
        match err {
            DraftError::InvalidId(_)
            | DraftError::MissingField(_)
            | DraftError::MissingClientBaseSha
            | DraftError::InvalidPath(_) => AppError::BadRequest(msg),
            DraftError::BaseBranchNotFound(_) => AppError::NotFound(msg),
            DraftError::Store(store) => store.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let msg = err.to_string();
        match err {
            StoreError::NotFound(_) => AppError::NotFound(msg),
            StoreError::AuthenticationFailed(_) => AppError::Unauthorized(msg),
            StoreError::HeadMoved { .. } => AppError::HeadMoved(msg),
            StoreError::Http(_) | StoreError::Api { .. } | StoreError::RateLimited { .. } => {
                warn!(error = %msg, "remote store failure");
                AppError::BadGateway(msg)
            }
            StoreError::AlreadyExists(_) | StoreError::Parse(_) => AppError::Internal(msg),
        }
    }
}
