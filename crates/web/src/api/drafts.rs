//! Draft endpoints, addressed by opaque draft id.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use docdraft_core::draft::{
    resolve_doc_path, DiffSummary, DraftContent, DraftRef, DraftService, OpenedReview,
    SaveOutcome, StatusReport, UpdateOutcome,
};
use docdraft_core::errors::DraftError;

use crate::api::status::AppError;
use crate::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub content: Option<String>,
    pub client_base_sha: Option<String>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/drafts/:draft_id/content", get(get_content))
        .route("/api/drafts/:draft_id/save", post(save))
        .route("/api/drafts/:draft_id/update-from-main", post(update_from_main))
        .route("/api/drafts/:draft_id/status", get(get_status))
        .route("/api/drafts/:draft_id/diff", get(get_diff))
        .route("/api/drafts/:draft_id/open-pr", post(open_pr))
}

/// Bearer token from the `Authorization` header, if present.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Decode the draft id and build a service over the store for its repository.
/// The document must live under the configured docs root.
fn draft_service(
    state: &AppState,
    headers: &HeaderMap,
    draft_id: &str,
) -> Result<(DraftRef, DraftService), AppError> {
    let draft = DraftRef::decode(draft_id)?;
    let resolved = resolve_doc_path(&state.config.github.docs_root, &draft.doc_path)?;
    if resolved != draft.doc_path {
        return Err(DraftError::InvalidPath(draft.doc_path).into());
    }
    let store = state.stores.store_for(&draft, bearer_token(headers))?;
    Ok((draft, DraftService::new(store)))
}

async fn get_content(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(draft_id): Path<String>,
) -> Result<Json<DraftContent>, AppError> {
    let (draft, service) = draft_service(&state, &headers, &draft_id)?;
    Ok(Json(service.get_content(&draft).await?))
}

async fn save(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(draft_id): Path<String>,
    Json(body): Json<SaveRequest>,
) -> Result<Json<SaveOutcome>, AppError> {
    let (draft, service) = draft_service(&state, &headers, &draft_id)?;
    let (Some(content), Some(client_base_sha)) = (body.content, body.client_base_sha) else {
        return Err(AppError::BadRequest(
            "missing content or clientBaseSha".into(),
        ));
    };

    match service.save_draft(&draft, &content, &client_base_sha).await? {
        SaveOutcome::Conflict { conflict } => Err(AppError::Conflict(Box::new(conflict))),
        outcome => {
            info!(doc = %draft.doc_path, "draft save handled");
            Ok(Json(outcome))
        }
    }
}

async fn update_from_main(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(draft_id): Path<String>,
) -> Result<Json<UpdateOutcome>, AppError> {
    let (draft, service) = draft_service(&state, &headers, &draft_id)?;
    match service.update_from_main(&draft).await? {
        UpdateOutcome::Conflict { conflict } => Err(AppError::Conflict(Box::new(conflict))),
        outcome => Ok(Json(outcome)),
    }
}

async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(draft_id): Path<String>,
) -> Result<Json<StatusReport>, AppError> {
    let (draft, service) = draft_service(&state, &headers, &draft_id)?;
    Ok(Json(service.get_status(&draft).await?))
}

async fn get_diff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(draft_id): Path<String>,
) -> Result<Json<DiffSummary>, AppError> {
    let (draft, service) = draft_service(&state, &headers, &draft_id)?;
    Ok(Json(service.get_diff(&draft).await?))
}

async fn open_pr(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(draft_id): Path<String>,
) -> Result<Json<OpenedReview>, AppError> {
    let (draft, service) = draft_service(&state, &headers, &draft_id)?;
    Ok(Json(service.open_review(&draft).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
