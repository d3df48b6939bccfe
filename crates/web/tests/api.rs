//! Router-level tests for the draft API, backed by the in-memory store.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use docdraft_core::config::AppConfig;
use docdraft_core::draft::DraftRef;
use docdraft_core::store::{InMemoryStore, ObjectStore};
use docdraft_web::{SharedStore, WebServer};

const DOC: &str = "content/docs/intro.md";

fn draft_id() -> String {
    DraftRef {
        owner: "acme".into(),
        repo: "docs".into(),
        base_branch: "main".into(),
        draft_branch: "drafts/alice/intro".into(),
        doc_path: DOC.into(),
        pr_number: None,
    }
    .encode()
}

fn app() -> (Arc<InMemoryStore>, Router) {
    let store = Arc::new(InMemoryStore::new());
    store.seed_branch("main", &[(DOC, "a\nb\nc\n")]);
    let server = WebServer::new(AppConfig::default(), Arc::new(SharedStore(store.clone())));
    (store, server.router())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (_store, app) = app();
    let (status, body) = send(&app, "GET", "/api/status/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_content_then_save() {
    let (store, app) = app();
    let id = draft_id();

    let (status, content) = send(&app, "GET", &format!("/api/drafts/{}/content", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content["exists"], true);
    assert_eq!(content["content"], "a\nb\nc\n");
    let head = content["headSha"].as_str().unwrap().to_string();

    let (status, saved) = send(
        &app,
        "POST",
        &format!("/api/drafts/{}/save", id),
        Some(json!({ "content": "a\nb\nc\nd\n", "clientBaseSha": head })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["status"], "OK");
    assert_ne!(saved["headSha"], head.as_str());
    assert_eq!(
        store.file_on_branch("drafts/alice/intro", DOC).as_deref(),
        Some("a\nb\nc\nd\n")
    );
}

#[tokio::test]
async fn test_save_conflict_returns_409_with_payload() {
    let (_store, app) = app();
    let id = draft_id();
    let (_, content) = send(&app, "GET", &format!("/api/drafts/{}/content", id), None).await;
    let base = content["headSha"].as_str().unwrap().to_string();

    let uri = format!("/api/drafts/{}/save", id);
    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(json!({ "content": "a\nb-theirs\nc\n", "clientBaseSha": base })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, conflict) = send(
        &app,
        "POST",
        &uri,
        Some(json!({ "content": "a\nb-ours\nc\n", "clientBaseSha": base })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(conflict["docPath"], DOC);
    assert!(conflict["conflictMarkers"]
        .as_str()
        .unwrap()
        .contains("<<<<<<< ours"));
    assert_eq!(conflict["hunks"].as_array().unwrap().len(), 1);
    assert_eq!(conflict["instructions"], "Resolve conflicts and save again.");
}

#[tokio::test]
async fn test_save_missing_fields_is_bad_request() {
    let (store, app) = app();
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/drafts/{}/save", draft_id()),
        Some(json!({ "content": "x\n" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("clientBaseSha"));
    assert_eq!(store.branch_head("drafts/alice/intro").await.unwrap(), None);
}

#[tokio::test]
async fn test_malformed_draft_id_is_bad_request() {
    let (_store, app) = app();
    let (status, body) = send(&app, "GET", "/api/drafts/%25%25%25/status", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid draft id"));
}

#[tokio::test]
async fn test_status_diff_and_open_pr() {
    let (_store, app) = app();
    let id = draft_id();

    let (status, report) = send(&app, "GET", &format!("/api/drafts/{}/status", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["status"], "Draft");
    assert_eq!(report["behindBy"], 0);

    let (status, diff) = send(&app, "GET", &format!("/api/drafts/{}/diff", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(diff["patch"], "");
    assert_eq!(diff["status"], "modified");

    let (status, opened) = send(&app, "POST", &format!("/api/drafts/{}/open-pr", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let number = opened["prNumber"].as_u64().unwrap();

    let (_, report) = send(&app, "GET", &format!("/api/drafts/{}/status", id), None).await;
    assert_eq!(report["status"], "In Review");
    assert_eq!(report["prNumber"], number);
}

#[tokio::test]
async fn test_update_from_main() {
    let (store, app) = app();
    let id = draft_id();
    send(&app, "GET", &format!("/api/drafts/{}/content", id), None).await;

    let main = store.branch_head("main").await.unwrap().unwrap();
    store
        .commit_file("main", &main, DOC, "a\nb\nc\nz\n", "upstream")
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/drafts/{}/update-from-main", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "UPDATED");
    assert_eq!(
        store.file_on_branch("drafts/alice/intro", DOC).as_deref(),
        Some("a\nb\nc\nz\n")
    );
}

#[tokio::test]
async fn test_missing_base_branch_is_not_found() {
    let (_store, app) = app();
    let id = DraftRef {
        owner: "acme".into(),
        repo: "docs".into(),
        base_branch: "release".into(),
        draft_branch: "drafts/alice/intro".into(),
        doc_path: DOC.into(),
        pr_number: None,
    }
    .encode();
    let (status, _) = send(&app, "GET", &format!("/api/drafts/{}/content", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_document_outside_docs_root_is_bad_request() {
    let (store, app) = app();
    for doc_path in ["README.md", "content/docs/../secrets.md"] {
        let id = DraftRef {
            owner: "acme".into(),
            repo: "docs".into(),
            base_branch: "main".into(),
            draft_branch: "drafts/alice/readme".into(),
            doc_path: doc_path.into(),
            pr_number: None,
        }
        .encode();
        let (status, body) =
            send(&app, "GET", &format!("/api/drafts/{}/content", id), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid document path"));
    }
    assert_eq!(store.branch_head("drafts/alice/readme").await.unwrap(), None);
}
