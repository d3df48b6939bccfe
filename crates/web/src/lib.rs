//! docdraft web server and REST API.
//!
//! Provides an Axum-based HTTP server with:
//! - Health endpoint
//! - Draft content, save, update-from-base, status, diff and review-request
//!   endpoints addressed by opaque draft id
//!
//! Each request builds its object store from the caller's bearer token, so the
//! server holds no per-draft state.

pub mod api;
pub mod stores;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use docdraft_core::config::AppConfig;

pub use stores::{GitHubStores, SharedStore, StoreProvider};

/// Shared application state accessible from all handlers.
pub struct AppState {
    /// Handlers check document paths against `github.docs_root`.
    pub config: AppConfig,
    /// Builds the object store a request talks to.
    pub stores: Arc<dyn StoreProvider>,
}

/// The web server.
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: AppConfig, stores: Arc<dyn StoreProvider>) -> Self {
        Self {
            state: Arc::new(AppState { config, stores }),
        }
    }

    /// The full application router with middleware applied.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

        Router::new()
            .merge(api::status::routes())
            .merge(api::drafts::routes())
            .layer(
                ServiceBuilder::new()
                    .layer(DefaultBodyLimit::max(2 * 1024 * 1024)) // 2 MB max request body
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(self.state.clone())
    }

    /// Serve on `listen_addr` until `shutdown` resolves.
    pub async fn start<F>(self, listen_addr: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listen_addr.parse()?;
        let app = self.router();

        info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("web server stopped");
        Ok(())
    }
}
