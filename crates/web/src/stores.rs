//! Per-request object store construction.

use std::sync::Arc;

use docdraft_core::config::AppConfig;
use docdraft_core::draft::DraftRef;
use docdraft_core::store::{GitHubStore, ObjectStore, RetryPolicy, RetryingStore};

use crate::api::status::AppError;

/// Hands out the store a request for `draft` should use.
pub trait StoreProvider: Send + Sync {
    /// `token` is the caller's bearer token, if the request carried one.
    fn store_for(
        &self,
        draft: &DraftRef,
        token: Option<&str>,
    ) -> Result<Arc<dyn ObjectStore>, AppError>;
}

/// GitHub-backed stores, one per request, authenticated with the caller's
/// token or the configured service token.
pub struct GitHubStores {
    api_url: String,
    service_token: Option<String>,
    retry: RetryPolicy,
}

impl GitHubStores {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            api_url: config.github.api_url.clone(),
            service_token: config.github.token.clone(),
            retry: config.retry.policy(),
        }
    }
}

impl StoreProvider for GitHubStores {
    fn store_for(
        &self,
        draft: &DraftRef,
        token: Option<&str>,
    ) -> Result<Arc<dyn ObjectStore>, AppError> {
        let token = token
            .or(self.service_token.as_deref())
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
        let github = GitHubStore::new(&self.api_url, token, &draft.owner, &draft.repo)
            .map_err(|e| AppError::Internal(format!("failed to build store client: {}", e)))?;
        Ok(Arc::new(RetryingStore::new(Arc::new(github), self.retry)))
    }
}

/// One store shared by every request regardless of repository or token.
pub struct SharedStore(pub Arc<dyn ObjectStore>);

impl StoreProvider for SharedStore {
    fn store_for(
        &self,
        _draft: &DraftRef,
        _token: Option<&str>,
    ) -> Result<Arc<dyn ObjectStore>, AppError> {
        Ok(self.0.clone())
    }
}
