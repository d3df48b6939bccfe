//! Bounded exponential-backoff retry for remote store calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::ObjectStore;
use crate::errors::StoreError;
use crate::models::{BranchComparison, FileSnapshot, ReviewRequest};

/// How many times to try a call and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled after every retry.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    /// Run `call` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut delay = self.initial_delay;
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    warn!(
                        op,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient store failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// [`ObjectStore`] decorator that applies a [`RetryPolicy`] to every call.
///
/// `ensure_branch` is inherited from the trait, so each of its steps is
/// retried individually.
#[derive(Clone)]
pub struct RetryingStore {
    inner: Arc<dyn ObjectStore>,
    policy: RetryPolicy,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn ObjectStore>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ObjectStore for RetryingStore {
    async fn branch_head(&self, branch: &str) -> Result<Option<String>, StoreError> {
        self.policy
            .run("branch_head", || self.inner.branch_head(branch))
            .await
    }

    async fn create_branch(&self, branch: &str, from_commit: &str) -> Result<(), StoreError> {
        self.policy
            .run("create_branch", || self.inner.create_branch(branch, from_commit))
            .await
    }

    async fn read_file_at(&self, commit: &str, path: &str) -> Result<FileSnapshot, StoreError> {
        self.policy
            .run("read_file_at", || self.inner.read_file_at(commit, path))
            .await
    }

    async fn commit_file(
        &self,
        branch: &str,
        parent: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String, StoreError> {
        self.policy
            .run("commit_file", || {
                self.inner.commit_file(branch, parent, path, content, message)
            })
            .await
    }

    async fn compare_branches(
        &self,
        base: &str,
        head: &str,
    ) -> Result<BranchComparison, StoreError> {
        self.policy
            .run("compare_branches", || self.inner.compare_branches(base, head))
            .await
    }

    async fn get_review_request(&self, number: u64) -> Result<ReviewRequest, StoreError> {
        self.policy
            .run("get_review_request", || self.inner.get_review_request(number))
            .await
    }

    async fn find_open_review_request(
        &self,
        head: &str,
    ) -> Result<Option<ReviewRequest>, StoreError> {
        self.policy
            .run("find_open_review_request", || {
                self.inner.find_open_review_request(head)
            })
            .await
    }

    async fn create_review_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<ReviewRequest, StoreError> {
        self.policy
            .run("create_review_request", || {
                self.inner.create_review_request(title, body, head, base)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::store::InMemoryStore;

    fn api_error(status: u16) -> StoreError {
        StoreError::Api {
            status,
            body: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = RetryPolicy::default()
            .run("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(api_error(503))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 300ms + 600ms of backoff before the third attempt.
        assert_eq!(started.elapsed(), Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = RetryPolicy::default()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(StoreError::RateLimited {
                        reset_at: "unknown".into(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(StoreError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(300 + 600 + 1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_errors_are_not_retried() {
        for err in [
            StoreError::NotFound("ref".into()),
            StoreError::AuthenticationFailed("HTTP 401".into()),
            StoreError::HeadMoved {
                branch: "b".into(),
                expected: "c".into(),
            },
            api_error(422),
        ] {
            let calls = AtomicU32::new(0);
            let mut pending = Some(err);
            let result: Result<(), _> = RetryPolicy::default()
                .run("op", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let err = pending.take().expect("called more than once");
                    async move { Err(err) }
                })
                .await;
            assert!(result.is_err());
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_calls_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            initial_delay: Duration::from_millis(10),
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(api_error(500)) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrying_store_recovers_from_injected_failures() {
        let memory = Arc::new(InMemoryStore::new());
        let root = memory.seed_branch("main", &[("doc.md", "hello\n")]);
        memory.fail_next([502, 429]);

        let store = RetryingStore::new(memory.clone(), RetryPolicy::default());
        assert_eq!(store.branch_head("main").await.unwrap(), Some(root));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrying_store_surfaces_exhausted_budget() {
        let memory = Arc::new(InMemoryStore::new());
        memory.seed_branch("main", &[]);
        memory.fail_next([500, 500]);

        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
        };
        let store = RetryingStore::new(memory.clone(), policy);
        let err = store.branch_head("main").await.unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 500, .. }));
    }
}
