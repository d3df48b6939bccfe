//! Remote object store access.
//!
//! The draft service only ever talks to the store through [`ObjectStore`]:
//! read a branch head, fork a branch, read a file at a commit, commit a file
//! conditioned on the branch head, compare two branches, and look up review
//! requests. [`GitHubStore`] speaks the GitHub REST API, [`InMemoryStore`]
//! keeps everything in process, and [`RetryingStore`] wraps either with
//! bounded backoff.

pub mod github;
pub mod memory;
pub mod retry;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::models::{BranchComparison, FileSnapshot, ReviewRequest};

pub use github::GitHubStore;
pub use memory::InMemoryStore;
pub use retry::{RetryPolicy, RetryingStore};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Current head commit of `branch`, or `None` if the branch does not exist.
    async fn branch_head(&self, branch: &str) -> Result<Option<String>, StoreError>;

    /// Create `branch` pointing at `from_commit`.
    ///
    /// Fails with [`StoreError::AlreadyExists`] when the branch is present.
    async fn create_branch(&self, branch: &str, from_commit: &str) -> Result<(), StoreError>;

    /// Content of `path` in the tree of `commit`. A missing path is reported
    /// as an absent snapshot, a missing commit as [`StoreError::NotFound`].
    async fn read_file_at(&self, commit: &str, path: &str) -> Result<FileSnapshot, StoreError>;

    /// Commit `content` at `path` on top of `parent` and move `branch` to the
    /// new commit. Fails with [`StoreError::HeadMoved`] if `branch` no longer
    /// points at `parent`.
    async fn commit_file(
        &self,
        branch: &str,
        parent: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String, StoreError>;

    async fn compare_branches(
        &self,
        base: &str,
        head: &str,
    ) -> Result<BranchComparison, StoreError>;

    async fn get_review_request(&self, number: u64) -> Result<ReviewRequest, StoreError>;

    /// The open review request whose head is `head` (`owner:branch`), if any.
    async fn find_open_review_request(
        &self,
        head: &str,
    ) -> Result<Option<ReviewRequest>, StoreError>;

    async fn create_review_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<ReviewRequest, StoreError>;

    /// Return the head of `branch`, forking it from `base`'s current head if
    /// it does not exist yet.
    ///
    /// Concurrent callers may both attempt the create; the loser sees
    /// `AlreadyExists`, which is treated as success. The head is always
    /// re-read afterwards rather than trusting the create call.
    async fn ensure_branch(&self, branch: &str, base: &str) -> Result<String, StoreError> {
        if let Some(head) = self.branch_head(branch).await? {
            return Ok(head);
        }

        let base_head = self
            .branch_head(base)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("base branch '{}'", base)))?;

        match self.create_branch(branch, &base_head).await {
            Ok(()) => info!(branch, base, from = %base_head, "created draft branch"),
            Err(StoreError::AlreadyExists(_)) => {
                debug!(branch, "branch created concurrently, re-reading head")
            }
            Err(e) => return Err(e),
        }

        self.branch_head(branch)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("branch '{}'", branch)))
    }
}
