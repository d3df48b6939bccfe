//! In-process object store.
//!
//! Keeps commits, branch pointers and review requests in memory with the same
//! compare-and-swap semantics as the remote. Supports injecting HTTP-style
//! failures so retry and error paths can be exercised without a network.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::ObjectStore;
use crate::errors::StoreError;
use crate::merge::diff;
use crate::models::{BranchComparison, ChangedFile, FileSnapshot, ReviewRequest};

#[derive(Debug, Clone)]
struct StoredCommit {
    parent: Option<String>,
    files: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct StoredReview {
    head_branch: String,
    review: ReviewRequest,
}

#[derive(Debug, Default)]
struct State {
    commits: HashMap<String, StoredCommit>,
    branches: HashMap<String, String>,
    reviews: Vec<StoredReview>,
    failures: VecDeque<u16>,
    next_commit: u64,
}

impl State {
    fn insert_commit(&mut self, parent: Option<String>, files: BTreeMap<String, String>) -> String {
        self.next_commit += 1;
        let sha = format!("{:040x}", self.next_commit);
        self.commits.insert(sha.clone(), StoredCommit { parent, files });
        sha
    }

    fn commit(&self, sha: &str) -> Result<&StoredCommit, StoreError> {
        self.commits
            .get(sha)
            .ok_or_else(|| StoreError::NotFound(format!("commit {}", sha)))
    }

    fn head(&self, branch: &str) -> Result<&str, StoreError> {
        self.branches
            .get(branch)
            .map(String::as_str)
            .ok_or_else(|| StoreError::NotFound(format!("branch '{}'", branch)))
    }

    fn ancestry(&self, sha: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut cursor = Some(sha.to_string());
        while let Some(current) = cursor {
            cursor = self.commits.get(&current).and_then(|c| c.parent.clone());
            chain.push(current);
        }
        chain
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a root commit holding `files` and point `branch` at it.
    pub fn seed_branch(&self, branch: &str, files: &[(&str, &str)]) -> String {
        let mut state = self.lock();
        let files = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();
        let sha = state.insert_commit(None, files);
        state.branches.insert(branch.to_string(), sha.clone());
        sha
    }

    /// Make the next calls fail, one per status, in order. 429 becomes
    /// [`StoreError::RateLimited`], anything else [`StoreError::Api`].
    pub fn fail_next(&self, statuses: impl IntoIterator<Item = u16>) {
        self.lock().failures.extend(statuses);
    }

    /// Register (or replace) the review request opened from `head_branch`.
    pub fn put_review_request(&self, head_branch: &str, review: ReviewRequest) {
        let mut state = self.lock();
        state.reviews.retain(|r| r.review.number != review.number);
        state.reviews.push(StoredReview {
            head_branch: head_branch.to_string(),
            review,
        });
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commits.len()
    }

    /// Content of `path` at the head of `branch`, if both exist.
    pub fn file_on_branch(&self, branch: &str, path: &str) -> Option<String> {
        let state = self.lock();
        let head = state.branches.get(branch)?;
        state.commits.get(head)?.files.get(path).cloned()
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        match self.lock().failures.pop_front() {
            None => Ok(()),
            Some(429) => Err(StoreError::RateLimited {
                reset_at: "unknown".into(),
            }),
            Some(status) => Err(StoreError::Api {
                status,
                body: "injected failure".into(),
            }),
        }
    }
}

/// Strip an `owner:` prefix from a review head reference.
fn head_branch(head: &str) -> &str {
    head.split_once(':').map(|(_, b)| b).unwrap_or(head)
}

fn changed_file(path: &str, before: Option<&String>, after: Option<&String>) -> ChangedFile {
    let split = |s: Option<&String>| -> Vec<String> {
        s.map(|t| t.lines().map(str::to_string).collect())
            .unwrap_or_default()
    };
    let old = split(before);
    let new = split(after);
    let old_refs: Vec<&str> = old.iter().map(String::as_str).collect();
    let new_refs: Vec<&str> = new.iter().map(String::as_str).collect();

    let mut patch = Vec::new();
    let (mut additions, mut deletions) = (0u64, 0u64);
    // Offset of the new file relative to the old one, from earlier hunks.
    let mut shift: isize = 0;
    for edit in diff(&old_refs, &new_refs) {
        let removed = &old_refs[edit.base_start..edit.base_end];
        let new_start = edit.base_start as isize + shift;
        patch.push(format!(
            "@@ -{},{} +{},{} @@",
            edit.base_start + 1,
            removed.len(),
            new_start + 1,
            edit.lines.len()
        ));
        patch.extend(removed.iter().map(|l| format!("-{}", l)));
        patch.extend(edit.lines.iter().map(|l| format!("+{}", l)));
        deletions += removed.len() as u64;
        additions += edit.lines.len() as u64;
        shift += edit.lines.len() as isize - removed.len() as isize;
    }

    let status = match (before, after) {
        (None, _) => "added",
        (_, None) => "removed",
        _ => "modified",
    };
    ChangedFile {
        filename: path.to_string(),
        status: status.to_string(),
        additions,
        deletions,
        patch: Some(patch.join("\n")),
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn branch_head(&self, branch: &str) -> Result<Option<String>, StoreError> {
        self.take_failure()?;
        Ok(self.lock().branches.get(branch).cloned())
    }

    async fn create_branch(&self, branch: &str, from_commit: &str) -> Result<(), StoreError> {
        self.take_failure()?;
        let mut state = self.lock();
        state.commit(from_commit)?;
        if state.branches.contains_key(branch) {
            return Err(StoreError::AlreadyExists(format!("branch '{}'", branch)));
        }
        state
            .branches
            .insert(branch.to_string(), from_commit.to_string());
        Ok(())
    }

    async fn read_file_at(&self, commit: &str, path: &str) -> Result<FileSnapshot, StoreError> {
        self.take_failure()?;
        let state = self.lock();
        Ok(match state.commit(commit)?.files.get(path) {
            Some(content) => FileSnapshot::present(content.clone()),
            None => FileSnapshot::absent(),
        })
    }

    async fn commit_file(
        &self,
        branch: &str,
        parent: &str,
        path: &str,
        content: &str,
        _message: &str,
    ) -> Result<String, StoreError> {
        self.take_failure()?;
        let mut state = self.lock();
        if state.head(branch)? != parent {
            return Err(StoreError::HeadMoved {
                branch: branch.to_string(),
                expected: parent.to_string(),
            });
        }
        let mut files = state.commit(parent)?.files.clone();
        files.insert(path.to_string(), content.to_string());
        let sha = state.insert_commit(Some(parent.to_string()), files);
        state.branches.insert(branch.to_string(), sha.clone());
        debug!(branch, sha = %sha, "memory store commit");
        Ok(sha)
    }

    async fn compare_branches(
        &self,
        base: &str,
        head: &str,
    ) -> Result<BranchComparison, StoreError> {
        self.take_failure()?;
        let state = self.lock();
        let base_head = state.head(base)?.to_string();
        let head_sha = state.head(head)?.to_string();

        let head_chain = state.ancestry(&head_sha);
        let head_set: HashSet<&String> = head_chain.iter().collect();
        let base_chain = state.ancestry(&base_head);

        let behind_by = base_chain
            .iter()
            .take_while(|sha| !head_set.contains(sha))
            .count() as u64;
        let merge_base = base_chain.iter().find(|sha| head_set.contains(sha)).cloned();
        let ahead_by = head_chain
            .iter()
            .take_while(|sha| Some(*sha) != merge_base.as_ref())
            .count() as u64;

        let empty = BTreeMap::new();
        let before = match &merge_base {
            Some(sha) => &state.commit(sha)?.files,
            None => &empty,
        };
        let after = &state.commit(&head_sha)?.files;
        let paths: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
        let files = paths
            .into_iter()
            .filter(|p| before.get(*p) != after.get(*p))
            .map(|p| changed_file(p, before.get(p), after.get(p)))
            .collect();

        Ok(BranchComparison {
            ahead_by,
            behind_by,
            base_head: Some(base_head),
            merge_base,
            files,
        })
    }

    async fn get_review_request(&self, number: u64) -> Result<ReviewRequest, StoreError> {
        self.take_failure()?;
        self.lock()
            .reviews
            .iter()
            .find(|r| r.review.number == number)
            .map(|r| r.review.clone())
            .ok_or_else(|| StoreError::NotFound(format!("review request #{}", number)))
    }

    async fn find_open_review_request(
        &self,
        head: &str,
    ) -> Result<Option<ReviewRequest>, StoreError> {
        self.take_failure()?;
        let branch = head_branch(head);
        Ok(self
            .lock()
            .reviews
            .iter()
            .find(|r| r.head_branch == branch && r.review.is_open())
            .map(|r| r.review.clone()))
    }

    async fn create_review_request(
        &self,
        _title: &str,
        _body: &str,
        head: &str,
        base: &str,
    ) -> Result<ReviewRequest, StoreError> {
        self.take_failure()?;
        let mut state = self.lock();
        let branch = head_branch(head).to_string();
        state.head(&branch)?;
        state.head(base)?;
        let number = state.reviews.iter().map(|r| r.review.number).max().unwrap_or(0) + 1;
        let review = ReviewRequest {
            number,
            url: format!("memory://pulls/{}", number),
            state: "open".into(),
            merged: false,
            mergeable: Some(true),
            mergeable_state: Some("clean".into()),
        };
        state.reviews.push(StoredReview {
            head_branch: branch,
            review: review.clone(),
        });
        Ok(review)
    }
}
