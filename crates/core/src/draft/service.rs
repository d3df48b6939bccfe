//! Draft reconciliation.
//!
//! [`DraftService`] keeps a per-author draft branch consistent while the
//! author saves from a possibly stale view and the base branch moves
//! underneath. Every operation rebuilds its view from the store; the branch
//! head is the only coordination point, and every write is conditioned on it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use super::id::DraftRef;
use super::status::{derive_status, StatusReport};
use crate::errors::{DraftError, StoreError};
use crate::merge::{normalize_line_endings, three_way_merge, ConflictHunk, MergeResult};
use crate::store::ObjectStore;

pub const CONFLICT_INSTRUCTIONS: &str = "Resolve conflicts and save again.";

/// Everything an editor needs to present a conflict for manual resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictPayload {
    pub doc_path: String,
    pub base_content: String,
    pub theirs_content: String,
    pub ours_content: String,
    pub conflict_markers: String,
    pub hunks: Vec<ConflictHunk>,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "status",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum SaveOutcome {
    /// Committed directly; the client had the current head.
    Ok { head_sha: String },
    /// Content already matches the head; nothing was written.
    Noop { head_sha: String },
    /// The head had moved; the client's edit merged cleanly onto it.
    Merged { head_sha: String },
    Conflict { conflict: ConflictPayload },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "status",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum UpdateOutcome {
    Updated { head_sha: String },
    Conflict { conflict: ConflictPayload },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftContent {
    pub exists: bool,
    pub content: String,
    pub head_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub doc_path: String,
    pub patch: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub ahead_by: u64,
    pub behind_by: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedReview {
    pub pr_number: u64,
    pub url: String,
}

/// Compare ignoring line endings and one trailing newline.
fn same_document(a: &str, b: &str) -> bool {
    let a = normalize_line_endings(a);
    let b = normalize_line_endings(b);
    a.strip_suffix('\n').unwrap_or(&a) == b.strip_suffix('\n').unwrap_or(&b)
}

fn with_trailing_newline(mut text: String, wanted: bool) -> String {
    if wanted && !text.ends_with('\n') {
        text.push('\n');
    } else if !wanted {
        let trimmed = text.trim_end_matches('\n').len();
        text.truncate(trimmed);
    }
    text
}

fn conflict_payload(
    doc_path: &str,
    base: String,
    theirs: String,
    ours: String,
    hunks: Vec<ConflictHunk>,
    marker_text: String,
) -> ConflictPayload {
    ConflictPayload {
        doc_path: doc_path.to_string(),
        base_content: base,
        theirs_content: theirs,
        ours_content: ours,
        conflict_markers: marker_text,
        hunks,
        instructions: CONFLICT_INSTRUCTIONS.to_string(),
    }
}

pub struct DraftService {
    store: Arc<dyn ObjectStore>,
}

impl DraftService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    async fn ensure_draft_branch(&self, draft: &DraftRef) -> Result<String, DraftError> {
        match self
            .store
            .ensure_branch(&draft.draft_branch, &draft.base_branch)
            .await
        {
            Ok(head) => Ok(head),
            // Only a missing base is the caller's fault; a draft head that
            // vanished after the fork stays a store error.
            Err(e @ StoreError::NotFound(_)) => {
                if self.store.branch_head(&draft.base_branch).await?.is_none() {
                    Err(DraftError::BaseBranchNotFound(draft.base_branch.clone()))
                } else {
                    Err(e.into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_text(&self, commit: &str, path: &str) -> Result<String, DraftError> {
        let snapshot = self.store.read_file_at(commit, path).await?;
        Ok(normalize_line_endings(&snapshot.into_text()))
    }

    /// Current draft content and the head it was read at. Editors use the
    /// head as `clientBaseSha` for their next save.
    #[instrument(skip(self, draft), fields(branch = %draft.draft_branch))]
    pub async fn get_content(&self, draft: &DraftRef) -> Result<DraftContent, DraftError> {
        let head_sha = self.ensure_draft_branch(draft).await?;
        let snapshot = self.store.read_file_at(&head_sha, &draft.doc_path).await?;
        Ok(DraftContent {
            exists: snapshot.exists,
            content: snapshot.content,
            head_sha,
        })
    }

    /// Save `content` that the client edited starting from `client_base_sha`.
    #[instrument(skip(self, draft, content), fields(branch = %draft.draft_branch))]
    pub async fn save_draft(
        &self,
        draft: &DraftRef,
        content: &str,
        client_base_sha: &str,
    ) -> Result<SaveOutcome, DraftError> {
        if client_base_sha.trim().is_empty() {
            return Err(DraftError::MissingClientBaseSha);
        }
        let ours = normalize_line_endings(content);
        let keep_trailing = ours.ends_with('\n');

        let head_sha = self.ensure_draft_branch(draft).await?;
        let current = self.read_text(&head_sha, &draft.doc_path).await?;

        if same_document(&current, &ours) {
            debug!(head = %head_sha, "content unchanged");
            return Ok(SaveOutcome::Noop { head_sha });
        }

        if client_base_sha == head_sha {
            let new_sha = self
                .store
                .commit_file(
                    &draft.draft_branch,
                    &head_sha,
                    &draft.doc_path,
                    &with_trailing_newline(ours, keep_trailing),
                    &format!("Draft save: {}", draft.doc_path),
                )
                .await?;
            info!(doc = %draft.doc_path, sha = %new_sha, "draft saved");
            return Ok(SaveOutcome::Ok { head_sha: new_sha });
        }

        let base = self.read_text(client_base_sha, &draft.doc_path).await?;
        match three_way_merge(&base, &current, &ours) {
            MergeResult::Clean { merged_text } => {
                let new_sha = self
                    .store
                    .commit_file(
                        &draft.draft_branch,
                        &head_sha,
                        &draft.doc_path,
                        &with_trailing_newline(merged_text, keep_trailing),
                        &format!("Draft merge: {}", draft.doc_path),
                    )
                    .await?;
                info!(
                    doc = %draft.doc_path,
                    sha = %new_sha,
                    base = client_base_sha,
                    "draft merged"
                );
                Ok(SaveOutcome::Merged { head_sha: new_sha })
            }
            MergeResult::Conflicted { hunks, marker_text } => {
                info!(doc = %draft.doc_path, hunks = hunks.len(), "save conflicts with draft head");
                Ok(SaveOutcome::Conflict {
                    conflict: conflict_payload(
                        &draft.doc_path,
                        base,
                        current,
                        ours,
                        hunks,
                        marker_text,
                    ),
                })
            }
        }
    }

    /// Bring base-branch changes to the document into the draft.
    #[instrument(skip(self, draft), fields(branch = %draft.draft_branch))]
    pub async fn update_from_main(&self, draft: &DraftRef) -> Result<UpdateOutcome, DraftError> {
        let head_sha = self.ensure_draft_branch(draft).await?;
        let cmp = self
            .store
            .compare_branches(&draft.base_branch, &draft.draft_branch)
            .await?;

        let base_head = match cmp.base_head {
            Some(sha) => sha,
            None => self
                .store
                .branch_head(&draft.base_branch)
                .await?
                .ok_or_else(|| DraftError::BaseBranchNotFound(draft.base_branch.clone()))?,
        };
        let merge_base = cmp.merge_base.unwrap_or_else(|| base_head.clone());

        let theirs = self.read_text(&base_head, &draft.doc_path).await?;
        let ours = self.read_text(&head_sha, &draft.doc_path).await?;
        let ancestor = self.read_text(&merge_base, &draft.doc_path).await?;

        match three_way_merge(&ancestor, &theirs, &ours) {
            MergeResult::Clean { merged_text } => {
                if merged_text == ours {
                    debug!(head = %head_sha, "draft already contains base changes");
                    return Ok(UpdateOutcome::Updated { head_sha });
                }
                let new_sha = self
                    .store
                    .commit_file(
                        &draft.draft_branch,
                        &head_sha,
                        &draft.doc_path,
                        &merged_text,
                        &format!("Update from {}: {}", draft.base_branch, draft.doc_path),
                    )
                    .await?;
                info!(
                    doc = %draft.doc_path,
                    sha = %new_sha,
                    from = %base_head,
                    "draft updated from base"
                );
                Ok(UpdateOutcome::Updated { head_sha: new_sha })
            }
            MergeResult::Conflicted { hunks, marker_text } => {
                info!(
                    doc = %draft.doc_path,
                    hunks = hunks.len(),
                    "base changes conflict with draft"
                );
                Ok(UpdateOutcome::Conflict {
                    conflict: conflict_payload(
                        &draft.doc_path,
                        ancestor,
                        theirs,
                        ours,
                        hunks,
                        marker_text,
                    ),
                })
            }
        }
    }

    #[instrument(skip(self, draft), fields(branch = %draft.draft_branch))]
    pub async fn get_status(&self, draft: &DraftRef) -> Result<StatusReport, DraftError> {
        let head_sha = self.ensure_draft_branch(draft).await?;
        let cmp = self
            .store
            .compare_branches(&draft.base_branch, &draft.draft_branch)
            .await?;

        let review = match draft.pr_number {
            Some(number) => Some(self.store.get_review_request(number).await?),
            None => {
                self.store
                    .find_open_review_request(&draft.review_head())
                    .await?
            }
        };
        let status = derive_status(review.as_ref(), cmp.behind_by);
        debug!(%status, ahead_by = cmp.ahead_by, behind_by = cmp.behind_by, "derived draft status");

        Ok(StatusReport {
            status,
            draft_head_sha: head_sha,
            base_head_sha: cmp.base_head,
            ahead_by: cmp.ahead_by,
            behind_by: cmp.behind_by,
            pr_state: review.as_ref().map(|r| r.state.clone()),
            mergeable_state: review.as_ref().and_then(|r| r.mergeable_state.clone()),
            pr_number: review.as_ref().map(|r| r.number).or(draft.pr_number),
            pr_url: review.map(|r| r.url),
        })
    }

    /// Change summary for the document between the base and draft heads.
    /// Read-only: the draft branch must already exist.
    #[instrument(skip(self, draft), fields(branch = %draft.draft_branch))]
    pub async fn get_diff(&self, draft: &DraftRef) -> Result<DiffSummary, DraftError> {
        let cmp = self
            .store
            .compare_branches(&draft.base_branch, &draft.draft_branch)
            .await?;
        let file = cmp.files.into_iter().find(|f| f.filename == draft.doc_path);

        Ok(match file {
            Some(f) => DiffSummary {
                doc_path: draft.doc_path.clone(),
                patch: f.patch.unwrap_or_default(),
                status: f.status,
                additions: f.additions,
                deletions: f.deletions,
                ahead_by: cmp.ahead_by,
                behind_by: cmp.behind_by,
            },
            None => DiffSummary {
                doc_path: draft.doc_path.clone(),
                patch: String::new(),
                status: "modified".into(),
                additions: 0,
                deletions: 0,
                ahead_by: cmp.ahead_by,
                behind_by: cmp.behind_by,
            },
        })
    }

    /// Return the open review request for the draft, opening one if needed.
    #[instrument(skip(self, draft), fields(branch = %draft.draft_branch))]
    pub async fn open_review(&self, draft: &DraftRef) -> Result<OpenedReview, DraftError> {
        self.ensure_draft_branch(draft).await?;

        if let Some(existing) = self
            .store
            .find_open_review_request(&draft.review_head())
            .await?
        {
            debug!(number = existing.number, "review request already open");
            return Ok(OpenedReview {
                pr_number: existing.number,
                url: existing.url,
            });
        }

        let review = self
            .store
            .create_review_request(
                &format!("Docs update: {}", draft.doc_path),
                &format!("Draft updates for `{}`.", draft.doc_path),
                &draft.draft_branch,
                &draft.base_branch,
            )
            .await?;
        info!(number = review.number, doc = %draft.doc_path, "opened review request");
        Ok(OpenedReview {
            pr_number: review.number,
            url: review.url,
        })
    }
}
