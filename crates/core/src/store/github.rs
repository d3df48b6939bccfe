//! GitHub REST API implementation of [`ObjectStore`].
//!
//! Everything goes through the low-level git data endpoints (refs, commits,
//! trees, blobs) so that branch updates can be made conditional on the head
//! the caller read.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::ObjectStore;
use crate::errors::StoreError;
use crate::models::{BranchComparison, ChangedFile, FileSnapshot, ReviewRequest};

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitCommit {
    sha: String,
    tree: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitTree {
    #[serde(default)]
    tree: Vec<GitTreeEntry>,
}

#[derive(Debug, Deserialize)]
struct GitTreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitBlob {
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct Comparison {
    #[serde(default)]
    ahead_by: u64,
    #[serde(default)]
    behind_by: u64,
    base_commit: Option<GitObject>,
    merge_base_commit: Option<GitObject>,
    #[serde(default)]
    files: Vec<ComparisonFile>,
}

#[derive(Debug, Deserialize)]
struct ComparisonFile {
    filename: String,
    status: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    patch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    number: u64,
    html_url: String,
    state: String,
    #[serde(default)]
    merged: Option<bool>,
    #[serde(default)]
    mergeable: Option<bool>,
    #[serde(default)]
    mergeable_state: Option<String>,
}

impl From<PullRequest> for ReviewRequest {
    fn from(pr: PullRequest) -> Self {
        Self {
            number: pr.number,
            url: pr.html_url,
            state: pr.state,
            merged: pr.merged.unwrap_or(false),
            mergeable: pr.mergeable,
            mergeable_state: pr.mergeable_state,
        }
    }
}

impl From<ComparisonFile> for ChangedFile {
    fn from(f: ComparisonFile) -> Self {
        Self {
            filename: f.filename,
            status: f.status,
            additions: f.additions,
            deletions: f.deletions,
            patch: f.patch,
        }
    }
}

/// Object store backed by one GitHub repository.
#[derive(Clone)]
pub struct GitHubStore {
    http: reqwest::Client,
    api_url: String,
    token: String,
    owner: String,
    repo: String,
}

impl GitHubStore {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("docdraft/0.1"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        let store = Self {
            http,
            api_url,
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
        };
        debug!(api_url = %store.api_url, repo = %store.repo_slug(), "created GitHubStore");
        Ok(store)
    }

    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url, self.owner, self.repo, path
        )
    }

    async fn get_commit(&self, sha: &str) -> Result<GitCommit, StoreError> {
        let resp = self
            .http
            .get(self.url(&format!("git/commits/{}", sha)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check_response(resp).await?.json().await?)
    }

    async fn get_blob_text(&self, sha: &str) -> Result<String, StoreError> {
        let resp = self
            .http
            .get(self.url(&format!("git/blobs/{}", sha)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let blob: GitBlob = check_response(resp).await?.json().await?;
        decode_blob(&blob)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<T, StoreError> {
        let resp = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        Ok(check_response(resp).await?.json().await?)
    }
}

#[async_trait]
impl ObjectStore for GitHubStore {
    #[instrument(skip(self))]
    async fn branch_head(&self, branch: &str) -> Result<Option<String>, StoreError> {
        let resp = self
            .http
            .get(self.url(&format!("git/ref/heads/{}", branch)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(branch, "branch does not exist");
            return Ok(None);
        }
        let git_ref: GitRef = check_response(resp).await?.json().await?;
        debug!(branch, sha = %git_ref.object.sha, "fetched branch head");
        Ok(Some(git_ref.object.sha))
    }

    #[instrument(skip(self))]
    async fn create_branch(&self, branch: &str, from_commit: &str) -> Result<(), StoreError> {
        let payload = serde_json::json!({
            "ref": format!("refs/heads/{}", branch),
            "sha": from_commit,
        });
        let resp = self
            .http
            .post(self.url("git/refs"))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        match check_response(resp).await {
            Ok(_) => {
                info!(branch, from = from_commit, "created branch");
                Ok(())
            }
            Err(StoreError::Api { status: 422, body }) if body.contains("already exists") => {
                Err(StoreError::AlreadyExists(format!("branch '{}'", branch)))
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn read_file_at(&self, commit: &str, path: &str) -> Result<FileSnapshot, StoreError> {
        let commit = self.get_commit(commit).await?;
        let resp = self
            .http
            .get(self.url(&format!("git/trees/{}", commit.tree.sha)))
            .bearer_auth(&self.token)
            .query(&[("recursive", "1")])
            .send()
            .await?;
        let tree: GitTree = check_response(resp).await?.json().await?;

        let blob_sha = tree
            .tree
            .into_iter()
            .find(|entry| entry.path == path && entry.kind == "blob")
            .and_then(|entry| entry.sha);
        let Some(blob_sha) = blob_sha else {
            debug!(commit = %commit.sha, path, "path not in tree");
            return Ok(FileSnapshot::absent());
        };

        let content = self.get_blob_text(&blob_sha).await?;
        debug!(commit = %commit.sha, path, bytes = content.len(), "read file");
        Ok(FileSnapshot::present(content))
    }

    #[instrument(skip(self, content, message))]
    async fn commit_file(
        &self,
        branch: &str,
        parent: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String, StoreError> {
        // Early out when the head is already stale; the ref update below is
        // the authoritative check.
        match self.branch_head(branch).await? {
            Some(head) if head == parent => {}
            _ => {
                return Err(StoreError::HeadMoved {
                    branch: branch.to_string(),
                    expected: parent.to_string(),
                })
            }
        }

        let blob: GitObject = self
            .post_json(
                "git/blobs",
                &serde_json::json!({
                    "content": STANDARD.encode(content.as_bytes()),
                    "encoding": "base64",
                }),
            )
            .await?;
        let parent_commit = self.get_commit(parent).await?;
        let tree: GitObject = self
            .post_json(
                "git/trees",
                &serde_json::json!({
                    "base_tree": parent_commit.tree.sha,
                    "tree": [{ "path": path, "mode": "100644", "type": "blob", "sha": blob.sha }],
                }),
            )
            .await?;
        let commit: GitObject = self
            .post_json(
                "git/commits",
                &serde_json::json!({
                    "message": message,
                    "tree": tree.sha,
                    "parents": [parent],
                }),
            )
            .await?;

        let resp = self
            .http
            .patch(self.url(&format!("git/refs/heads/{}", branch)))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "sha": commit.sha, "force": false }))
            .send()
            .await?;
        match check_response(resp).await {
            Ok(_) => {}
            Err(StoreError::Api { status: 422, body }) if is_fast_forward_rejection(&body) => {
                return Err(StoreError::HeadMoved {
                    branch: branch.to_string(),
                    expected: parent.to_string(),
                })
            }
            Err(e) => return Err(e),
        }

        info!(branch, path, sha = %commit.sha, "committed file");
        Ok(commit.sha)
    }

    #[instrument(skip(self))]
    async fn compare_branches(
        &self,
        base: &str,
        head: &str,
    ) -> Result<BranchComparison, StoreError> {
        let resp = self
            .http
            .get(self.url(&format!("compare/{}...{}", base, head)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let cmp: Comparison = check_response(resp).await?.json().await?;
        debug!(
            base,
            head,
            ahead_by = cmp.ahead_by,
            behind_by = cmp.behind_by,
            "compared branches"
        );
        Ok(BranchComparison {
            ahead_by: cmp.ahead_by,
            behind_by: cmp.behind_by,
            base_head: cmp.base_commit.map(|c| c.sha),
            merge_base: cmp.merge_base_commit.map(|c| c.sha),
            files: cmp.files.into_iter().map(ChangedFile::from).collect(),
        })
    }

    #[instrument(skip(self))]
    async fn get_review_request(&self, number: u64) -> Result<ReviewRequest, StoreError> {
        let resp = self
            .http
            .get(self.url(&format!("pulls/{}", number)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let pr: PullRequest = check_response(resp).await?.json().await?;
        debug!(number = pr.number, state = %pr.state, "fetched pull request");
        Ok(pr.into())
    }

    #[instrument(skip(self))]
    async fn find_open_review_request(
        &self,
        head: &str,
    ) -> Result<Option<ReviewRequest>, StoreError> {
        let resp = self
            .http
            .get(self.url("pulls"))
            .bearer_auth(&self.token)
            .query(&[("head", head), ("state", "open"), ("per_page", "1")])
            .send()
            .await?;
        let prs: Vec<PullRequest> = check_response(resp).await?.json().await?;
        Ok(prs.into_iter().next().map(ReviewRequest::from))
    }

    #[instrument(skip(self, body))]
    async fn create_review_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<ReviewRequest, StoreError> {
        let pr: PullRequest = self
            .post_json(
                "pulls",
                &serde_json::json!({ "title": title, "body": body, "head": head, "base": base }),
            )
            .await?;
        info!(number = pr.number, head, base, "created pull request");
        Ok(pr.into())
    }
}

/// Pass successful responses through; turn everything else into a
/// [`StoreError`], reading the body for context.
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let header = |name: &str| {
        resp.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let remaining = header("x-ratelimit-remaining");
    let reset = header("x-ratelimit-reset");
    let body = resp.text().await.unwrap_or_default();
    Err(classify_failure(
        status.as_u16(),
        remaining.as_deref(),
        reset.as_deref(),
        body,
    ))
}

fn classify_failure(
    status: u16,
    remaining: Option<&str>,
    reset: Option<&str>,
    body: String,
) -> StoreError {
    let rate_limited = status == 429 || (status == 403 && remaining == Some("0"));
    if rate_limited {
        return StoreError::RateLimited {
            reset_at: format_reset(reset),
        };
    }
    match status {
        401 | 403 => StoreError::AuthenticationFailed(format!("HTTP {}", status)),
        404 => StoreError::NotFound(if body.is_empty() {
            "HTTP 404".to_string()
        } else {
            body
        }),
        _ => StoreError::Api { status, body },
    }
}

/// Render an `x-ratelimit-reset` epoch as RFC 3339, passing through anything
/// that is not a timestamp.
fn format_reset(reset: Option<&str>) -> String {
    let Some(raw) = reset else {
        return "unknown".to_string();
    };
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| raw.to_string())
}

fn is_fast_forward_rejection(body: &str) -> bool {
    body.to_ascii_lowercase().contains("fast forward")
}

/// Decode a blob payload. GitHub wraps base64 content at 60 columns.
fn decode_blob(blob: &GitBlob) -> Result<String, StoreError> {
    if blob.encoding != "base64" {
        return Ok(blob.content.clone());
    }
    let compact: String = blob
        .content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| StoreError::Parse(format!("blob content: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| StoreError::Parse(format!("blob is not UTF-8: {}", e)))
}
