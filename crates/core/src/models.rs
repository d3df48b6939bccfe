//! Shared data models returned by the object store.

use serde::{Deserialize, Serialize};

/// Content of one document path as of a given commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub exists: bool,
    pub content: String,
}

impl FileSnapshot {
    pub fn present(content: impl Into<String>) -> Self {
        Self {
            exists: true,
            content: content.into(),
        }
    }

    pub fn absent() -> Self {
        Self {
            exists: false,
            content: String::new(),
        }
    }

    /// The file's text, or an empty string when it does not exist.
    pub fn into_text(self) -> String {
        if self.exists {
            self.content
        } else {
            String::new()
        }
    }
}

/// Result of comparing a head branch against a base branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchComparison {
    /// Commits on head that are not on base.
    pub ahead_by: u64,
    /// Commits on base that are not on head.
    pub behind_by: u64,
    /// Current head commit of the base branch.
    pub base_head: Option<String>,
    /// Most recent common ancestor of the two branches.
    pub merge_base: Option<String>,
    /// Per-file changes between the merge base and head.
    pub files: Vec<ChangedFile>,
}

/// One file's entry in a [`BranchComparison`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    /// `added`, `removed`, `modified`, `renamed`, ...
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub patch: Option<String>,
}

/// A review request (pull request) opened from a draft branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub number: u64,
    pub url: String,
    /// `open` or `closed`.
    pub state: String,
    pub merged: bool,
    /// `None` while the remote is still computing mergeability.
    pub mergeable: Option<bool>,
    /// `clean`, `dirty`, `blocked`, `unstable`, `behind`, ...
    pub mergeable_state: Option<String>,
}

impl ReviewRequest {
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_snapshot_reads_as_empty() {
        assert_eq!(FileSnapshot::absent().into_text(), "");
        assert_eq!(FileSnapshot::present("x\n").into_text(), "x\n");
    }

    #[test]
    fn test_comparison_serializes_camel_case() {
        let cmp = BranchComparison {
            ahead_by: 2,
            behind_by: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&cmp).unwrap();
        assert_eq!(json["aheadBy"], 2);
        assert_eq!(json["behindBy"], 1);
    }
}
