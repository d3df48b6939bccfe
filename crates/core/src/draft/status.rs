//! Draft status derivation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::ReviewRequest;

/// Lifecycle state of a draft as seen by its author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftStatus {
    Draft,
    #[serde(rename = "In Review")]
    InReview,
    Approved,
    Conflicts,
    #[serde(rename = "Checks Failing")]
    ChecksFailing,
    #[serde(rename = "Out of Date")]
    OutOfDate,
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "Draft",
            Self::InReview => "In Review",
            Self::Approved => "Approved",
            Self::Conflicts => "Conflicts",
            Self::ChecksFailing => "Checks Failing",
            Self::OutOfDate => "Out of Date",
        };
        f.write_str(label)
    }
}

/// Derive the status from the linked review request (if any) and how far the
/// draft branch trails its base.
///
/// Merge-readiness problems reported by the remote override the open/merged
/// state, and being behind the base only shows when nothing more specific
/// applies.
pub fn derive_status(review: Option<&ReviewRequest>, behind_by: u64) -> DraftStatus {
    let mut status = DraftStatus::Draft;

    if let Some(review) = review {
        if review.merged {
            status = DraftStatus::Approved;
        } else if review.is_open() {
            status = DraftStatus::InReview;
        }
        match review.mergeable_state.as_deref() {
            _ if review.mergeable == Some(false) => status = DraftStatus::Conflicts,
            Some("dirty") => status = DraftStatus::Conflicts,
            Some("blocked") | Some("unstable") => status = DraftStatus::ChecksFailing,
            _ => {}
        }
    }

    let settled = matches!(
        status,
        DraftStatus::Approved | DraftStatus::Conflicts | DraftStatus::ChecksFailing
    );
    if behind_by > 0 && !settled {
        status = DraftStatus::OutOfDate;
    }
    status
}

/// Everything the editor shows about a draft's standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: DraftStatus,
    pub draft_head_sha: String,
    pub base_head_sha: Option<String>,
    pub ahead_by: u64,
    pub behind_by: u64,
    pub pr_state: Option<String>,
    pub mergeable_state: Option<String>,
    pub pr_number: Option<u64>,
    pub pr_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(
        state: &str,
        merged: bool,
        mergeable: Option<bool>,
        ms: Option<&str>,
    ) -> ReviewRequest {
        ReviewRequest {
            number: 1,
            url: "https://example.test/pull/1".into(),
            state: state.into(),
            merged,
            mergeable,
            mergeable_state: ms.map(str::to_string),
        }
    }

    #[test]
    fn test_no_review() {
        assert_eq!(derive_status(None, 0), DraftStatus::Draft);
        assert_eq!(derive_status(None, 3), DraftStatus::OutOfDate);
    }

    #[test]
    fn test_open_and_merged() {
        let open = review("open", false, Some(true), Some("clean"));
        assert_eq!(derive_status(Some(&open), 0), DraftStatus::InReview);
        assert_eq!(derive_status(Some(&open), 2), DraftStatus::OutOfDate);

        let merged = review("closed", true, None, None);
        assert_eq!(derive_status(Some(&merged), 0), DraftStatus::Approved);
        assert_eq!(derive_status(Some(&merged), 5), DraftStatus::Approved);

        let closed = review("closed", false, None, None);
        assert_eq!(derive_status(Some(&closed), 0), DraftStatus::Draft);
    }

    #[test]
    fn test_merge_readiness_overrides() {
        let dirty = review("open", false, None, Some("dirty"));
        assert_eq!(derive_status(Some(&dirty), 4), DraftStatus::Conflicts);

        let unmergeable = review("open", false, Some(false), Some("blocked"));
        assert_eq!(derive_status(Some(&unmergeable), 0), DraftStatus::Conflicts);

        for state in ["blocked", "unstable"] {
            let r = review("open", false, Some(true), Some(state));
            assert_eq!(derive_status(Some(&r), 1), DraftStatus::ChecksFailing);
        }

        // A merged request the remote still reports as dirty shows the conflict.
        let merged_dirty = review("closed", true, None, Some("dirty"));
        assert_eq!(derive_status(Some(&merged_dirty), 0), DraftStatus::Conflicts);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(DraftStatus::OutOfDate.to_string(), "Out of Date");
        assert_eq!(
            serde_json::to_value(DraftStatus::ChecksFailing).unwrap(),
            "Checks Failing"
        );
        assert_eq!(
            serde_json::to_value(DraftStatus::InReview).unwrap(),
            "In Review"
        );
    }
}
