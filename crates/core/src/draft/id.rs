//! Opaque draft identifiers.
//!
//! A draft id is URL-safe base64 of a small camelCase JSON object naming the
//! repository, the base and draft branches, the document path and optionally
//! a linked review request number.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::errors::DraftError;

const ID_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const REQUIRED_FIELDS: [&str; 5] = ["owner", "repo", "baseBranch", "draftBranch", "docPath"];

/// Everything needed to locate one draft in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRef {
    pub owner: String,
    pub repo: String,
    pub base_branch: String,
    pub draft_branch: String,
    pub doc_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
}

impl DraftRef {
    pub fn encode(&self) -> String {
        // Serializing plain strings and an optional integer cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        ID_ENGINE.encode(json)
    }

    pub fn decode(draft_id: &str) -> Result<Self, DraftError> {
        let bytes = ID_ENGINE
            .decode(draft_id.trim())
            .map_err(|e| DraftError::InvalidId(e.to_string()))?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| DraftError::InvalidId(e.to_string()))?;
        let obj = value
            .as_object()
            .ok_or_else(|| DraftError::InvalidId("payload is not an object".into()))?;

        let field = |name: &str| -> Result<String, DraftError> {
            match obj.get(name).and_then(|v| v.as_str()) {
                Some(s) if !s.is_empty() => Ok(s.to_string()),
                _ => Err(DraftError::MissingField(name.to_string())),
            }
        };
        for name in REQUIRED_FIELDS {
            field(name)?;
        }

        Ok(Self {
            owner: field("owner")?,
            repo: field("repo")?,
            base_branch: field("baseBranch")?,
            draft_branch: field("draftBranch")?,
            doc_path: field("docPath")?,
            pr_number: obj.get("prNumber").and_then(|v| v.as_u64()),
        })
    }

    /// Head reference used when searching review requests: `owner:branch`.
    pub fn review_head(&self) -> String {
        format!("{}:{}", self.owner, self.draft_branch)
    }

    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}
