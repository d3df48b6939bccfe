//! Per-author drafts: identifiers, naming, status and reconciliation.

pub mod id;
pub mod paths;
pub mod service;
pub mod status;

pub use id::DraftRef;
pub use paths::{draft_branch_name, resolve_doc_path};
pub use service::{
    ConflictPayload, DiffSummary, DraftContent, DraftService, OpenedReview, SaveOutcome,
    UpdateOutcome,
};
pub use status::{derive_status, DraftStatus, StatusReport};
