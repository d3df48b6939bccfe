//! REST API endpoint modules.

pub mod drafts;
pub mod status;
