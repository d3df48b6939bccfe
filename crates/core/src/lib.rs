//! docdraft core library.
//!
//! Line-oriented diffing and three-way merging, a retrying object store
//! abstraction over a remote commit graph, and the draft reconciliation
//! service that combines them to keep per-author draft branches consistent
//! under concurrent writers.

pub mod config;
pub mod draft;
pub mod errors;
pub mod merge;
pub mod models;
pub mod store;

// Re-exports for convenience.
pub use config::AppConfig;
pub use draft::{DraftRef, DraftService};
pub use errors::{CoreError, DraftError, StoreError};
pub use merge::{three_way_merge, MergeResult};
pub use store::ObjectStore;
