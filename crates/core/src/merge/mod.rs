//! Line-oriented diffing and three-way merging.
//!
//! 1. **Diff** -- LCS-based edit scripts between a base and one variant.
//! 2. **Merge** -- combining two edit scripts over the same base, reporting
//!    conflict hunks where they overlap and disagree.

pub mod diff;
pub mod merger;

pub use diff::{apply, diff, Edit};
pub use merger::{normalize_line_endings, three_way_merge, ConflictHunk, MergeResult};
