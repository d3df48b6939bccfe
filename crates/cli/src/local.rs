//! Offline commands: merge and diff local files.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use docdraft_core::merge::{diff, normalize_line_endings, three_way_merge, MergeResult};

use crate::style;

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Three-way merge of local files. Conflicts exit with status 1 after
/// writing the marker text, like `git merge-file`.
pub fn run_merge(
    base: &Path,
    theirs: &Path,
    ours: &Path,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let result = three_way_merge(&read(base)?, &read(theirs)?, &read(ours)?);

    let (text, code) = match &result {
        MergeResult::Clean { merged_text } => (merged_text, ExitCode::SUCCESS),
        MergeResult::Conflicted { marker_text, .. } => (marker_text, ExitCode::from(1)),
    };

    match output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", text),
    }

    match &result {
        MergeResult::Clean { .. } => {
            if output.is_some() {
                eprintln!("{}", style::success("merged cleanly"));
            }
        }
        MergeResult::Conflicted { hunks, .. } => {
            eprintln!(
                "{}",
                style::warn(&format!("{} conflict hunk(s)", hunks.len()))
            );
            for hunk in hunks {
                eprintln!(
                    "  {}",
                    style::dim(&format!(
                        "base lines {}-{}: {} ours / {} theirs",
                        hunk.base_start + 1,
                        hunk.base_end,
                        hunk.ours_lines.len(),
                        hunk.theirs_lines.len()
                    ))
                );
            }
        }
    }
    Ok(code)
}

/// Render the edit script between two texts as unified-style hunks.
pub fn render_diff(base: &str, other: &str) -> String {
    let base = normalize_line_endings(base);
    let other = normalize_line_endings(other);
    let base_lines: Vec<&str> = base.lines().collect();
    let other_lines: Vec<&str> = other.lines().collect();

    let mut out = String::new();
    let mut shift: isize = 0;
    for edit in diff(&base_lines, &other_lines) {
        let removed = &base_lines[edit.base_start..edit.base_end];
        let new_start = edit.base_start as isize + shift;
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            edit.base_start + 1,
            removed.len(),
            new_start + 1,
            edit.lines.len()
        ));
        for line in removed {
            out.push_str(&format!("-{}\n", line));
        }
        for line in &edit.lines {
            out.push_str(&format!("+{}\n", line));
        }
        shift += edit.lines.len() as isize - removed.len() as isize;
    }
    out
}

pub fn run_diff(base: &Path, other: &Path) -> Result<ExitCode> {
    let rendered = render_diff(&read(base)?, &read(other)?);
    if rendered.is_empty() {
        eprintln!("{}", style::dim("no differences"));
        return Ok(ExitCode::SUCCESS);
    }
    print!("{}", rendered);
    Ok(ExitCode::from(1))
}
