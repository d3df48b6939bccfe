//! Three-way merge combiner.
//!
//! Walks the base→ours and base→theirs edit scripts in lockstep over the base
//! line sequence. Non-overlapping edits from either side are applied; edits
//! that touch the same base lines and disagree become conflict hunks, written
//! into the output between `<<<<<<< ours` / `=======` / `>>>>>>> theirs`
//! markers. Resolution is always left to the caller.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::diff::{diff, Edit};

pub const OURS_MARKER: &str = "<<<<<<< ours";
pub const SEPARATOR_MARKER: &str = "=======";
pub const THEIRS_MARKER: &str = ">>>>>>> theirs";

/// A base range where the two edit scripts disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictHunk {
    pub base_start: usize,
    pub base_end: usize,
    pub ours_lines: Vec<String>,
    pub theirs_lines: Vec<String>,
}

/// Outcome of [`three_way_merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    Clean {
        merged_text: String,
    },
    Conflicted {
        /// Ascending, non-overlapping by `base_start`.
        hunks: Vec<ConflictHunk>,
        /// Merged text with every hunk replaced by a marker block.
        marker_text: String,
    },
}

impl MergeResult {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean { .. })
    }
}

/// Replace `\r\n` and lone `\r` with `\n`.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Split normalized text into lines after dropping at most one trailing
/// newline. Empty text has no lines.
fn split_lines(text: &str) -> Vec<&str> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    if body.is_empty() {
        return Vec::new();
    }
    body.split('\n').collect()
}

/// Merge `ours` and `theirs`, both derived from `base`.
///
/// The output keeps the trailing-newline state of `ours`.
pub fn three_way_merge(base: &str, theirs: &str, ours: &str) -> MergeResult {
    let base = normalize_line_endings(base);
    let theirs = normalize_line_endings(theirs);
    let ours = normalize_line_endings(ours);
    let keep_trailing_newline = ours.ends_with('\n');

    let base_lines = split_lines(&base);
    let theirs_lines = split_lines(&theirs);
    let ours_lines = split_lines(&ours);

    let ours_edits = diff(&base_lines, &ours_lines);
    let theirs_edits = diff(&base_lines, &theirs_lines);
    debug!(
        base_lines = base_lines.len(),
        ours_edits = ours_edits.len(),
        theirs_edits = theirs_edits.len(),
        "merging edit scripts"
    );

    let mut walk = Walk::new(&base_lines);
    let (mut oi, mut ti) = (0usize, 0usize);

    while walk.pos <= base_lines.len() {
        oi = skip_passed(&ours_edits, oi, walk.pos);
        ti = skip_passed(&theirs_edits, ti, walk.pos);
        let next_o = ours_edits.get(oi);
        let next_t = theirs_edits.get(ti);

        let next_start = match (next_o, next_t) {
            (Some(o), Some(t)) => o.base_start.min(t.base_start),
            (Some(o), None) => o.base_start,
            (None, Some(t)) => t.base_start,
            (None, None) => {
                walk.copy_base_to(base_lines.len());
                break;
            }
        };

        if next_start > walk.pos {
            walk.copy_base_to(next_start);
            continue;
        }

        let here = walk.pos;
        let o_here = next_o.filter(|e| e.base_start == here);
        let t_here = next_t.filter(|e| e.base_start == here);

        match (o_here, t_here) {
            (Some(o), Some(t)) => {
                if o.base_end == t.base_end && o.lines == t.lines {
                    walk.accept(o);
                } else if o.is_insertion() && t.is_insertion() {
                    // Neither side consumes a base line, so nothing overlaps:
                    // upstream lines first, then the author's.
                    walk.output.extend(t.lines.iter().cloned());
                    walk.output.extend(o.lines.iter().cloned());
                } else {
                    (oi, ti) = walk.conflict(&ours_edits, oi, &theirs_edits, ti);
                    continue;
                }
                oi += 1;
                ti += 1;
            }
            (Some(o), None) => match next_t.filter(|t| t.base_start < o.base_end) {
                Some(_) => {
                    (oi, ti) = walk.conflict(&ours_edits, oi, &theirs_edits, ti);
                }
                None => {
                    walk.accept(o);
                    oi += 1;
                }
            },
            (None, Some(t)) => match next_o.filter(|o| o.base_start < t.base_end) {
                Some(_) => {
                    (oi, ti) = walk.conflict(&ours_edits, oi, &theirs_edits, ti);
                }
                None => {
                    walk.accept(t);
                    ti += 1;
                }
            },
            (None, None) => {
                if walk.pos < base_lines.len() {
                    walk.copy_base_to(walk.pos + 1);
                    continue;
                }
                break;
            }
        }
    }

    let mut text = walk.output.join("\n");
    if keep_trailing_newline {
        text.push('\n');
    }

    if walk.hunks.is_empty() {
        MergeResult::Clean { merged_text: text }
    } else {
        debug!(hunks = walk.hunks.len(), "merge produced conflicts");
        MergeResult::Conflicted {
            hunks: walk.hunks,
            marker_text: text,
        }
    }
}

/// Advance `index` past edits that start before `pos`.
fn skip_passed(edits: &[Edit], mut index: usize, pos: usize) -> usize {
    while index < edits.len() && edits[index].base_start < pos {
        index += 1;
    }
    index
}

/// Output accumulator and base cursor for a single merge.
struct Walk<'a> {
    base: &'a [&'a str],
    pos: usize,
    output: Vec<String>,
    hunks: Vec<ConflictHunk>,
}

impl<'a> Walk<'a> {
    fn new(base: &'a [&'a str]) -> Self {
        Self {
            base,
            pos: 0,
            output: Vec::with_capacity(base.len()),
            hunks: Vec::new(),
        }
    }

    fn copy_base_to(&mut self, end: usize) {
        if self.pos < end {
            self.output
                .extend(self.base[self.pos..end].iter().map(|s| s.to_string()));
            self.pos = end;
        }
    }

    fn accept(&mut self, edit: &Edit) {
        self.output.extend(edit.lines.iter().cloned());
        self.pos = edit.base_end;
    }

    /// Conflict starting at the cursor with `ours[oi]` and `theirs[ti]`.
    ///
    /// The block grows while either side has another edit reaching into it
    /// (an insertion may sit right at its end), so each side's lines are its
    /// full content over the final range. Returns the indices past the
    /// absorbed edits.
    fn conflict(
        &mut self,
        ours: &[Edit],
        mut oi: usize,
        theirs: &[Edit],
        mut ti: usize,
    ) -> (usize, usize) {
        let start = self.pos;
        let (o_first, t_first) = (oi, ti);
        let mut end = ours[oi].base_end.max(theirs[ti].base_end);
        oi += 1;
        ti += 1;

        let reaches = |e: &Edit, end: usize| {
            e.base_start < end || (e.is_insertion() && e.base_start == end)
        };
        loop {
            if let Some(e) = ours.get(oi).filter(|e| reaches(e, end)) {
                end = end.max(e.base_end);
                oi += 1;
            } else if let Some(e) = theirs.get(ti).filter(|e| reaches(e, end)) {
                end = end.max(e.base_end);
                ti += 1;
            } else {
                break;
            }
        }

        let ours_lines = side_lines(self.base, start, end, &ours[o_first..oi]);
        let theirs_lines = side_lines(self.base, start, end, &theirs[t_first..ti]);

        self.output.push(OURS_MARKER.to_string());
        self.output.extend(ours_lines.iter().cloned());
        self.output.push(SEPARATOR_MARKER.to_string());
        self.output.extend(theirs_lines.iter().cloned());
        self.output.push(THEIRS_MARKER.to_string());
        self.hunks.push(ConflictHunk {
            base_start: start,
            base_end: end,
            ours_lines,
            theirs_lines,
        });
        self.pos = end;
        (oi, ti)
    }
}

/// One side's content over `base[start..end]` with its `edits` applied.
fn side_lines(base: &[&str], start: usize, end: usize, edits: &[Edit]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut cursor = start;
    for edit in edits {
        lines.extend(base[cursor..edit.base_start].iter().map(|s| s.to_string()));
        lines.extend(edit.lines.iter().cloned());
        cursor = edit.base_end;
    }
    lines.extend(base[cursor..end].iter().map(|s| s.to_string()));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged(result: &MergeResult) -> &str {
        match result {
            MergeResult::Clean { merged_text } => merged_text,
            MergeResult::Conflicted { .. } => panic!("expected a clean merge, got {result:?}"),
        }
    }

    fn conflicted(result: &MergeResult) -> (&[ConflictHunk], &str) {
        match result {
            MergeResult::Conflicted { hunks, marker_text } => (hunks, marker_text),
            MergeResult::Clean { .. } => panic!("expected conflicts, got {result:?}"),
        }
    }

    #[test]
    fn test_disjoint_appends_merge_clean() {
        let result = three_way_merge("a\nb\nc\n", "a\nb\nc\ny\n", "a\nb\nc\nx\n");
        assert_eq!(merged(&result), "a\nb\nc\ny\nx\n");
    }

    #[test]
    fn test_overlapping_edits_conflict() {
        let result = three_way_merge("a\nb\nc\n", "a\nb-theirs\nc\n", "a\nb-ours\nc\n");
        let (hunks, markers) = conflicted(&result);
        assert_eq!(hunks.len(), 1);
        assert_eq!(
            hunks[0],
            ConflictHunk {
                base_start: 1,
                base_end: 2,
                ours_lines: vec!["b-ours".into()],
                theirs_lines: vec!["b-theirs".into()],
            }
        );
        assert_eq!(
            markers,
            "a\n<<<<<<< ours\nb-ours\n=======\nb-theirs\n>>>>>>> theirs\nc\n"
        );
    }

    #[test]
    fn test_identical_edits_merge_clean() {
        let result = three_way_merge("a\nb\nc\n", "a\nb\nc\nx\n", "a\nb\nc\nx\n");
        assert_eq!(merged(&result), "a\nb\nc\nx\n");
    }

    #[test]
    fn test_one_side_unchanged_takes_other() {
        let base = "one\ntwo\nthree\n";
        let changed = "one\n2\nthree\nfour\n";
        assert_eq!(merged(&three_way_merge(base, changed, base)), changed);
        assert_eq!(merged(&three_way_merge(base, base, changed)), changed);
    }

    #[test]
    fn test_equal_sides_always_clean() {
        let base = "x\ny\nz\n";
        let side = "a\ny\nb\nc\n";
        assert_eq!(merged(&three_way_merge(base, side, side)), side);
    }

    #[test]
    fn test_non_adjacent_replacements_merge() {
        let base = "aaa\nbbb\nccc\nddd\neee\n";
        let ours = "AAA\nbbb\nccc\nddd\neee\n";
        let theirs = "aaa\nbbb\nccc\nddd\nEEE\n";
        assert_eq!(
            merged(&three_way_merge(base, theirs, ours)),
            "AAA\nbbb\nccc\nddd\nEEE\n"
        );
    }

    #[test]
    fn test_staggered_overlap_conflicts_over_union() {
        // ours rewrites lines 1..3, theirs rewrites 2..4: one hunk spanning 1..4.
        let base = "0\n1\n2\n3\n4\n";
        let ours = "0\nA\nB\n3\n4\n";
        let theirs = "0\n1\nC\nD\n4\n";
        let result = three_way_merge(base, theirs, ours);
        let (hunks, markers) = conflicted(&result);
        assert_eq!(hunks.len(), 1);
        assert_eq!((hunks[0].base_start, hunks[0].base_end), (1, 4));
        assert_eq!(hunks[0].ours_lines, vec!["A", "B"]);
        // theirs kept base line 1 inside the block.
        assert_eq!(hunks[0].theirs_lines, vec!["1", "C", "D"]);
        assert!(markers.starts_with("0\n<<<<<<< ours\nA\nB\n=======\n1\nC\nD\n>>>>>>> theirs\n4"));
    }

    #[test]
    fn test_insertion_inside_other_sides_replacement_conflicts() {
        let base = "a\nb\nc\nd\n";
        let ours = "a\nX\nY\nd\n";
        let theirs = "a\nb\nnew\nc\nd\n";
        let result = three_way_merge(base, theirs, ours);
        let (hunks, _) = conflicted(&result);
        assert_eq!(hunks.len(), 1);
        assert_eq!((hunks[0].base_start, hunks[0].base_end), (1, 3));
    }

    #[test]
    fn test_conflict_keeps_later_edits_and_kept_lines_of_shorter_side() {
        let base = "0\n1\n2\n3\n4\n";
        let theirs = "0\nX\nY\nZ\n4\n";
        let ours = "0\nA\n2\nB\n4\n";
        let result = three_way_merge(base, theirs, ours);
        let (hunks, markers) = conflicted(&result);
        assert_eq!(
            hunks,
            &[ConflictHunk {
                base_start: 1,
                base_end: 4,
                ours_lines: vec!["A".into(), "2".into(), "B".into()],
                theirs_lines: vec!["X".into(), "Y".into(), "Z".into()],
            }]
        );
        assert_eq!(
            markers,
            "0\n<<<<<<< ours\nA\n2\nB\n=======\nX\nY\nZ\n>>>>>>> theirs\n4\n"
        );
    }

    #[test]
    fn test_edit_after_conflict_range_is_applied_cleanly() {
        let base = "0\n1\n2\n3\n4\n5\n";
        let ours = "0\nA\n2\nB\nC\n5\n";
        let theirs = "0\nX\nY\n3\n4\n5\n";
        let result = three_way_merge(base, theirs, ours);
        let (hunks, markers) = conflicted(&result);
        assert_eq!(hunks.len(), 1);
        assert_eq!((hunks[0].base_start, hunks[0].base_end), (1, 3));
        assert_eq!(hunks[0].ours_lines, vec!["A", "2"]);
        assert_eq!(
            markers,
            "0\n<<<<<<< ours\nA\n2\n=======\nX\nY\n>>>>>>> theirs\nB\nC\n5\n"
        );
    }

    #[test]
    fn test_insertion_at_conflict_end_joins_block() {
        let base = "a\nb\nc\nd\n";
        let ours = "a\nB\nc\nN\nd\n";
        let theirs = "a\nX\nd\n";
        let result = three_way_merge(base, theirs, ours);
        let (hunks, markers) = conflicted(&result);
        assert_eq!(hunks.len(), 1);
        assert_eq!((hunks[0].base_start, hunks[0].base_end), (1, 3));
        assert_eq!(hunks[0].ours_lines, vec!["B", "c", "N"]);
        assert_eq!(
            markers,
            "a\n<<<<<<< ours\nB\nc\nN\n=======\nX\n>>>>>>> theirs\nd\n"
        );
    }

    #[test]
    fn test_multiple_hunks_are_ordered() {
        let base = "a\nb\nc\nd\ne\n";
        let ours = "A1\nb\nc\nd\nE1\n";
        let theirs = "A2\nb\nc\nd\nE2\n";
        let result = three_way_merge(base, theirs, ours);
        let (hunks, _) = conflicted(&result);
        assert_eq!(hunks.len(), 2);
        assert!(hunks[0].base_end <= hunks[1].base_start);
        assert_eq!(hunks[0].base_start, 0);
        assert_eq!(hunks[1].base_start, 4);
    }

    #[test]
    fn test_clean_edits_applied_alongside_conflict() {
        let base = "a\nb\nc\nd\ne\n";
        let ours = "a\nB-ours\nc\nd\ne\n";
        let theirs = "a\nB-theirs\nc\nd\nE\n";
        let result = three_way_merge(base, theirs, ours);
        let (_, markers) = conflicted(&result);
        assert!(markers.ends_with("c\nd\nE\n"));
    }

    #[test]
    fn test_crlf_inputs_are_normalized() {
        let result = three_way_merge("a\r\nb\r\n", "a\r\nb\r\nc\r\n", "a\nb\n");
        assert_eq!(merged(&result), "a\nb\nc\n");
    }

    #[test]
    fn test_trailing_newline_follows_ours() {
        let result = three_way_merge("a\nb\n", "a\nb\nc\n", "a\nb");
        assert_eq!(merged(&result), "a\nb\nc");

        let result = three_way_merge("a\nb", "a\nb", "a\nb\n");
        assert_eq!(merged(&result), "a\nb\n");
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(merged(&three_way_merge("", "", "")), "");
        assert_eq!(merged(&three_way_merge("", "new\n", "")), "new");
        assert_eq!(merged(&three_way_merge("", "", "new\n")), "new\n");
    }

    #[test]
    fn test_deletion_against_untouched_region() {
        let base = "a\nb\nc\nd\n";
        let ours = "a\nd\n";
        let theirs = "a\nb\nc\nd\ne\n";
        assert_eq!(merged(&three_way_merge(base, theirs, ours)), "a\nd\ne\n");
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_split_lines_drops_one_trailing_newline() {
        assert!(split_lines("").is_empty());
        assert!(split_lines("\n").is_empty());
        assert_eq!(split_lines("a\n"), vec!["a"]);
        assert_eq!(split_lines("a\n\n"), vec!["a", ""]);
        assert_eq!(split_lines("a"), vec!["a"]);
    }
}
