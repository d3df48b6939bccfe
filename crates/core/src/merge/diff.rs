//! Line diff engine.
//!
//! Produces an edit script between a base line sequence and a variant using a
//! full longest-common-subsequence table. Ties are broken toward advancing the
//! base cursor so the output is reproducible for identical input.

use serde::Serialize;

/// A replaced base range `[base_start, base_end)` and its replacement lines.
///
/// A pure insertion has `base_start == base_end`; a pure deletion has empty
/// `lines`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    pub base_start: usize,
    pub base_end: usize,
    pub lines: Vec<String>,
}

impl Edit {
    /// True when the edit inserts lines without consuming any base line.
    pub fn is_insertion(&self) -> bool {
        self.base_start == self.base_end
    }
}

/// Row-major `(m + 1) x (n + 1)` table where `get(i, j)` is the LCS length of
/// `base[i..]` and `other[j..]`.
struct LcsTable {
    width: usize,
    cells: Vec<usize>,
}

impl LcsTable {
    fn build(base: &[&str], other: &[&str]) -> Self {
        let (m, n) = (base.len(), other.len());
        let width = n + 1;
        let mut cells = vec![0usize; (m + 1) * width];
        for i in (0..m).rev() {
            for j in (0..n).rev() {
                cells[i * width + j] = if base[i] == other[j] {
                    cells[(i + 1) * width + j + 1] + 1
                } else {
                    cells[(i + 1) * width + j].max(cells[i * width + j + 1])
                };
            }
        }
        Self { width, cells }
    }

    fn get(&self, i: usize, j: usize) -> usize {
        self.cells[i * self.width + j]
    }
}

/// Compute the edit script turning `base` into `other`.
///
/// Shared runs are skipped; each divergent region is extended one line at a
/// time toward whichever side keeps the larger common subsequence ahead,
/// until the sequences realign on an equal pair or run out.
pub fn diff(base: &[&str], other: &[&str]) -> Vec<Edit> {
    let (m, n) = (base.len(), other.len());
    let table = LcsTable::build(base, other);
    let mut edits = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < m || j < n {
        if i < m && j < n && base[i] == other[j] {
            i += 1;
            j += 1;
            continue;
        }

        let (base_start, other_start) = (i, j);
        while i < m || j < n {
            if i < m && j < n {
                if base[i] == other[j] {
                    break;
                }
                if table.get(i + 1, j) >= table.get(i, j + 1) {
                    i += 1;
                } else {
                    j += 1;
                }
            } else if i < m {
                i += 1;
            } else {
                j += 1;
            }
        }

        edits.push(Edit {
            base_start,
            base_end: i,
            lines: other[other_start..j].iter().map(|s| s.to_string()).collect(),
        });
    }

    edits
}

/// Apply an edit script produced by [`diff`] to `base`.
pub fn apply(base: &[&str], edits: &[Edit]) -> Vec<String> {
    let mut out = Vec::with_capacity(base.len());
    let mut cursor = 0;
    for edit in edits {
        out.extend(base[cursor..edit.base_start].iter().map(|s| s.to_string()));
        out.extend(edit.lines.iter().cloned());
        cursor = edit.base_end;
    }
    out.extend(base[cursor..].iter().map(|s| s.to_string()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<&str> {
        if s.is_empty() {
            Vec::new()
        } else {
            s.split('\n').collect()
        }
    }

    #[test]
    fn test_identical_sequences_have_no_edits() {
        for text in ["", "a", "a\nb\nc", "x\n\ny"] {
            let l = lines(text);
            assert!(diff(&l, &l).is_empty(), "expected no edits for {text:?}");
        }
    }

    #[test]
    fn test_append_is_single_insertion() {
        let base = lines("a\nb\nc");
        let other = lines("a\nb\nc\nx");
        assert_eq!(
            diff(&base, &other),
            vec![Edit {
                base_start: 3,
                base_end: 3,
                lines: vec!["x".into()],
            }]
        );
    }

    #[test]
    fn test_replacement_covers_changed_line() {
        let base = lines("a\nb\nc");
        let other = lines("a\nB\nc");
        assert_eq!(
            diff(&base, &other),
            vec![Edit {
                base_start: 1,
                base_end: 2,
                lines: vec!["B".into()],
            }]
        );
    }

    #[test]
    fn test_deletion_has_empty_lines() {
        let base = lines("a\nb\nc\nd");
        let other = lines("a\nd");
        let edits = diff(&base, &other);
        assert_eq!(
            edits,
            vec![Edit {
                base_start: 1,
                base_end: 3,
                lines: vec![],
            }]
        );
        assert!(!edits[0].is_insertion());
    }

    #[test]
    fn test_empty_base_and_empty_other() {
        let other = lines("a\nb");
        assert_eq!(
            diff(&[], &other),
            vec![Edit {
                base_start: 0,
                base_end: 0,
                lines: vec!["a".into(), "b".into()],
            }]
        );
        let base = lines("a\nb");
        assert_eq!(
            diff(&base, &[]),
            vec![Edit {
                base_start: 0,
                base_end: 2,
                lines: vec![],
            }]
        );
    }

    #[test]
    fn test_disjoint_edits_stay_separate() {
        let base = lines("1\n2\n3\n4\n5");
        let other = lines("one\n2\n3\n4\nfive");
        let edits = diff(&base, &other);
        assert_eq!(edits.len(), 2);
        assert_eq!((edits[0].base_start, edits[0].base_end), (0, 1));
        assert_eq!((edits[1].base_start, edits[1].base_end), (4, 5));
    }

    #[test]
    fn test_tie_prefers_consuming_base_first() {
        // Both orders keep an LCS of length 0; the base line is consumed
        // before the replacement line, giving one edit over the whole range.
        let base = lines("x");
        let other = lines("y");
        assert_eq!(
            diff(&base, &other),
            vec![Edit {
                base_start: 0,
                base_end: 1,
                lines: vec!["y".into()],
            }]
        );
    }

    #[test]
    fn test_apply_reconstructs_other() {
        let cases = [
            ("", ""),
            ("", "a\nb"),
            ("a\nb", ""),
            ("a\nb\nc", "a\nb\nc"),
            ("a\nb\nc", "c\nb\na"),
            ("a\nb\nc\nd\ne", "a\nx\nc\ny\ne\nz"),
            ("the\nquick\nbrown\nfox", "a\nquick\nred\nfox\njumps"),
            ("a\na\na\nb", "a\nb\na\na"),
            ("\n\n", "\nx\n"),
        ];
        for (b, o) in cases {
            let base = lines(b);
            let other = lines(o);
            let edits = diff(&base, &other);
            assert_eq!(apply(&base, &edits), other, "base={b:?} other={o:?}");
        }
    }

    #[test]
    fn test_edits_are_ordered_and_non_overlapping() {
        let base = lines("a\nb\nc\nd\ne\nf\ng");
        let other = lines("a\nB\nc\nd\nE\nF\ng\nh");
        let edits = diff(&base, &other);
        for pair in edits.windows(2) {
            assert!(pair[0].base_end <= pair[1].base_start);
        }
    }

    #[test]
    fn test_diff_is_deterministic() {
        let base = lines("a\nb\na\nb");
        let other = lines("b\na\nb\na");
        assert_eq!(diff(&base, &other), diff(&base, &other));
    }
}
