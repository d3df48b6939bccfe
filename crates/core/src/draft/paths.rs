//! Document path and draft branch naming.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::errors::DraftError;

fn doc_extension() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.(md|mdx)$").expect("static pattern"))
}

fn unsafe_ref_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._/-]").expect("static pattern"))
}

fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    if root.is_empty() {
        return Some(path);
    }
    path.strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
}

/// Resolve user input to a repository path under `docs_root`.
///
/// Input may be relative to the docs root or already prefixed with it.
/// `.` and `..` segments are collapsed; the result must stay under the root
/// and name a `.md` or `.mdx` file.
pub fn resolve_doc_path(docs_root: &str, input: &str) -> Result<String, DraftError> {
    let root = docs_root.trim_matches('/');
    let cleaned = input.trim().trim_start_matches('/');
    let combined = if strip_root(cleaned, root).is_some() || root.is_empty() {
        cleaned.to_string()
    } else {
        format!("{}/{}", root, cleaned)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in combined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(DraftError::InvalidPath(input.to_string()));
                }
            }
            s => segments.push(s),
        }
    }
    let normalized = segments.join("/");

    if strip_root(&normalized, root).map_or(true, str::is_empty) {
        return Err(DraftError::InvalidPath(input.to_string()));
    }
    if !doc_extension().is_match(&normalized) {
        return Err(DraftError::InvalidPath(input.to_string()));
    }
    Ok(normalized)
}

/// Branch name for `user`'s draft of `doc_path`: `prefix/user/<slug>`, where
/// the slug is the path below `docs_root` without its extension.
pub fn draft_branch_name(prefix: &str, user: &str, docs_root: &str, doc_path: &str) -> String {
    let root = docs_root.trim_matches('/');
    let relative = strip_root(doc_path, root).unwrap_or(doc_path);
    let stem = doc_extension().replace(relative, "");
    let slug = unsafe_ref_chars().replace_all(&stem, "-");
    let user = unsafe_ref_chars().replace_all(user.trim(), "-");
    format!("{}/{}/{}", prefix.trim_matches('/'), user, slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "content/docs";

    #[test]
    fn test_resolve_relative_and_prefixed() {
        assert_eq!(
            resolve_doc_path(ROOT, "guide/intro.mdx").unwrap(),
            "content/docs/guide/intro.mdx"
        );
        assert_eq!(
            resolve_doc_path(ROOT, "  /content/docs/guide/intro.md ").unwrap(),
            "content/docs/guide/intro.md"
        );
        assert_eq!(
            resolve_doc_path("content/docs/", "./a/../b.md").unwrap(),
            "content/docs/b.md"
        );
    }

    #[test]
    fn test_resolve_rejects_escape() {
        for input in ["../secrets.md", "content/docs/../../x.md", "../../../etc/passwd.md"] {
            assert!(
                matches!(resolve_doc_path(ROOT, input), Err(DraftError::InvalidPath(_))),
                "accepted {input}"
            );
        }
        // A sibling sharing the root as a string prefix is treated as relative.
        assert_eq!(
            resolve_doc_path(ROOT, "content/docs-private/x.md").unwrap(),
            "content/docs/content/docs-private/x.md"
        );
    }

    #[test]
    fn test_resolve_rejects_other_extensions() {
        assert!(resolve_doc_path(ROOT, "guide/logo.png").is_err());
        assert!(resolve_doc_path(ROOT, "guide/notes.md.bak").is_err());
        assert!(resolve_doc_path(ROOT, "").is_err());
    }

    #[test]
    fn test_draft_branch_name() {
        assert_eq!(
            draft_branch_name("drafts", "alice", ROOT, "content/docs/guide/intro.mdx"),
            "drafts/alice/guide/intro"
        );
        assert_eq!(
            draft_branch_name("/drafts/", "bob smith", ROOT, "content/docs/a b(1).md"),
            "drafts/bob-smith/a-b-1-"
        );
    }
}
