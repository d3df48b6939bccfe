//! Terminal styling helpers.

use console::Style;

use docdraft_core::draft::DraftStatus;

/// Green check followed by `msg`.
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Red cross followed by `msg`.
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Status label coloured by how much attention it needs.
pub fn status_label(status: DraftStatus) -> String {
    let style = match status {
        DraftStatus::Draft => Style::new().yellow(),
        DraftStatus::InReview => Style::new().blue(),
        DraftStatus::Approved => Style::new().green(),
        DraftStatus::Conflicts | DraftStatus::ChecksFailing => Style::new().red().bold(),
        DraftStatus::OutOfDate => Style::new().magenta(),
    };
    style.apply_to(status.to_string()).to_string()
}

/// First seven characters of a commit id.
pub fn short_sha(sha: &str) -> &str {
    &sha[..7.min(sha.len())]
}
