//! Commands that operate on a draft in the remote repository.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Table};

use docdraft_core::config::AppConfig;
use docdraft_core::draft::{
    draft_branch_name, resolve_doc_path, ConflictPayload, DraftRef, DraftService, SaveOutcome,
    UpdateOutcome,
};
use docdraft_core::store::{GitHubStore, RetryingStore};

use crate::style;

// ---------------------------------------------------------------------------
// Draft ids
// ---------------------------------------------------------------------------

pub struct NewDraftId<'a> {
    pub doc: &'a str,
    pub user: &'a str,
    pub repo: Option<&'a str>,
    pub base: Option<&'a str>,
    pub pr: Option<u64>,
}

/// Build a draft reference from a document path and author name.
pub fn new_draft_ref(config: &AppConfig, args: &NewDraftId<'_>) -> Result<DraftRef> {
    let repo = args.repo.or(config.github.repo.as_deref()).context(
        "no repository given: pass --repo owner/name or set github.repo in the config file",
    )?;
    let Some((owner, name)) = repo.split_once('/') else {
        bail!("repository must be in 'owner/repo' format: {}", repo);
    };
    if owner.is_empty() || name.is_empty() {
        bail!("repository must be in 'owner/repo' format: {}", repo);
    }

    let github = &config.github;
    let doc_path = resolve_doc_path(&github.docs_root, args.doc)?;
    let draft_branch =
        draft_branch_name(&github.drafts_prefix, args.user, &github.docs_root, &doc_path);

    Ok(DraftRef {
        owner: owner.to_string(),
        repo: name.to_string(),
        base_branch: args.base.unwrap_or(&github.default_branch).to_string(),
        draft_branch,
        doc_path,
        pr_number: args.pr,
    })
}

pub fn cmd_draft_id_new(config: &AppConfig, args: &NewDraftId<'_>) -> Result<()> {
    let draft = new_draft_ref(config, args)?;
    eprintln!(
        "{}",
        style::dim(&format!("{} -> {}", draft.doc_path, draft.draft_branch))
    );
    println!("{}", draft.encode());
    Ok(())
}

pub fn cmd_draft_id_decode(draft_id: &str) -> Result<()> {
    let draft = DraftRef::decode(draft_id)?;
    println!("{}", serde_json::to_string_pretty(&draft)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Remote operations
// ---------------------------------------------------------------------------

fn service_for(config: &AppConfig, draft: &DraftRef) -> Result<DraftService> {
    let token = config.require_token()?;
    let github = GitHubStore::new(&config.github.api_url, token, &draft.owner, &draft.repo)
        .context("failed to build GitHub client")?;
    let store = RetryingStore::new(Arc::new(github), config.retry.policy());
    Ok(DraftService::new(Arc::new(store)))
}

fn print_conflict(conflict: &ConflictPayload) {
    eprintln!(
        "{}",
        style::warn(&format!(
            "{}: {} conflict hunk(s)",
            conflict.doc_path,
            conflict.hunks.len()
        ))
    );
    print!("{}", conflict.conflict_markers);
    eprintln!("{}", style::dim(&conflict.instructions));
}

pub async fn cmd_save(
    config: &AppConfig,
    draft_id: &str,
    file: &Path,
    base_sha: Option<&str>,
) -> Result<ExitCode> {
    let draft = DraftRef::decode(draft_id)?;
    let service = service_for(config, &draft)?;
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    // Without an explicit base the caller is assumed to have edited the
    // current head.
    let base_sha = match base_sha {
        Some(sha) => sha.to_string(),
        None => service.get_content(&draft).await?.head_sha,
    };

    let outcome = service.save_draft(&draft, &content, &base_sha).await?;
    match outcome {
        SaveOutcome::Ok { head_sha } => {
            println!("{}", style::success(&format!("saved {}", style::short_sha(&head_sha))));
        }
        SaveOutcome::Noop { head_sha } => {
            println!(
                "{}",
                style::dim(&format!("unchanged at {}", style::short_sha(&head_sha)))
            );
        }
        SaveOutcome::Merged { head_sha } => {
            println!(
                "{}",
                style::success(&format!(
                    "merged with newer changes, saved {}",
                    style::short_sha(&head_sha)
                ))
            );
        }
        SaveOutcome::Conflict { conflict } => {
            print_conflict(&conflict);
            return Ok(ExitCode::from(1));
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn cmd_update(config: &AppConfig, draft_id: &str) -> Result<ExitCode> {
    let draft = DraftRef::decode(draft_id)?;
    let service = service_for(config, &draft)?;
    match service.update_from_main(&draft).await? {
        UpdateOutcome::Updated { head_sha } => {
            println!(
                "{}",
                style::success(&format!(
                    "{} is up to date with {} at {}",
                    draft.draft_branch,
                    draft.base_branch,
                    style::short_sha(&head_sha)
                ))
            );
            Ok(ExitCode::SUCCESS)
        }
        UpdateOutcome::Conflict { conflict } => {
            print_conflict(&conflict);
            Ok(ExitCode::from(1))
        }
    }
}

pub async fn cmd_status(config: &AppConfig, draft_id: &str, json: bool) -> Result<()> {
    let draft = DraftRef::decode(draft_id)?;
    let report = service_for(config, &draft)?.get_status(&draft).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", style::header(&format!("{} ({})", draft.doc_path, draft.repo_slug())));
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec![Cell::new("Status"), Cell::new(style::status_label(report.status))]);
    table.add_row(vec!["Draft branch", draft.draft_branch.as_str()]);
    table.add_row(vec!["Draft head", style::short_sha(&report.draft_head_sha)]);
    table.add_row(vec![
        format!("{} head", draft.base_branch),
        report
            .base_head_sha
            .as_deref()
            .map(style::short_sha)
            .unwrap_or("-")
            .to_string(),
    ]);
    table.add_row(vec![
        "Ahead / behind".to_string(),
        format!("{} / {}", report.ahead_by, report.behind_by),
    ]);
    if let Some(number) = report.pr_number {
        table.add_row(vec![
            "Review".to_string(),
            format!(
                "#{} {} ({})",
                number,
                report.pr_state.as_deref().unwrap_or("unknown"),
                report.mergeable_state.as_deref().unwrap_or("unknown")
            ),
        ]);
    }
    if let Some(url) = &report.pr_url {
        table.add_row(vec!["URL", url.as_str()]);
    }
    println!("{table}");
    Ok(())
}

pub async fn cmd_show_diff(config: &AppConfig, draft_id: &str) -> Result<()> {
    let draft = DraftRef::decode(draft_id)?;
    let summary = service_for(config, &draft)?.get_diff(&draft).await?;

    println!(
        "{}",
        style::header(&format!(
            "{} [{}] +{} -{}",
            summary.doc_path, summary.status, summary.additions, summary.deletions
        ))
    );
    if summary.patch.is_empty() {
        println!("{}", style::dim("no changes against the base branch"));
    } else {
        println!("{}", summary.patch);
    }
    Ok(())
}

pub async fn cmd_open_review(config: &AppConfig, draft_id: &str) -> Result<()> {
    let draft = DraftRef::decode(draft_id)?;
    let opened = service_for(config, &draft)?.open_review(&draft).await?;
    println!(
        "{}",
        style::success(&format!("review #{}: {}", opened.pr_number, opened.url))
    );

    // Re-encode so later status calls can look the review up by number.
    let updated = DraftRef {
        pr_number: Some(opened.pr_number),
        ..draft
    };
    println!("{}", updated.encode());
    Ok(())
}
