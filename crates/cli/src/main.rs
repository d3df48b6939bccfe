//! docdraft command-line tool.
//!
//! Offline merge and diff of local files, draft id helpers, remote draft
//! operations against a GitHub repository, and the HTTP API server.

mod local;
mod remote;
mod signals;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docdraft_core::config::AppConfig;
use docdraft_core::store::InMemoryStore;
use docdraft_web::{GitHubStores, SharedStore, StoreProvider, WebServer};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Reconcile concurrent edits to documents kept on draft branches.
#[derive(Parser, Debug)]
#[command(name = "docdraft", version, about = "Draft reconciliation for Git-hosted documents")]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Defaults to `<config dir>/docdraft/config.toml`; built-in defaults
    /// apply when that file does not exist.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `docdraft_core=trace`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Three-way merge of local files. Exits with 1 on conflicts.
    Merge {
        base: PathBuf,
        theirs: PathBuf,
        ours: PathBuf,

        /// Write the result here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show line edits from BASE to OTHER. Exits with 1 when they differ.
    Diff { base: PathBuf, other: PathBuf },

    /// Create or inspect draft ids.
    DraftId {
        #[command(subcommand)]
        action: DraftIdAction,
    },

    /// Save a local file to a draft, merging with newer changes if needed.
    Save {
        draft_id: String,

        /// File holding the edited document.
        #[arg(short, long)]
        file: PathBuf,

        /// Draft head the edit started from. Defaults to the current head.
        #[arg(long)]
        base_sha: Option<String>,
    },

    /// Merge the base branch into a draft.
    Update { draft_id: String },

    /// Show a draft's review status.
    Status {
        draft_id: String,

        /// Print the raw report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the draft's changes against its base branch.
    ShowDiff { draft_id: String },

    /// Open a review request for a draft, or return the open one.
    OpenReview { draft_id: String },

    /// Run the HTTP API server.
    Serve {
        /// Listen address; overrides `server.listen`.
        #[arg(short, long)]
        listen: Option<String>,

        /// Serve from an in-memory repository seeded with an empty default branch.
        #[arg(long)]
        in_memory: bool,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./docdraft.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

#[derive(Subcommand, Debug)]
enum DraftIdAction {
    /// Encode a new draft id for a document.
    New {
        /// Document path, absolute or relative to the docs root.
        #[arg(long)]
        doc: String,

        /// Author the draft branch belongs to.
        #[arg(long)]
        user: String,

        /// Repository as `owner/repo`; overrides `github.repo`.
        #[arg(long)]
        repo: Option<String>,

        /// Base branch; overrides `github.default_branch`.
        #[arg(long)]
        base: Option<String>,

        /// Review request number, if one is already open.
        #[arg(long)]
        pr: Option<u64>,
    },
    /// Print the fields of a draft id.
    Decode { draft_id: String },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(filter: &str, with_time: bool) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if with_time {
        builder.init();
    } else {
        builder.without_time().init();
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let Cli {
        config: config_arg,
        log_level,
        command,
    } = cli;
    let config_arg = config_arg.as_deref();

    // The server logs at its configured level; one-shot commands stay quiet.
    if !matches!(command, Commands::Serve { .. }) {
        init_tracing(log_level.as_deref().unwrap_or("warn"), false);
    }

    match command {
        Commands::Merge {
            base,
            theirs,
            ours,
            output,
        } => local::run_merge(&base, &theirs, &ours, output.as_deref()),
        Commands::Diff { base, other } => local::run_diff(&base, &other),
        Commands::Init { output } => {
            cmd_init(&output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate => {
            cmd_validate(&config_path(config_arg)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::DraftId { action } => {
            match action {
                DraftIdAction::New {
                    doc,
                    user,
                    repo,
                    base,
                    pr,
                } => {
                    let config = load_config(config_arg)?;
                    let args = remote::NewDraftId {
                        doc: &doc,
                        user: &user,
                        repo: repo.as_deref(),
                        base: base.as_deref(),
                        pr,
                    };
                    remote::cmd_draft_id_new(&config, &args)?;
                }
                DraftIdAction::Decode { draft_id } => remote::cmd_draft_id_decode(&draft_id)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Save {
            draft_id,
            file,
            base_sha,
        } => {
            let config = load_config(config_arg)?;
            remote::cmd_save(&config, &draft_id, &file, base_sha.as_deref()).await
        }
        Commands::Update { draft_id } => {
            remote::cmd_update(&load_config(config_arg)?, &draft_id).await
        }
        Commands::Status { draft_id, json } => {
            remote::cmd_status(&load_config(config_arg)?, &draft_id, json).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ShowDiff { draft_id } => {
            remote::cmd_show_diff(&load_config(config_arg)?, &draft_id).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::OpenReview { draft_id } => {
            remote::cmd_open_review(&load_config(config_arg)?, &draft_id).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Serve { listen, in_memory } => {
            let config = load_config(config_arg)?;
            init_tracing(
                log_level.as_deref().unwrap_or(&config.server.log_level),
                true,
            );
            cmd_serve(config, listen, in_memory).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("docdraft").join("config.toml"))
}

fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path().context("could not determine the user config directory"),
    }
}

/// Load, resolve and validate the config. An absent default file means
/// built-in defaults; an absent explicit file is an error.
fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let mut config = match explicit {
        Some(path) => {
            AppConfig::load_from_file(path).context("failed to load configuration file")?
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => {
                AppConfig::load_from_file(&path).context("failed to load configuration file")?
            }
            None => AppConfig::default(),
        },
    };
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"# docdraft configuration

[server]
listen = "127.0.0.1:3000"
log_level = "info"

[github]
api_url = "https://api.github.com"
repo = "owner/repo"
token_env = "GITHUB_TOKEN"
default_branch = "main"
docs_root = "content/docs"
drafts_prefix = "drafts"

[retry]
max_attempts = 4
initial_delay_ms = 300
"#;

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, DEFAULT_CONFIG).context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!("Default configuration written to {}", output.display()))
    );
    println!();
    println!("Next steps:");
    println!("  1. Set github.repo to your documentation repository");
    println!("  2. Export the token variable named by github.token_env");
    println!("  3. Validate with: docdraft validate --config {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  {}", style::success("TOML structure is valid"));

    config.resolve_env_vars()?;
    println!("  {}", style::success("Environment variable references processed"));

    if let Err(e) = config.validate() {
        println!("  {}", style::error(&format!("Validation error: {}", e)));
        anyhow::bail!("configuration validation failed");
    }
    println!("  {}", style::success("All required fields are valid"));

    println!();
    println!("{}", style::header("Configuration summary:"));
    println!("  Listen        : {}", config.server.listen);
    println!("  API URL       : {}", config.github.api_url);
    println!(
        "  Repository    : {}",
        config.github.repo.as_deref().unwrap_or("(per draft id)")
    );
    println!(
        "  Token         : {}",
        if config.github.token.is_some() {
            "set"
        } else {
            "NOT SET"
        }
    );
    println!("  Base branch   : {}", config.github.default_branch);
    println!("  Docs root     : {}", config.github.docs_root);
    println!("  Drafts prefix : {}", config.github.drafts_prefix);
    println!(
        "  Retry         : {} attempts from {}ms",
        config.retry.max_attempts, config.retry.initial_delay_ms
    );
    Ok(())
}

async fn cmd_serve(config: AppConfig, listen: Option<String>, in_memory: bool) -> Result<()> {
    let listen = listen.unwrap_or_else(|| config.server.listen.clone());

    let stores: Arc<dyn StoreProvider> = if in_memory {
        let store = InMemoryStore::new();
        store.seed_branch(&config.github.default_branch, &[]);
        info!(branch = %config.github.default_branch, "serving from an in-memory repository");
        Arc::new(SharedStore(Arc::new(store)))
    } else {
        Arc::new(GitHubStores::from_config(&config))
    };

    WebServer::new(config, stores)
        .start(&listen, signals::wait_for_shutdown())
        .await
}
