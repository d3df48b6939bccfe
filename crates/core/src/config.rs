//! TOML-based configuration for docdraft.
//!
//! Tokens are never stored in the file. The `token_env` field names an
//! environment variable that is resolved at runtime via
//! [`AppConfig::resolve_env_vars`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::store::RetryPolicy;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server and logging settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// GitHub repository and API settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// Retry behaviour for remote store calls.
    #[serde(default)]
    pub retry: RetryConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default `127.0.0.1:3000`).
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen() -> String {
    "127.0.0.1:3000".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

/// GitHub repository and API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API base URL (default `https://api.github.com`).
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Default repository in `owner/repo` format, used when creating new
    /// draft identifiers.
    #[serde(default)]
    pub repo: Option<String>,

    /// Environment variable holding the service token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Base branch drafts fork from (e.g. `main`).
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Directory holding the published documents.
    #[serde(default = "default_docs_root")]
    pub docs_root: String,

    /// Branch namespace for per-author drafts.
    #[serde(default = "default_drafts_prefix")]
    pub drafts_prefix: String,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_branch() -> String {
    "main".into()
}
fn default_docs_root() -> String {
    "content/docs".into()
}
fn default_drafts_prefix() -> String {
    "drafts".into()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            repo: None,
            token_env: default_token_env(),
            default_branch: default_branch(),
            docs_root: default_docs_root(),
            drafts_prefix: default_drafts_prefix(),
            token: None,
        }
    }
}

impl GitHubConfig {
    /// Split the configured `owner/repo` pair.
    pub fn owner_and_repo(&self) -> Option<(&str, &str)> {
        self.repo.as_deref().and_then(|r| r.split_once('/'))
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per remote call, including the first (default 4).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubled on each subsequent retry.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    4
}
fn default_initial_delay_ms() -> u64 {
    300
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the token variable. A missing variable only logs a warning:
    /// requests may still carry their own bearer token.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        self.github.token = resolve_optional_env(&self.github.token_env, "github.token_env");
        Ok(())
    }

    /// The resolved service token, or an error naming the unset variable.
    /// Used by commands that talk to the store without a per-request token.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.github
            .token
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarMissing {
                var: self.github.token_env.clone(),
                field: "github.token_env".into(),
            })
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github.api_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "github.api_url".into(),
                detail: "API URL must not be empty".into(),
            });
        }
        if let Some(repo) = &self.github.repo {
            let valid = repo
                .split_once('/')
                .map(|(o, r)| !o.is_empty() && !r.is_empty() && !r.contains('/'))
                .unwrap_or(false);
            if !valid {
                return Err(ConfigError::InvalidValue {
                    field: "github.repo".into(),
                    detail: "GitHub repo must be in 'owner/repo' format".into(),
                });
            }
        }
        if self.github.default_branch.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "github.default_branch".into(),
                detail: "default branch must not be empty".into(),
            });
        }
        if self.github.docs_root.trim_matches('/').is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "github.docs_root".into(),
                detail: "docs root must not be empty".into(),
            });
        }
        if self.github.drafts_prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "github.drafts_prefix".into(),
                detail: "drafts prefix must not be empty".into(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".into(),
                detail: "at least one attempt is required".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}
