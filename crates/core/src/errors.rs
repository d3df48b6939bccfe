//! Error types for the docdraft core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Object store errors
// ---------------------------------------------------------------------------

/// Errors from the remote object store (branch refs, blobs, commits).
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("store HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("store API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Authentication token is missing or invalid.
    #[error("store authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limit exceeded.
    #[error("store rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    /// A branch, commit, file or review request does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A create operation hit an object that is already present.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The branch head moved away from the parent the commit was built on.
    #[error("branch '{branch}' moved since {expected} was read")]
    HeadMoved { branch: String, expected: String },

    /// Response body could not be decoded.
    #[error("store response parse error: {0}")]
    Parse(String),
}

impl StoreError {
    /// Whether the failure is worth retrying with backoff.
    ///
    /// Only rate limiting, 5xx gateway/server failures and transport-level
    /// connect/timeout errors qualify.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// ---------------------------------------------------------------------------
// Draft errors
// ---------------------------------------------------------------------------

/// Errors from draft identifier handling and reconciliation requests.
#[derive(Debug, Error)]
pub enum DraftError {
    /// The opaque draft identifier is not valid base64 JSON.
    #[error("invalid draft id: {0}")]
    InvalidId(String),

    /// A required draft field is absent, empty, or not a string.
    #[error("missing draft field: {0}")]
    MissingField(String),

    /// A save was attempted without the commit the client edited against.
    #[error("missing clientBaseSha")]
    MissingClientBaseSha,

    /// The base branch a draft forks from does not exist.
    #[error("base branch '{0}' not found")]
    BaseBranchNotFound(String),

    /// A document path escapes the docs root or has an unsupported extension.
    #[error("invalid document path '{0}'")]
    InvalidPath(String),

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing { var: String, field: String },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
