//! Error types for the confsync core library.
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
    Config(#[from] ConfigError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
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
    EnvVarMissing {
        var: String,
        field: String,
    },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// Push was rejected (e.g. non-fast-forward).
    #[error("git push rejected for branch '{branch}': {detail}")]
    PushRejected {
        branch: String,
        detail: String,
    },

    /// The remote diverged and cannot be fast-forward merged.
    #[error("cannot fast-forward branch '{0}': local and remote histories diverged")]
    NonFastForward(String),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Sync run errors
// ---------------------------------------------------------------------------

/// Errors from a backup run. Pull and push failures are distinguished so the
/// orchestrator can report where in the run the transport broke: a pull
/// failure happens before any mirroring, a push failure leaves a local
/// commit ahead of the remote until the next successful run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching or merging remote changes failed.
    #[error("pull failed: {0}")]
    PullFailed(#[source] GitError),

    /// Pushing local commits failed. A local commit already exists.
    #[error("push failed: {0}")]
    PushFailed(#[source] GitError),

    /// Underlying Git error outside pull/push.
    #[error("sync git error: {0}")]
    Git(#[from] GitError),

    /// Configuration error during sync setup.
    #[error("sync configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic I/O wrapper (mirroring, banner file).
    #[error("sync I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

/// Errors from the notification subsystem (Telegram).
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The Telegram API returned a non-success status code.
    #[error("Telegram API error (HTTP {status}): {body}")]
    ApiError {
        status: u16,
        body: String,
    },

    /// HTTP-level transport error (network, TLS, etc.).
    #[error("notification HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}
