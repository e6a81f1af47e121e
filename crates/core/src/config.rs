//! TOML-based configuration system for confsync.
//!
//! All sensitive values (the git access token, the Telegram bot token) are
//! stored as `_env` fields that reference environment variable names. The
//! actual secrets are resolved at runtime via [`AppConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backup repository settings.
    pub repo: RepoConfig,

    /// Commit identity settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Telegram notification settings. Omit the table to disable
    /// notifications entirely.
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,

    /// Directories to back up.
    #[serde(default)]
    pub dirs: Vec<DirConfig>,
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Backup repository connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// HTTPS URL of the remote repository (e.g. `https://github.com/acme/backup`).
    pub url: String,

    /// Environment variable holding the git access token.
    pub token_env: String,

    /// Local path where the working copy is cloned and kept between runs.
    pub local_path: PathBuf,

    /// Branch to commit and push to. Default `main`.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_branch() -> String {
    "main".into()
}

// ---------------------------------------------------------------------------
// Commit identity
// ---------------------------------------------------------------------------

/// Author/committer identity written into the working copy on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Commit author name. Default `Script sync`.
    #[serde(default = "default_identity_name")]
    pub name: String,

    /// Commit author email. Default `sync@mail.invalid`.
    #[serde(default = "default_identity_email")]
    pub email: String,
}

fn default_identity_name() -> String {
    "Script sync".into()
}
fn default_identity_email() -> String {
    "sync@mail.invalid".into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_identity_name(),
            email: default_identity_email(),
        }
    }
}

// ---------------------------------------------------------------------------
// Telegram notifications
// ---------------------------------------------------------------------------

/// Telegram bot notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Environment variable holding the Telegram bot token.
    pub bot_token_env: String,

    /// Chat / channel identifier the notifications go to.
    pub chat_id: String,

    /// Bind the HTTP client to IPv4 only. Useful on hosts whose IPv6
    /// route to api.telegram.org is broken.
    #[serde(default)]
    pub force_ipv4: bool,

    /// Telegram API base URL. Overridable for testing.
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,

    /// Resolved bot token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub bot_token: Option<String>,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".into()
}

// ---------------------------------------------------------------------------
// Backup directories
// ---------------------------------------------------------------------------

/// One directory to mirror into the backup repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirConfig {
    /// Absolute path of the source directory on the local filesystem.
    pub path: PathBuf,

    /// Destination path relative to the repository root.
    pub repo_path: PathBuf,

    /// Absolute source file paths to skip. Matching is by exact path,
    /// not by glob — a renamed or moved file is no longer excluded.
    #[serde(default)]
    pub exclude: Vec<PathBuf>,
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

    /// Resolve all `*_env` fields from environment variables and populate the
    /// corresponding resolved fields.
    ///
    /// Fields that reference a missing variable will log a warning but will
    /// **not** fail -- a token is not needed for file-protocol remotes, and
    /// notifications are best-effort anyway.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");

        self.repo.token = resolve_optional_env(&self.repo.token_env, "repo.token_env");

        if let Some(ref mut telegram) = self.telegram {
            telegram.bot_token =
                resolve_optional_env(&telegram.bot_token_env, "telegram.bot_token_env");
        }

        debug!("environment variable resolution complete");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repo.url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repo.url".into(),
                detail: "repository URL must not be empty".into(),
            });
        }
        if !self.repo.url.starts_with("http://") && !self.repo.url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "repo.url".into(),
                detail: "repository URL must be http(s)".into(),
            });
        }
        if self.repo.local_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repo.local_path".into(),
                detail: "local working copy path must not be empty".into(),
            });
        }
        if self.repo.branch.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repo.branch".into(),
                detail: "branch must not be empty".into(),
            });
        }

        if let Some(ref telegram) = self.telegram {
            if telegram.chat_id.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "telegram.chat_id".into(),
                    detail: "chat_id must not be empty".into(),
                });
            }
        }

        for (i, dir) in self.dirs.iter().enumerate() {
            if !dir.path.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    field: format!("dirs[{}].path", i),
                    detail: "source path must be absolute".into(),
                });
            }
            if dir.repo_path.as_os_str().is_empty() || dir.repo_path.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    field: format!("dirs[{}].repo_path", i),
                    detail: "destination path must be non-empty and relative to the repo root"
                        .into(),
                });
            }
            for excluded in &dir.exclude {
                if !excluded.is_absolute() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("dirs[{}].exclude", i),
                        detail: format!(
                            "excluded path '{}' must be absolute",
                            excluded.display()
                        ),
                    });
                }
            }
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

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
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
