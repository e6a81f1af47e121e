//! confsync core library.
//!
//! This crate provides the components for git-backed directory backup:
//! configuration, repository lifecycle, directory mirroring, the change-gated
//! sync engine, and Telegram notifications.

pub mod config;
pub mod errors;
pub mod git;
pub mod lifecycle;
pub mod mirror;
pub mod notify;
pub mod sync_engine;

// Re-exports for convenience.
pub use config::AppConfig;
pub use git::GitClient;
pub use sync_engine::{SyncEngine, SyncOutcome};
