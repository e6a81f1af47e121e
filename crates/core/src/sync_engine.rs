//! The backup run orchestrator.
//!
//! One [`SyncEngine::run`] call is one scheduled invocation: ensure the
//! working copy, pull, mirror every configured directory, and — only when
//! the staged diff is non-empty — commit, push, notify, strictly in that
//! order. Mutual exclusion between overlapping invocations is the external
//! scheduler's responsibility; the working copy is not locked here.

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::errors::{NotificationError, SyncError};
use crate::lifecycle;
use crate::mirror::{self, StagedChangeSet, SyncTarget};
use crate::notify::{NotificationPayload, Notifier};

/// Commit message used for every backup commit.
pub const SYNC_COMMIT_MESSAGE: &str = "Script sync";

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Sources were byte-identical to the last synced state; nothing was
    /// committed, pushed, or notified.
    NoChanges,

    /// A backup commit was created and pushed.
    Synced {
        /// Full SHA of the backup commit.
        commit: String,
        /// Number of files mirrored and staged this run.
        files: usize,
    },
}

/// Orchestrates a single backup run over an already-validated configuration.
pub struct SyncEngine {
    config: AppConfig,
    notifier: Notifier,
}

impl SyncEngine {
    /// Build an engine, constructing the notifier from the config.
    pub fn new(config: AppConfig) -> Result<Self, NotificationError> {
        let notifier = Notifier::new(config.telegram.as_ref())?;
        Ok(Self { config, notifier })
    }

    /// Run one backup cycle.
    ///
    /// Pull and push failures are fatal; a push failure leaves the local
    /// commit in place for the next run to carry. Notification failures are
    /// logged and swallowed — the backup already succeeded.
    pub async fn run(&self) -> Result<SyncOutcome, SyncError> {
        let repo = &self.config.repo;
        let identity = &self.config.identity;
        let token = repo.token.as_deref();

        let client = lifecycle::ensure(repo, identity)?;

        client
            .pull(&repo.branch, token)
            .map_err(SyncError::PullFailed)?;

        // A previous run may have committed and then failed to push. Push
        // that commit now, before mirroring, so the retry stays isolated
        // from this run's backup commit.
        if client.is_ahead_of_remote(&repo.branch)? {
            warn!("unpushed commit from a previous run detected, pushing");
            client
                .push(&repo.branch, token)
                .map_err(SyncError::PushFailed)?;
        }

        let mut staged = StagedChangeSet::default();
        for dir in &self.config.dirs {
            mirror::mirror_target(&SyncTarget::from(dir), &client, &mut staged)?;
        }

        let diff = client.diff_staged()?;
        if diff.is_empty() {
            info!("no changes detected");
            return Ok(SyncOutcome::NoChanges);
        }

        let oid = match client.commit_if_staged(
            SYNC_COMMIT_MESSAGE,
            &identity.name,
            &identity.email,
        )? {
            Some(oid) => oid,
            // The diff was non-empty a moment ago; treat a raced-away index
            // as a no-op rather than an error.
            None => return Ok(SyncOutcome::NoChanges),
        };

        client
            .push(&repo.branch, token)
            .map_err(SyncError::PushFailed)?;

        if self.notifier.is_configured() {
            let payload = NotificationPayload {
                diff_text: diff,
                commit_sha: oid.to_string(),
                repo_url: repo.url.clone(),
            };
            if let Err(e) = self.notifier.notify_sync(&payload).await {
                warn!(error = %e, "notification delivery failed");
            }
        }

        info!(commit = %oid, files = staged.len(), "backup synchronized");
        Ok(SyncOutcome::Synced {
            commit: oid.to_string(),
            files: staged.len(),
        })
    }
}
