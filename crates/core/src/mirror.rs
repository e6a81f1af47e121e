//! Additive directory mirroring into the working copy.
//!
//! Mirroring copies every regular file under a source directory into the
//! repository, preserving relative structure, and stages each copy. It never
//! deletes destination files that disappeared from the source, and it
//! overwrites unconditionally rather than comparing timestamps or hashes:
//! staging an unchanged file leaves the staged diff empty, so re-mirroring
//! is idempotent. A crash mid-walk leaves a partial destination tree; the
//! next run's re-mirror is the recovery path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::DirConfig;
use crate::errors::SyncError;
use crate::git::GitClient;

/// One directory to mirror, resolved from config for the run's duration.
#[derive(Debug, Clone)]
pub struct SyncTarget {
    /// Absolute source directory.
    pub source: PathBuf,

    /// Destination directory relative to the repository root.
    pub repo_path: PathBuf,

    /// Absolute source file paths to skip (exact-path membership; a file
    /// moved elsewhere is no longer covered by its old exclusion entry).
    pub exclude: HashSet<PathBuf>,
}

impl From<&DirConfig> for SyncTarget {
    fn from(dir: &DirConfig) -> Self {
        Self {
            source: dir.path.clone(),
            repo_path: dir.repo_path.clone(),
            exclude: dir.exclude.iter().cloned().collect(),
        }
    }
}

/// Repo-relative paths staged across all targets of the current run.
#[derive(Debug, Default)]
pub struct StagedChangeSet {
    paths: Vec<PathBuf>,
}

impl StagedChangeSet {
    pub fn record(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Mirror one target into the working copy, staging every copied file.
///
/// A missing source directory is tolerated: there is nothing to back up
/// yet, so the target is skipped with a warning and the run continues.
pub fn mirror_target(
    target: &SyncTarget,
    client: &GitClient,
    staged: &mut StagedChangeSet,
) -> Result<(), SyncError> {
    if !target.source.exists() {
        warn!(
            source = %target.source.display(),
            "source directory does not exist, skipping target"
        );
        return Ok(());
    }

    debug!(
        source = %target.source.display(),
        dest = %target.repo_path.display(),
        "mirroring directory"
    );

    for entry in WalkDir::new(&target.source) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !is_backup_file(&entry) {
            continue;
        }
        if target.exclude.contains(entry.path()) {
            debug!(path = %entry.path().display(), "excluded, skipping");
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(&target.source) else {
            continue;
        };
        let dest_relative = target.repo_path.join(relative);
        let dest = client.workdir().join(&dest_relative);

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(entry.path(), &dest)?;
        client.stage(&dest_relative)?;
        staged.record(dest_relative);
    }

    debug!(files = staged.len(), "target mirrored");
    Ok(())
}

/// Regular files, plus symlinks whose target is a regular file: the copy
/// reads through the link, so a symlinked config file is backed up as its
/// target's contents. Broken links are skipped. Symlinked directories are
/// not descended into.
fn is_backup_file(entry: &walkdir::DirEntry) -> bool {
    if entry.file_type().is_file() {
        return true;
    }
    entry.path_is_symlink()
        && std::fs::metadata(entry.path())
            .map(|m| m.is_file())
            .unwrap_or(false)
}
