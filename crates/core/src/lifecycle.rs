//! Repository lifecycle: clone-or-open, identity, and the banner bootstrap.
//!
//! [`ensure`] guarantees that by the time a run starts mirroring, a usable
//! working copy exists, its commit identity is configured, and the banner
//! file marks the repository as automation-managed. Banner commits are made
//! and pushed here, before the main run, so they stay separate from backup
//! commits in the history.

use std::path::Path;

use tracing::{debug, info};

use crate::config::{IdentityConfig, RepoConfig};
use crate::errors::SyncError;
use crate::git::GitClient;

/// First line of the banner file. Anything cloning this repository should
/// see immediately that hand-edits will be overwritten.
pub const BANNER: &str = "# THIS REPO IS MANAGED BY A SCRIPT\n";

/// File the banner lives in, at the repository root.
pub const BANNER_FILE: &str = "README.md";

/// Ensure a usable working copy exists at `repo.local_path`.
///
/// Clones when the path holds no repository, opens otherwise. The commit
/// identity is (re)written on every call, covering working copies that were
/// created outside this tool. On an empty remote the banner file is
/// committed as "Initial commit" and pushed; on an existing history a
/// missing or displaced banner is prepended and pushed as a corrective
/// commit right away.
pub fn ensure(repo: &RepoConfig, identity: &IdentityConfig) -> Result<GitClient, SyncError> {
    let client = if repo.local_path.join(".git").exists() {
        debug!(path = %repo.local_path.display(), "working copy already present");
        GitClient::new(&repo.local_path)?
    } else {
        if let Some(parent) = repo.local_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        GitClient::clone_repo(&repo.url, &repo.local_path, repo.token.as_deref())?
    };

    client.set_identity(&identity.name, &identity.email)?;

    if !client.has_any_commit()? {
        bootstrap_empty(&client, repo, identity)?;
    } else {
        fix_banner_if_needed(&client, repo, identity)?;
    }

    Ok(client)
}

/// First commit into an empty repository: just the banner file.
fn bootstrap_empty(
    client: &GitClient,
    repo: &RepoConfig,
    identity: &IdentityConfig,
) -> Result<(), SyncError> {
    info!("repository is empty, initializing banner file");

    // Pin the branch name before the first commit; the unborn HEAD of an
    // empty clone depends on host defaults otherwise.
    client.set_head_branch(&repo.branch)?;

    std::fs::write(client.workdir().join(BANNER_FILE), BANNER)?;
    client.stage(Path::new(BANNER_FILE))?;
    client.commit("Initial commit", &identity.name, &identity.email)?;
    client
        .push(&repo.branch, repo.token.as_deref())
        .map_err(SyncError::PushFailed)?;
    Ok(())
}

/// Prepend the banner to an existing repository's banner file if it is not
/// already the first thing in it, committing and pushing immediately.
fn fix_banner_if_needed(
    client: &GitClient,
    repo: &RepoConfig,
    identity: &IdentityConfig,
) -> Result<(), SyncError> {
    let banner_path = client.workdir().join(BANNER_FILE);
    let existing = if banner_path.exists() {
        std::fs::read_to_string(&banner_path)?
    } else {
        String::new()
    };

    if existing.starts_with(BANNER) {
        debug!("banner file already in place");
        return Ok(());
    }

    info!(file = BANNER_FILE, "banner missing, prepending");
    std::fs::write(&banner_path, format!("{}{}", BANNER, existing))?;
    client.stage(Path::new(BANNER_FILE))?;
    client.commit("Update README.md", &identity.name, &identity.email)?;
    client
        .push(&repo.branch, repo.token.as_deref())
        .map_err(SyncError::PushFailed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn repo_config(url: String, local_path: PathBuf) -> RepoConfig {
        RepoConfig {
            url,
            token_env: "CONFSYNC_TEST_TOKEN".into(),
            local_path,
            branch: "main".into(),
            token: None,
        }
    }

    fn file_url(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    /// Bare remote whose HEAD points at `main`, matching the configured branch.
    fn init_bare_main(path: &Path) {
        let mut opts = git2::RepositoryInitOptions::new();
        opts.bare(true).initial_head("main");
        git2::Repository::init_opts(path, &opts).unwrap();
    }

    /// Clone `url`, commit the given files on `main`, and push.
    fn seed_remote(url: &str, workdir: &Path, files: &[(&str, &str)]) {
        let client = GitClient::clone_repo(url, workdir, None).unwrap();
        client.set_head_branch("main").unwrap();
        for (name, contents) in files {
            std::fs::write(workdir.join(name), contents).unwrap();
            client.stage(Path::new(name)).unwrap();
        }
        client.commit("seed", "Seeder", "seed@test.invalid").unwrap();
        client.push("main", None).unwrap();
    }

    #[test]
    fn test_ensure_bootstraps_empty_remote() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("remote.git");
        init_bare_main(&bare);
        let wc = dir.path().join("wc");

        let repo = repo_config(file_url(&bare), wc.clone());
        let identity = IdentityConfig::default();
        let client = ensure(&repo, &identity).unwrap();

        // Banner invariant.
        let banner = std::fs::read_to_string(wc.join(BANNER_FILE)).unwrap();
        assert!(banner.starts_with(BANNER));
        assert!(client.has_any_commit().unwrap());

        // Bootstrap commit landed on the remote with the right message and
        // only the banner file in its tree.
        let remote = git2::Repository::open_bare(&bare).unwrap();
        let commit = remote
            .find_reference("refs/heads/main")
            .unwrap()
            .peel_to_commit()
            .unwrap();
        assert_eq!(commit.message().unwrap(), "Initial commit");
        let tree = commit.tree().unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.get_name(BANNER_FILE).is_some());
    }

    #[test]
    fn test_ensure_opens_existing_working_copy() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("remote.git");
        init_bare_main(&bare);
        let wc = dir.path().join("wc");

        let repo = repo_config(file_url(&bare), wc.clone());
        let identity = IdentityConfig::default();
        ensure(&repo, &identity).unwrap();

        // Second call opens instead of cloning and changes nothing.
        let remote = git2::Repository::open_bare(&bare).unwrap();
        let before = remote
            .find_reference("refs/heads/main")
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .id();
        ensure(&repo, &identity).unwrap();
        let after = remote
            .find_reference("refs/heads/main")
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .id();
        assert_eq!(before, after);
    }

    #[test]
    fn test_ensure_prepends_banner_to_existing_readme() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("remote.git");
        init_bare_main(&bare);
        let url = file_url(&bare);
        seed_remote(&url, &dir.path().join("seed"), &[(BANNER_FILE, "Existing notes\n")]);

        let wc = dir.path().join("wc");
        let repo = repo_config(url, wc.clone());
        let identity = IdentityConfig::default();
        ensure(&repo, &identity).unwrap();

        let banner = std::fs::read_to_string(wc.join(BANNER_FILE)).unwrap();
        assert!(banner.starts_with(BANNER));
        assert!(banner.contains("Existing notes"));

        // Corrective commit pushed immediately.
        let remote = git2::Repository::open_bare(&bare).unwrap();
        let commit = remote
            .find_reference("refs/heads/main")
            .unwrap()
            .peel_to_commit()
            .unwrap();
        assert_eq!(commit.message().unwrap(), "Update README.md");
    }

    #[test]
    fn test_ensure_creates_banner_file_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("remote.git");
        init_bare_main(&bare);
        let url = file_url(&bare);
        seed_remote(&url, &dir.path().join("seed"), &[("other.txt", "data\n")]);

        let wc = dir.path().join("wc");
        let repo = repo_config(url, wc.clone());
        ensure(&repo, &IdentityConfig::default()).unwrap();

        let banner = std::fs::read_to_string(wc.join(BANNER_FILE)).unwrap();
        assert_eq!(banner, BANNER);
    }

    #[test]
    fn test_ensure_leaves_compliant_banner_alone() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("remote.git");
        init_bare_main(&bare);
        let url = file_url(&bare);
        let content = format!("{}Extra documentation below.\n", BANNER);
        seed_remote(&url, &dir.path().join("seed"), &[(BANNER_FILE, &content)]);

        let wc = dir.path().join("wc");
        let repo = repo_config(url, wc.clone());
        ensure(&repo, &IdentityConfig::default()).unwrap();

        let remote = git2::Repository::open_bare(&bare).unwrap();
        let commit = remote
            .find_reference("refs/heads/main")
            .unwrap()
            .peel_to_commit()
            .unwrap();
        // No corrective commit: still the seed commit.
        assert_eq!(commit.message().unwrap(), "seed");
        assert_eq!(std::fs::read_to_string(wc.join(BANNER_FILE)).unwrap(), content);
    }
}
