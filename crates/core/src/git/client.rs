//! Local Git repository operations via `git2`.

use std::path::{Path, PathBuf};

use git2::{
    Cred, DiffFormat, ErrorCode, FetchOptions, Oid, PushOptions, RemoteCallbacks, Repository,
    Signature,
};
use tracing::{debug, info, instrument, warn};

use crate::errors::GitError;

/// High-level Git client wrapping a `git2::Repository`.
///
/// One instance is the run's repository handle: it owns the working copy,
/// its staged index, and the transport operations against `origin`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

impl GitClient {
    /// Open an existing Git repository at `repo_path`.
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    /// Clone a remote repository to `path`.
    ///
    /// Cloning an empty remote is allowed and produces a working copy with
    /// an unborn HEAD.
    #[instrument(skip(token), fields(url = %url, path = %path.display()))]
    pub fn clone_repo(url: &str, path: &Path, token: Option<&str>) -> Result<Self, GitError> {
        info!("cloning git repository");
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(credential_callbacks(token));
        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch_opts);
        let repo = builder.clone(url, path)?;
        info!("clone completed");
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Filesystem root of the working copy (mirror destination base).
    pub fn workdir(&self) -> &Path {
        // Never bare: we only clone/open working copies.
        self.repo.workdir().unwrap_or(&self.repo_path)
    }

    /// Write the commit identity into the repository config.
    ///
    /// Called on every run, not just at clone time, so a working copy that
    /// was created by hand picks up the configured identity too.
    pub fn set_identity(&self, name: &str, email: &str) -> Result<(), GitError> {
        let mut config = self.repo.config()?;
        config.set_str("user.name", name)?;
        config.set_str("user.email", email)?;
        debug!(name, email, "commit identity configured");
        Ok(())
    }

    /// Fetch from a named remote.
    #[instrument(skip(self, token))]
    pub fn fetch(&self, remote_name: &str, token: Option<&str>) -> Result<(), GitError> {
        info!(remote = remote_name, "fetching");
        let mut remote = self.repo.find_remote(remote_name)?;
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(credential_callbacks(token));
        remote.fetch(&[] as &[&str], Some(&mut fetch_opts), None)?;
        debug!("fetch completed");
        Ok(())
    }

    /// Fetch and fast-forward merge `origin/<branch>` into the local branch.
    ///
    /// A missing remote-tracking ref (freshly bootstrapped empty remote) is
    /// treated as up to date. Diverged histories are an error: this tool is
    /// the only expected writer, so a non-fast-forward pull means something
    /// else touched the remote and the run must not mirror on top of it.
    #[instrument(skip(self, token))]
    pub fn pull(&self, branch: &str, token: Option<&str>) -> Result<(), GitError> {
        self.fetch("origin", token)?;

        let remote_ref = format!("refs/remotes/origin/{}", branch);
        let fetch_commit = match self.repo.find_reference(&remote_ref) {
            Ok(reference) => reference.peel_to_commit()?,
            Err(_) => {
                debug!(branch, "no remote-tracking ref, nothing to merge");
                return Ok(());
            }
        };

        let annotated = self.repo.find_annotated_commit(fetch_commit.id())?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            debug!("already up to date");
            return Ok(());
        }
        if !analysis.is_fast_forward() && !analysis.is_unborn() {
            return Err(GitError::NonFastForward(branch.to_string()));
        }

        let refname = format!("refs/heads/{}", branch);
        if analysis.is_unborn() {
            self.repo
                .reference(&refname, fetch_commit.id(), true, "confsync: initial pull")?;
        } else {
            let mut reference = self.repo.find_reference(&refname)?;
            reference.set_target(fetch_commit.id(), "confsync: fast-forward pull")?;
        }
        self.repo.set_head(&refname)?;
        self.repo
            .checkout_head(Some(git2::build::CheckoutBuilder::new().force()))?;
        info!("pull completed");
        Ok(())
    }

    /// Stage a single path (relative to the working copy root).
    pub fn stage(&self, relative_path: &Path) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        index.add_path(relative_path)?;
        index.write()?;
        debug!(path = %relative_path.display(), "staged");
        Ok(())
    }

    /// Textual patch of the staged index against the last commit.
    ///
    /// An unborn HEAD diffs against the empty tree, so everything staged
    /// shows up as an addition. An empty string means nothing changed.
    pub fn diff_staged(&self) -> Result<String, GitError> {
        let head_tree = match self.repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                None
            }
            Err(e) => return Err(e.into()),
        };

        let index = self.repo.index()?;
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), Some(&index), None)?;

        let mut text = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            match line.origin() {
                '+' | '-' | ' ' => text.push(line.origin()),
                _ => {}
            }
            text.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(text)
    }

    /// Commit the current index to HEAD.
    ///
    /// Staging is explicit via [`stage`](Self::stage); nothing is added
    /// implicitly here.
    #[instrument(skip(self, message))]
    pub fn commit(&self, message: &str, name: &str, email: &str) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;
        let signature = Signature::now(name, email)?;
        let parent_commit = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit> = parent_commit.iter().collect();
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        info!(sha = %oid, "created commit");
        Ok(oid)
    }

    /// Commit only if the staged diff is non-empty. Returns `None` when
    /// there is nothing to commit.
    pub fn commit_if_staged(
        &self,
        message: &str,
        name: &str,
        email: &str,
    ) -> Result<Option<Oid>, GitError> {
        if self.diff_staged()?.is_empty() {
            debug!("staged diff is empty, skipping commit");
            return Ok(None);
        }
        self.commit(message, name, email).map(Some)
    }

    /// Push the local branch to `origin`.
    #[instrument(skip(self, token))]
    pub fn push(&self, branch: &str, token: Option<&str>) -> Result<(), GitError> {
        info!(branch, "pushing");
        let mut remote = self.repo.find_remote("origin")?;
        let mut callbacks = credential_callbacks(token);

        let push_error = std::sync::Arc::new(std::sync::Mutex::new(None::<String>));
        let push_error_clone = push_error.clone();
        callbacks.push_update_reference(move |refname, status| {
            if let Some(msg) = status {
                warn!(refname, msg, "push rejected");
                *push_error_clone.lock().unwrap() = Some(msg.to_string());
            }
            Ok(())
        });

        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(callbacks);
        let refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);
        remote.push(&[&refspec], Some(&mut push_opts))?;

        if let Some(err_msg) = push_error.lock().unwrap().take() {
            return Err(GitError::PushRejected {
                branch: branch.to_string(),
                detail: err_msg,
            });
        }
        info!("push completed");
        Ok(())
    }

    /// Whether the repository has at least one commit on HEAD.
    pub fn has_any_commit(&self) -> Result<bool, GitError> {
        match self.repo.head() {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Point HEAD at `refs/heads/<branch>`.
    ///
    /// On a freshly cloned empty remote the unborn branch name depends on
    /// the host's defaults; this pins it before the bootstrap commit.
    pub fn set_head_branch(&self, branch: &str) -> Result<(), GitError> {
        self.repo.set_head(&format!("refs/heads/{}", branch))?;
        Ok(())
    }

    /// Whether local HEAD is strictly ahead of `origin/<branch>`.
    ///
    /// True means a previous run committed but never pushed (push failure or
    /// crash between commit and push).
    pub fn is_ahead_of_remote(&self, branch: &str) -> Result<bool, GitError> {
        let local = match self.repo.head() {
            Ok(head) => head.peel_to_commit()?.id(),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let remote_ref = format!("refs/remotes/origin/{}", branch);
        let remote = match self.repo.find_reference(&remote_ref) {
            Ok(reference) => reference.peel_to_commit()?.id(),
            // Local commits exist but the remote-tracking ref does not:
            // everything local is unpushed.
            Err(_) => return Ok(true),
        };

        if local == remote {
            return Ok(false);
        }
        Ok(self.repo.graph_descendant_of(local, remote)?)
    }
}

/// Remote callbacks carrying token credentials, shared by clone/fetch/push.
fn credential_callbacks(token: Option<&str>) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(tok) = token {
        let tok = tok.to_string();
        callbacks.credentials(move |_url, _username, _allowed| {
            Cred::userpass_plaintext("x-access-token", &tok)
        });
    }
    callbacks
}
