//! The `RepositoryClient`: a working directory bound to one auth
//! configuration and one ambient repository handle. Cheap to `Clone`
//! (`Arc` internally), mirroring the teacher's `GitStore`/`GitStoreInner`
//! split in `store.rs`, generalized from a bare object store to a client
//! managing a real on-disk (or in-memory) worktree.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use git2::Repository;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthOptions;
use crate::checkout::{self, EngineOptions};
use crate::confined_fs::{ConfinedFs, DiskConfinedFs, MemoryConfinedFs};
use crate::error::{Error, Result};
use crate::registry;
use crate::types::{CloneConfig, Commit, CommitOptions, ProxyOptions, PushConfig, Signature, TransportOptions};

/// Result of [`RepositoryClient::commit`]: distinguishes a real new commit
/// from a no-op where nothing was staged and HEAD is returned unchanged.
#[derive(Debug, Clone)]
pub enum CommitOutcome {
    Committed(String),
    Unchanged(String),
}

impl CommitOutcome {
    pub fn hash(&self) -> &str {
        match self {
            Self::Committed(h) | Self::Unchanged(h) => h,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    Disk,
    Memory,
}

/// Builder-style configuration for [`RepositoryClient::new`], matching the
/// spec's `With*` option table.
#[derive(Clone)]
pub struct ClientOptions {
    storage: Storage,
    single_branch: bool,
    credentials_over_http: bool,
    fallback_to_default_known_hosts: bool,
    proxy: Option<ProxyOptions>,
    /// `WithStorer`: roots the repository's object database/metadata at a
    /// location separate from the working directory, instead of the default
    /// `workdir/.git`.
    git_dir: Option<PathBuf>,
    /// `WithWorkTreeFS`: overrides the auto-selected disk/memory confined
    /// filesystem with a caller-supplied one.
    work_tree_fs: Option<Arc<dyn ConfinedFs>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            storage: Storage::Disk,
            single_branch: true,
            credentials_over_http: false,
            fallback_to_default_known_hosts: false,
            proxy: None,
            git_dir: None,
            work_tree_fs: None,
        }
    }
}

impl ClientOptions {
    pub fn with_disk_storage(mut self) -> Self {
        self.storage = Storage::Disk;
        self
    }

    pub fn with_memory_storage(mut self) -> Self {
        self.storage = Storage::Memory;
        self
    }

    pub fn with_single_branch(mut self, value: bool) -> Self {
        self.single_branch = value;
        self
    }

    pub fn with_insecure_credentials_over_http(mut self) -> Self {
        self.credentials_over_http = true;
        self
    }

    pub fn with_fallback_to_default_known_hosts(mut self) -> Self {
        self.fallback_to_default_known_hosts = true;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyOptions) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Low-level injection of the object store: roots the repository's
    /// metadata/object database at `git_dir` rather than under
    /// `workdir/.git`, mirroring `git init --separate-git-dir`. Only takes
    /// effect on a fresh `init()` (and the branch strategy's empty-upstream
    /// recovery, which is also a local init); an existing `workdir/.git`
    /// gitlink file is still followed transparently by `git2::Repository::open`.
    pub fn with_storer(mut self, git_dir: impl Into<PathBuf>) -> Self {
        self.git_dir = Some(git_dir.into());
        self
    }

    /// Low-level injection of the worktree filesystem: overrides the
    /// auto-selected [`DiskConfinedFs`]/[`MemoryConfinedFs`] with a
    /// caller-supplied [`ConfinedFs`] implementation (a fault-injecting test
    /// double, for instance). Takes precedence over `with_disk_storage`/
    /// `with_memory_storage`.
    pub fn with_work_tree_fs(mut self, fs: Arc<dyn ConfinedFs>) -> Self {
        self.work_tree_fs = Some(fs);
        self
    }
}

struct RepositoryClientInner {
    repo: Mutex<Option<Repository>>,
    workdir: PathBuf,
    auth: AuthOptions,
    options: ClientOptions,
    fs: Arc<dyn ConfinedFs>,
    transport_key: String,
    signature: Signature,
}

/// A Git repository client bound to one working directory. Not safe for
/// concurrent use across its own methods; a program may hold many clients,
/// one per workdir, concurrently.
#[derive(Clone)]
pub struct RepositoryClient {
    inner: Arc<RepositoryClientInner>,
}

impl RepositoryClient {
    pub fn new(workdir: impl Into<PathBuf>, auth: AuthOptions, options: ClientOptions) -> Result<Self> {
        let workdir = workdir.into();
        let fs: Arc<dyn ConfinedFs> = if let Some(custom) = options.work_tree_fs.clone() {
            custom
        } else {
            match options.storage {
                Storage::Disk => {
                    std::fs::create_dir_all(&workdir).map_err(|e| Error::io(&workdir, e))?;
                    Arc::new(DiskConfinedFs::new(workdir.clone()))
                }
                Storage::Memory => Arc::new(MemoryConfinedFs::new(workdir.clone())),
            }
        };

        let transport_key = format!("gitclient-transport-{}", workdir.display());
        registry::register(
            transport_key.clone(),
            TransportOptions {
                target_url: String::new(),
                auth_opts: auth.clone(),
                proxy_options: options.proxy.clone(),
                context: workdir.display().to_string(),
            },
        )?;

        let repo = if workdir.join(".git").exists() {
            Some(Repository::open(&workdir)?)
        } else {
            None
        };

        Ok(Self {
            inner: Arc::new(RepositoryClientInner {
                repo: Mutex::new(repo),
                workdir,
                auth,
                options,
                fs,
                transport_key,
                signature: Signature::new("gitclient", "gitclient@localhost", chrono::Utc::now().into()),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.workdir
    }

    fn engine_options(&self, cancellation: Option<&CancellationToken>) -> EngineOptions {
        EngineOptions {
            single_branch: self.inner.options.single_branch,
            credentials_over_http: self.inner.options.credentials_over_http,
            fallback_to_default_known_hosts: self.inner.options.fallback_to_default_known_hosts,
            proxy: self.inner.options.proxy.clone(),
            cancellation: cancellation.cloned(),
            git_dir: self.inner.options.git_dir.clone(),
        }
    }

    /// Initializes an empty repository, points `origin` at `url`, and sets
    /// symbolic HEAD to `refs/heads/<branch>`. A no-op if a repository is
    /// already open.
    pub fn init(&self, url: &str, branch: &str) -> Result<()> {
        tracing::debug!(url, branch, "initializing repository");
        crate::checkout::guard::validate_url(url, &self.inner.auth, self.inner.options.credentials_over_http)?;
        let mut guard = self.inner.repo.lock().map_err(|e| Error::git_msg(e.to_string()))?;
        if guard.is_some() {
            tracing::debug!("init is a no-op, repository already open");
            return Ok(());
        }
        let repo = crate::checkout::commit::init_local(
            &self.inner.workdir,
            self.inner.options.git_dir.as_deref(),
            url,
            branch,
        )?;
        *guard = Some(repo);
        tracing::info!(url, branch, "repository initialized");
        Ok(())
    }

    /// Clones (or short-circuits, or locally initializes on an empty
    /// upstream) per `cfg.checkout_strategy`. Returns `None` exactly when
    /// the remote was empty and a local repository was initialized instead.
    pub fn clone(&self, url: &str, cfg: &CloneConfig) -> Result<Option<Commit>> {
        self.clone_cancellable(url, cfg, None)
    }

    /// As [`Self::clone`], aborting the in-flight network transfer as soon
    /// as `cancellation` is cancelled. A cancelled clone may leave a
    /// partially written working directory; the caller is responsible for
    /// removing it before retrying.
    pub fn clone_cancellable(
        &self,
        url: &str,
        cfg: &CloneConfig,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Option<Commit>> {
        tracing::debug!(url, "resolving checkout strategy");
        let auth = crate::provider::resolve_auth_blocking(&self.inner.auth)?;
        let outcome = checkout::resolve(&self.inner.workdir, url, &auth, self.engine_options(cancellation), cfg)?;
        match outcome {
            checkout::CheckoutOutcome::UpToDate(commit) => {
                tracing::debug!(hash = %commit.hash, "remote unchanged since last observation");
                Ok(Some(commit))
            }
            checkout::CheckoutOutcome::EmptyUpstreamInitialized => {
                tracing::info!(url, "remote repository empty, initialized locally");
                let repo = Repository::open(&self.inner.workdir)?;
                *self.inner.repo.lock().map_err(|e| Error::git_msg(e.to_string()))? = Some(repo);
                Ok(None)
            }
            checkout::CheckoutOutcome::Checked(repo, commit) => {
                tracing::info!(hash = %commit.hash, "checkout complete");
                *self.inner.repo.lock().map_err(|e| Error::git_msg(e.to_string()))? = Some(repo);
                Ok(Some(commit))
            }
        }
    }

    /// Writes `opts.files` through the confined worktree filesystem, stages
    /// the result, and commits. Returns [`CommitOutcome::Unchanged`] with the
    /// current HEAD hash when nothing changed and HEAD already exists.
    pub fn commit(&self, message: &str, opts: &CommitOptions) -> Result<CommitOutcome> {
        tracing::debug!(files = opts.files.len(), "staging files for commit");
        for (path, bytes) in &opts.files {
            self.inner.fs.create(Path::new(path), bytes)?;
        }

        let gitdir = self.inner.workdir.join(".git");
        crate::lock::with_repo_lock(&gitdir, || {
            let guard = self.inner.repo.lock().map_err(|e| Error::git_msg(e.to_string()))?;
            let repo = guard.as_ref().ok_or(Error::NoGitRepository)?;

            let mut index = repo.index()?;
            index.add_all(opts.files.keys(), git2::IndexAddOption::DEFAULT, None)?;
            index.write()?;

            let head = repo.head().ok();
            if index.is_empty() || (opts.files.is_empty() && statuses_are_clean(repo)?) {
                if let Some(head) = head {
                    if let Some(oid) = head.target() {
                        tracing::debug!(hash = %oid, "nothing staged, commit is a no-op");
                        return Ok(CommitOutcome::Unchanged(oid.to_string()));
                    }
                }
                tracing::warn!("nothing staged and no existing HEAD to fall back to");
                return Err(Error::NoStagedFiles);
            }

            let tree_oid = index.write_tree()?;
            let tree = repo.find_tree(tree_oid)?;
            let signature = git2::Signature::now(&self.inner.signature.name, &self.inner.signature.email)?;

            let parents: Vec<git2::Commit<'_>> = match repo.head().and_then(|h| h.peel_to_commit()) {
                Ok(parent) => vec![parent],
                Err(_) => vec![],
            };
            let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

            let oid = match &opts.signer {
                None => repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)?,
                Some(signer) => {
                    let head_ref_name = repo
                        .find_reference("HEAD")
                        .ok()
                        .and_then(|r| r.symbolic_target().map(str::to_string));

                    let buf = repo.commit_create_buffer(&signature, &signature, message, &tree, &parent_refs)?;
                    let commit_content = std::str::from_utf8(&buf)
                        .map_err(|e| Error::git_msg(format!("commit buffer is not utf-8: {e}")))?;
                    let armored = crate::signature::sign_detached(signer, &opts.signer_passphrase, commit_content.as_bytes())?;
                    let oid = repo.commit_signed(commit_content, &armored, Some("gpgsig"))?;

                    match head_ref_name {
                        Some(ref_name) => {
                            repo.reference(&ref_name, oid, true, message)?;
                        }
                        None => {
                            repo.set_head_detached(oid)?;
                        }
                    }
                    oid
                }
            };
            tracing::info!(hash = %oid, "commit complete");
            Ok(CommitOutcome::Committed(oid.to_string()))
        })
    }

    /// Pushes `cfg.refspecs`, or, when empty, exactly the refspec mapping
    /// the current HEAD to itself.
    pub fn push(&self, url: &str, cfg: &PushConfig) -> Result<()> {
        self.push_cancellable(url, cfg, None)
    }

    /// As [`Self::push`], aborting the in-flight push as soon as
    /// `cancellation` is cancelled.
    pub fn push_cancellable(&self, url: &str, cfg: &PushConfig, cancellation: Option<&CancellationToken>) -> Result<()> {
        tracing::debug!(url, "pushing");
        let auth = crate::provider::resolve_auth_blocking(&self.inner.auth)?;
        let guard = self.inner.repo.lock().map_err(|e| Error::git_msg(e.to_string()))?;
        let repo = guard.as_ref().ok_or(Error::NoGitRepository)?;
        let head_ref = repo.head()?.name().unwrap_or("HEAD").to_string();
        let result = crate::remote::push(
            repo,
            url,
            &head_ref,
            &auth,
            self.inner.options.proxy.as_ref(),
            self.inner.options.fallback_to_default_known_hosts,
            cancellation,
            cfg,
        );
        match &result {
            Ok(()) => tracing::info!(url, "push complete"),
            Err(e) => tracing::warn!(url, error = %e, "push failed"),
        }
        result
    }

    /// Switches to `branch_name` without fetching (the server-compatible,
    /// non-fetching variant per the spec's open question). Local state takes
    /// precedence when both a local and a remote-tracking ref exist.
    pub fn switch_branch(&self, branch_name: &str) -> Result<()> {
        tracing::debug!(branch_name, "switching branch");
        let guard = self.inner.repo.lock().map_err(|e| Error::git_msg(e.to_string()))?;
        let repo = guard.as_ref().ok_or(Error::NoGitRepository)?;

        let local_ref = format!("refs/heads/{branch_name}");
        let remote_ref = format!("refs/remotes/origin/{branch_name}");

        let local_exists = repo.find_reference(&local_ref).is_ok();
        let remote_target = repo.find_reference(&remote_ref).ok().and_then(|r| r.target());

        if !local_exists {
            match remote_target {
                Some(oid) => {
                    tracing::debug!(branch_name, "no local ref, creating from remote-tracking ref");
                    repo.reference(&local_ref, oid, false, "create local branch from remote-tracking ref")?;
                }
                None => {
                    tracing::warn!(branch_name, "no local or remote-tracking ref, branching from HEAD");
                    let head_oid = repo.head()?.target().ok_or_else(|| Error::git_msg("HEAD has no target"))?;
                    repo.reference(&local_ref, head_oid, false, "create local branch from HEAD")?;
                }
            }
        }

        let commit = repo.find_reference(&local_ref)?.peel_to_commit()?;
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
        repo.set_head(&local_ref)?;
        tracing::info!(branch_name, "switch-branch complete");
        Ok(())
    }

    pub fn head(&self) -> Result<String> {
        let guard = self.inner.repo.lock().map_err(|e| Error::git_msg(e.to_string()))?;
        let repo = guard.as_ref().ok_or(Error::NoGitRepository)?;
        let oid = repo.head()?.target().ok_or_else(|| Error::git_msg("HEAD has no target"))?;
        Ok(oid.to_string())
    }

    pub fn is_clean(&self) -> Result<bool> {
        let guard = self.inner.repo.lock().map_err(|e| Error::git_msg(e.to_string()))?;
        let repo = guard.as_ref().ok_or(Error::NoGitRepository)?;
        Ok(statuses_are_clean(repo)?)
    }

    /// Releases the repository handle and unregisters this client's
    /// transport-options entry. Also performed on `Drop`, so an explicit
    /// `close()` is only needed when the caller wants the registry entry
    /// gone immediately rather than whenever the last `Arc` reference drops.
    pub fn close(&self) -> Result<()> {
        *self.inner.repo.lock().map_err(|e| Error::git_msg(e.to_string()))? = None;
        registry::unregister(&self.inner.transport_key)
    }
}

impl Drop for RepositoryClientInner {
    fn drop(&mut self) {
        // `drop` has no `Result` to propagate into; a poisoned-registry-lock
        // error here is logged rather than dropped silently.
        if let Err(e) = registry::unregister(&self.transport_key) {
            tracing::warn!(error = %e, "failed to unregister transport options on drop");
        }
    }
}

fn statuses_are_clean(repo: &Repository) -> Result<bool> {
    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true);
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_with_memory_storage_has_no_open_repo_yet() {
        let dir = tempfile::tempdir().unwrap();
        let client = RepositoryClient::new(
            dir.path().join("repo"),
            AuthOptions::default(),
            ClientOptions::default().with_memory_storage(),
        )
        .unwrap();
        assert!(client.head().is_err());
    }

    #[test]
    fn init_then_commit_then_head_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let client = RepositoryClient::new(dir.path().join("repo"), AuthOptions::default(), ClientOptions::default()).unwrap();
        client.init("https://example.com/placeholder.git", "main").unwrap();

        let mut files = std::collections::BTreeMap::new();
        files.insert("hello.txt".to_string(), b"hi".to_vec());
        let outcome = client
            .commit("initial commit", &CommitOptions { files, ..Default::default() })
            .unwrap();
        assert!(matches!(outcome, CommitOutcome::Committed(_)));
        assert_eq!(client.head().unwrap(), outcome.hash());
    }

    #[test]
    fn commit_with_nothing_staged_returns_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let client = RepositoryClient::new(dir.path().join("repo"), AuthOptions::default(), ClientOptions::default()).unwrap();
        client.init("https://example.com/placeholder.git", "main").unwrap();

        let mut files = std::collections::BTreeMap::new();
        files.insert("hello.txt".to_string(), b"hi".to_vec());
        let first = client.commit("initial", &CommitOptions { files, ..Default::default() }).unwrap();

        let second = client.commit("no-op", &CommitOptions::default()).unwrap();
        assert!(matches!(second, CommitOutcome::Unchanged(_)));
        assert_eq!(first.hash(), second.hash());
    }
}
