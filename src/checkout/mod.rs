//! The checkout engine: resolves a [`CheckoutStrategy`] against a remote,
//! short-circuiting on a matching `last_observed_commit`, and produces a
//! verifiable [`Commit`].
//!
//! Grounded on the teacher's `store.rs::init_branch` for the overall
//! "resolve ref, build/checkout commit, update symbolic HEAD" sequencing,
//! generalized per strategy; remote-listing and refspec construction are
//! grounded on `mirror.rs`'s `get_remote_refs`/`resolve_ref_names`.

pub mod branch;
pub mod commit;
pub mod guard;
pub mod refname;
pub mod semver;
pub mod tag;

use std::path::{Path, PathBuf};

use git2::Repository;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthOptions;
use crate::error::{Error, Result};
use crate::types::{CheckoutStrategy, CloneConfig, Commit, ProxyOptions};

/// Runtime policy that doesn't belong in `CloneConfig` (it's set once per
/// client, not per clone call).
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub single_branch: bool,
    pub credentials_over_http: bool,
    pub fallback_to_default_known_hosts: bool,
    pub proxy: Option<ProxyOptions>,
    /// Checked on every transfer-progress tick of every network operation
    /// this engine performs; `None` means the caller supplied no token and
    /// the operation runs to completion uninterruptible.
    pub cancellation: Option<CancellationToken>,
    /// Low-level storer injection (`ClientOptions::with_storer`): when set,
    /// a local-init recovery (empty-upstream branch clone) roots the
    /// repository's metadata here instead of under `workdir/.git`.
    pub git_dir: Option<PathBuf>,
}

pub enum CheckoutOutcome {
    /// The remote's HEAD for the requested ref matched `last_observed_commit`;
    /// no clone was performed.
    UpToDate(Commit),
    /// The remote repository was empty; a local repository was initialized
    /// against the same URL/branch instead of cloning.
    EmptyUpstreamInitialized,
    /// A concrete checkout was performed.
    Checked(Repository, Commit),
}

/// Recursively initializes and updates every submodule in `repo`, using the
/// same credentials/proxy as the parent clone. Called after a branch clone
/// when `CloneConfig::recurse_submodules` is set.
pub(crate) fn update_submodules_recursive(
    repo: &git2::Repository,
    auth: &AuthOptions,
    proxy: Option<&ProxyOptions>,
    fallback_to_default_known_hosts: bool,
    cancellation: Option<&CancellationToken>,
) -> Result<()> {
    for mut submodule in repo.submodules()? {
        if cancellation.is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::git_msg("submodule update cancelled"));
        }
        submodule.init(true)?;
        let transport =
            crate::transport::transport_auth_cancellable(auth, proxy, fallback_to_default_known_hosts, cancellation)?;
        let mut fetch_options = git2::FetchOptions::new();
        fetch_options.remote_callbacks(transport.callbacks);
        if let Some(p) = &transport.proxy {
            fetch_options.proxy_options(crate::transport::git2_proxy_options(p));
        }
        let mut update_options = git2::SubmoduleUpdateOptions::new();
        update_options.fetch(fetch_options);
        submodule.update(true, Some(&mut update_options))?;

        if let Ok(sub_repo) = submodule.open() {
            update_submodules_recursive(&sub_repo, auth, proxy, fallback_to_default_known_hosts, cancellation)?;
        }
    }
    Ok(())
}

/// Entry point used by [`crate::client::RepositoryClient::clone`]. Validates
/// the URL, then dispatches on `cfg.checkout_strategy`.
pub fn resolve(
    workdir: &Path,
    url: &str,
    auth: &AuthOptions,
    engine: EngineOptions,
    cfg: &CloneConfig,
) -> Result<CheckoutOutcome> {
    guard::validate_url(url, auth, engine.credentials_over_http)?;

    match cfg.checkout_strategy.as_ref() {
        Some(CheckoutStrategy::Branch(name)) => branch::resolve(workdir, url, name, auth, engine, cfg),
        Some(CheckoutStrategy::Tag(name)) => tag::resolve(workdir, url, name, auth, engine, cfg),
        Some(CheckoutStrategy::Commit { hash, branch }) => {
            commit::resolve(workdir, url, hash, branch.as_deref(), None, auth, engine, cfg)
        }
        Some(CheckoutStrategy::SemVer(constraint)) => semver::resolve(workdir, url, constraint, auth, engine, cfg),
        Some(CheckoutStrategy::RefName(name)) => refname::resolve(workdir, url, name, auth, engine, cfg),
        None => Err(crate::error::Error::auth_option_invalid("no checkout strategy set")),
    }
}
