use std::path::Path;

use git2::build::RepoBuilder;
use git2::{AutotagOption, FetchOptions, Repository};

use crate::auth::AuthOptions;
use crate::error::{Error, Result};
use crate::remote::get_remote_head;
use crate::revision::transform;
use crate::transport::{git2_proxy_options, transport_auth_cancellable};
use crate::types::{Commit, CloneConfig};

use super::{guard, CheckoutOutcome, EngineOptions};

pub fn resolve(
    workdir: &Path,
    url: &str,
    branch: &str,
    auth: &AuthOptions,
    engine: EngineOptions,
    cfg: &CloneConfig,
) -> Result<CheckoutOutcome> {
    crate::paths::validate_ref_name(branch)?;
    let reference = format!("refs/heads/{branch}");

    if !cfg.last_observed_commit.is_empty() {
        // A temporary scratch repo is enough to list remote refs; no worktree
        // is materialized unless the comparison actually requires a clone.
        let scratch = Repository::init_bare(workdir.join(".checkout-scratch"))?;
        let remote_head = get_remote_head(
            &scratch,
            url,
            &reference,
            auth,
            engine.proxy.as_ref(),
            engine.fallback_to_default_known_hosts,
            engine.cancellation.as_ref(),
        )?;
        std::fs::remove_dir_all(workdir.join(".checkout-scratch")).ok();
        if !remote_head.is_empty() && transform(&remote_head) == transform(&cfg.last_observed_commit) {
            return Ok(CheckoutOutcome::UpToDate(Commit {
                hash: crate::revision::extract_hash(&remote_head),
                reference: reference.clone(),
                ..Default::default()
            }));
        }
    }

    let transport = transport_auth_cancellable(
        auth,
        engine.proxy.as_ref(),
        engine.fallback_to_default_known_hosts,
        engine.cancellation.as_ref(),
    )?;
    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(transport.callbacks);
    fetch_options.download_tags(AutotagOption::None);
    if let Some(p) = &transport.proxy {
        fetch_options.proxy_options(git2_proxy_options(p));
    }
    if cfg.shallow_clone {
        fetch_options.depth(1);
    }

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options);
    builder.branch(branch);
    if engine.single_branch {
        let branch_owned = branch.to_string();
        builder.remote_create(move |repo, name, url| {
            let refspec = format!("+refs/heads/{branch_owned}:refs/remotes/{name}/{branch_owned}");
            repo.remote_with_fetch(name, url, &refspec)
        });
    }

    match builder.clone(url, workdir) {
        Ok(repo) => {
            if cfg.recurse_submodules {
                super::update_submodules_recursive(
                    &repo,
                    auth,
                    engine.proxy.as_ref(),
                    engine.fallback_to_default_known_hosts,
                    engine.cancellation.as_ref(),
                )?;
            }
            guard::ensure_clean(&repo)?;
            let head = repo.head()?;
            let oid = head.target().ok_or_else(|| Error::git_msg("HEAD has no target"))?;
            let commit = crate::checkout::commit::build_commit_record(&repo, oid, &reference, None)?;
            Ok(CheckoutOutcome::Checked(repo, commit))
        }
        Err(e) if is_repository_not_found(&e) => {
            tracing::warn!(url, error = %e, "repository not found");
            Err(Error::repository_not_found(e.message().to_string(), url.to_string()))
        }
        Err(e) if is_empty_remote(&e) => {
            tracing::warn!(url, branch, "remote is empty, initializing locally instead");
            std::fs::remove_dir_all(workdir).ok();
            std::fs::create_dir_all(workdir).map_err(|io| Error::io(workdir, io))?;
            crate::checkout::commit::init_local(workdir, engine.git_dir.as_deref(), url, branch)?;
            Ok(CheckoutOutcome::EmptyUpstreamInitialized)
        }
        Err(e) => Err(Error::git_msg(e.to_string())),
    }
}

fn is_repository_not_found(e: &git2::Error) -> bool {
    e.code() == git2::ErrorCode::NotFound && e.class() == git2::ErrorClass::Repository
        || e.message().contains("couldn't find remote ref")
}

fn is_empty_remote(e: &git2::Error) -> bool {
    e.message().to_lowercase().contains("empty") || e.message().to_lowercase().contains("unborn")
}
