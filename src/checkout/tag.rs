use std::path::Path;

use git2::build::RepoBuilder;
use git2::{AutotagOption, FetchOptions};

use crate::auth::AuthOptions;
use crate::error::{Error, Result};
use crate::transport::{git2_proxy_options, transport_auth_cancellable};
use crate::types::CloneConfig;

use super::commit::{build_commit_record, lookup_tag_object};
use super::{guard, CheckoutOutcome, EngineOptions};

pub fn resolve(
    workdir: &Path,
    url: &str,
    tag: &str,
    auth: &AuthOptions,
    engine: EngineOptions,
    cfg: &CloneConfig,
) -> Result<CheckoutOutcome> {
    crate::paths::validate_ref_name(tag)?;
    let reference = format!("refs/tags/{tag}");

    let transport = transport_auth_cancellable(
        auth,
        engine.proxy.as_ref(),
        engine.fallback_to_default_known_hosts,
        engine.cancellation.as_ref(),
    )?;
    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(transport.callbacks);
    fetch_options.download_tags(AutotagOption::Auto);
    if let Some(p) = &transport.proxy {
        fetch_options.proxy_options(git2_proxy_options(p));
    }
    if cfg.shallow_clone {
        fetch_options.depth(1);
    }

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options);

    let repo = builder
        .clone(url, workdir)
        .map_err(|e| Error::git_msg(e.to_string()))?;

    let tag_ref = repo.find_reference(&reference)?;
    let oid = tag_ref
        .peel_to_commit()
        .map(|c| c.id())
        .or_else(|_| tag_ref.target().ok_or_else(|| git2::Error::from_str("tag has no target")))?;

    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.force();
    let target = repo.find_commit(oid)?;
    repo.checkout_tree(target.as_object(), Some(&mut checkout))?;
    repo.set_head_detached(oid)?;

    let referencing_tag = lookup_tag_object(&repo, &reference)?;

    guard::ensure_clean(&repo)?;
    let record = build_commit_record(&repo, oid, &reference, referencing_tag)?;
    Ok(CheckoutOutcome::Checked(repo, record))
}
