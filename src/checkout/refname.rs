use std::path::Path;

use git2::Repository;

use crate::auth::AuthOptions;
use crate::error::{Error, Result};
use crate::remote::get_remote_head;
use crate::revision::{extract_hash, transform};
use crate::types::{CloneConfig, Commit};

use super::{CheckoutOutcome, EngineOptions};

pub fn resolve(
    workdir: &Path,
    url: &str,
    ref_name: &str,
    auth: &AuthOptions,
    engine: EngineOptions,
    cfg: &CloneConfig,
) -> Result<CheckoutOutcome> {
    let scratch_path = workdir.join(".checkout-scratch");
    let scratch = Repository::init_bare(&scratch_path)?;
    let remote_head = get_remote_head(
        &scratch,
        url,
        ref_name,
        auth,
        engine.proxy.as_ref(),
        engine.fallback_to_default_known_hosts,
        engine.cancellation.as_ref(),
    )?;
    std::fs::remove_dir_all(&scratch_path).ok();

    if remote_head.is_empty() {
        tracing::warn!(ref_name, "reference did not resolve against remote");
        return Err(Error::unresolvable_ref(ref_name));
    }

    if !cfg.last_observed_commit.is_empty() && transform(&remote_head) == transform(&cfg.last_observed_commit) {
        return Ok(CheckoutOutcome::UpToDate(Commit {
            hash: extract_hash(&remote_head),
            reference: ref_name.to_string(),
            ..Default::default()
        }));
    }

    let hash = extract_hash(&remote_head);
    super::commit::resolve(workdir, url, hash.as_str(), None, Some(ref_name), auth, engine, cfg)
}
