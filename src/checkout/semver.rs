use std::cmp::Ordering;
use std::path::Path;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{AutotagOption, FetchOptions, Repository};
use semver::{Version, VersionReq};

use crate::auth::AuthOptions;
use crate::error::{Error, Result};
use crate::transport::{git2_proxy_options, transport_auth_cancellable};
use crate::types::CloneConfig;

use super::commit::{build_commit_record, lookup_tag_object};
use super::{guard, CheckoutOutcome, EngineOptions};

struct Candidate {
    tag_name: String,
    reference: String,
    version: Version,
    commit_time: i64,
}

pub fn resolve(
    workdir: &Path,
    url: &str,
    constraint: &str,
    auth: &AuthOptions,
    engine: EngineOptions,
    cfg: &CloneConfig,
) -> Result<CheckoutOutcome> {
    let req = VersionReq::parse(constraint).map_err(|e| Error::auth_option_invalid(e.to_string()))?;

    let transport = transport_auth_cancellable(
        auth,
        engine.proxy.as_ref(),
        engine.fallback_to_default_known_hosts,
        engine.cancellation.as_ref(),
    )?;
    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(transport.callbacks);
    fetch_options.download_tags(AutotagOption::All);
    if let Some(p) = &transport.proxy {
        fetch_options.proxy_options(git2_proxy_options(p));
    }

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options);
    let repo = builder
        .clone(url, workdir)
        .map_err(|e| Error::git_msg(e.to_string()))?;

    let best = select_best_tag(&repo, &req)?
        .ok_or_else(|| Error::git_msg(format!("no tag satisfies semver constraint '{constraint}'")))?;

    let target = repo.find_commit(
        repo.find_reference(&best.reference)?
            .peel_to_commit()?
            .id(),
    )?;
    let oid = target.id();

    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(target.as_object(), Some(&mut checkout))?;
    repo.set_head_detached(oid)?;

    let referencing_tag = lookup_tag_object(&repo, &best.reference)?;

    guard::ensure_clean(&repo)?;
    let record = build_commit_record(&repo, oid, &best.reference, referencing_tag)?;
    Ok(CheckoutOutcome::Checked(repo, record))
}

fn select_best_tag(repo: &Repository, req: &VersionReq) -> Result<Option<Candidate>> {
    let mut candidates = Vec::new();
    let tag_names = repo.tag_names(None)?;
    for name in tag_names.iter().flatten() {
        let version = match Version::parse(name.trim_start_matches('v')) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if !req.matches(&version) {
            continue;
        }
        let reference = format!("refs/tags/{name}");
        let commit_time = repo
            .find_reference(&reference)?
            .peel_to_commit()
            .map(|c| c.committer().when().seconds())
            .unwrap_or(0);
        candidates.push(Candidate { tag_name: name.to_string(), reference, version, commit_time });
    }

    // Ascending: version, then committer timestamp, then the original tag
    // string — the latter breaks ties that survive both of the above
    // (identical semver fields differing only in build metadata, recorded at
    // the exact same instant). Deterministic ordering for an otherwise
    // unspecified case.
    candidates.sort_by(|a, b| {
        a.version
            .cmp(&b.version)
            .then(a.commit_time.cmp(&b.commit_time))
            .then(a.tag_name.cmp(&b.tag_name))
    });

    Ok(candidates.into_iter().last())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_favors_version_then_time_then_name() {
        let mut candidates = vec![
            Candidate { tag_name: "v0.1.0+b".into(), reference: "r1".into(), version: Version::parse("0.1.0+b").unwrap(), commit_time: 100 },
            Candidate { tag_name: "v0.1.0+a".into(), reference: "r2".into(), version: Version::parse("0.1.0+a").unwrap(), commit_time: 100 },
        ];
        candidates.sort_by(|a, b| a.version.cmp(&b.version).then(a.commit_time.cmp(&b.commit_time)).then(a.tag_name.cmp(&b.tag_name)));
        assert_eq!(candidates.last().unwrap().tag_name, "v0.1.0+b");
    }
}
