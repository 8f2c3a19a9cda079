use std::path::Path;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{AutotagOption, FetchOptions, Repository};

use crate::auth::AuthOptions;
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::transport::{git2_proxy_options, transport_auth_cancellable};
use crate::types::{AnnotatedTag, CloneConfig, Commit, Signature};

use super::{guard, CheckoutOutcome, EngineOptions};

pub fn resolve(
    workdir: &Path,
    url: &str,
    hash: &str,
    branch: Option<&str>,
    ref_name_for_tag_lookup: Option<&str>,
    auth: &AuthOptions,
    engine: EngineOptions,
    cfg: &CloneConfig,
) -> Result<CheckoutOutcome> {
    let transport = transport_auth_cancellable(
        auth,
        engine.proxy.as_ref(),
        engine.fallback_to_default_known_hosts,
        engine.cancellation.as_ref(),
    )?;
    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(transport.callbacks);

    let dereferenced = ref_name_for_tag_lookup.map(|n| n.ends_with("^{}")).unwrap_or(false);
    let tags = if dereferenced { AutotagOption::None } else { AutotagOption::Auto };
    fetch_options.download_tags(tags);
    if let Some(p) = &transport.proxy {
        fetch_options.proxy_options(git2_proxy_options(p));
    }
    if cfg.shallow_clone {
        fetch_options.depth(1);
    }

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options);
    if let Some(branch) = branch {
        builder.branch(branch);
        // A `Branch` supplied alongside a commit hash narrows the clone to
        // that one branch's history (single-branch true), same as the
        // branch strategy; otherwise every branch is fetched so the
        // requested commit (which may live on any branch) is reachable.
        let branch_owned = branch.to_string();
        builder.remote_create(move |repo, name, url| {
            let refspec = format!("+refs/heads/{branch_owned}:refs/remotes/{name}/{branch_owned}");
            repo.remote_with_fetch(name, url, &refspec)
        });
    }

    let repo = builder
        .clone(url, workdir)
        .map_err(|e| Error::git_msg(e.to_string()))?;

    let oid = git2::Oid::from_str(hash).map_err(|e| Error::git_msg(e.to_string()))?;
    let target = repo.find_commit(oid)?;

    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(target.as_object(), Some(&mut checkout))?;
    repo.set_head_detached(oid)?;

    let reference = ref_name_for_tag_lookup
        .map(|n| n.trim_end_matches("^{}").to_string())
        .unwrap_or_else(|| oid.to_string());

    let referencing_tag = if ref_name_for_tag_lookup.is_some() && !dereferenced {
        lookup_tag_object(&repo, &reference).ok().flatten()
    } else {
        None
    };

    guard::ensure_clean(&repo)?;
    let mut record = build_commit_record(&repo, oid, &reference, None)?;
    record.referencing_tag = referencing_tag;
    Ok(CheckoutOutcome::Checked(repo, record))
}

/// Initializes a fresh repository at `workdir` pointing `origin` at `url`
/// with HEAD symbolically set to `refs/heads/<branch>`, used both by
/// `init()` and by the branch strategy's empty-upstream recovery path.
///
/// When `git_dir` is set (`ClientOptions::with_storer`), the repository's
/// object database and metadata are rooted there instead of under
/// `workdir/.git` — the low-level "storer" injection point named in
/// SPEC_FULL.md §6, analogous to `git init --separate-git-dir`.
pub fn init_local(workdir: &Path, git_dir: Option<&Path>, url: &str, branch: &str) -> Result<Repository> {
    let repo = match git_dir {
        Some(git_dir) => {
            std::fs::create_dir_all(git_dir).map_err(|e| Error::io(git_dir, e))?;
            let mut opts = git2::RepositoryInitOptions::new();
            opts.workdir_path(workdir);
            Repository::init_opts(git_dir, &opts)?
        }
        None => Repository::init(workdir)?,
    };
    {
        let mut remote = match repo.find_remote("origin") {
            Ok(remote) => remote,
            Err(_) => repo.remote("origin", url)?,
        };
        if remote.url() != Some(url) {
            repo.remote_set_url("origin", url)?;
        }
    }
    repo.set_head(&format!("refs/heads/{branch}"))?;
    Ok(repo)
}

/// Looks up the tag object named `name` (bare name, not `refs/tags/...`) if
/// one exists as a distinct object rather than a lightweight tag.
pub fn lookup_tag_object(repo: &Repository, reference: &str) -> Result<Option<AnnotatedTag>> {
    let short_name = reference.rsplit('/').next().unwrap_or(reference);
    let tag_ref = match repo.find_reference(reference) {
        Ok(r) => r,
        Err(_) => return Ok(None),
    };
    let oid = tag_ref.target().ok_or_else(|| Error::git_msg("tag ref has no target"))?;
    match repo.find_tag(oid) {
        Ok(tag) => {
            let tagger = tag.tagger().map(Signature::from_git2).transpose()?;
            Ok(Some(AnnotatedTag {
                hash: Hash::from(tag.id()),
                name: short_name.to_string(),
                tagger,
                signature: String::new(),
                encoded: Vec::new(),
                message: tag.message().unwrap_or_default().to_string(),
            }))
        }
        Err(_) => Ok(None),
    }
}

/// Builds a concrete [`Commit`] from an already-resolved object id.
pub fn build_commit_record(
    repo: &Repository,
    oid: git2::Oid,
    reference: &str,
    referencing_tag: Option<AnnotatedTag>,
) -> Result<Commit> {
    let commit = repo.find_commit(oid)?;
    let author = Signature::from_git2(&commit.author())?;
    let committer = Signature::from_git2(&commit.committer())?;
    let header_signature = commit.header_field_bytes("gpgsig").ok();
    let signature = header_signature
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default();
    // `git2` does not expose a direct "commit minus gpgsig" byte buffer;
    // `encoded` is reconstructed as the commit's canonical header+message
    // representation, matching what a signature was computed over.
    let encoded = commit_payload_without_signature(&commit);

    Ok(Commit {
        hash: Hash::from(oid),
        reference: reference.to_string(),
        author: Some(author),
        committer: Some(committer),
        signature,
        encoded,
        message: commit.message().unwrap_or_default().to_string(),
        referencing_tag,
    })
}

fn commit_payload_without_signature(commit: &git2::Commit<'_>) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(format!("tree {}\n", commit.tree_id()).as_bytes());
    for parent_id in commit.parent_ids() {
        buf.extend_from_slice(format!("parent {parent_id}\n").as_bytes());
    }
    buf.extend_from_slice(format!("author {}\n", format_signature(&commit.author())).as_bytes());
    buf.extend_from_slice(format!("committer {}\n", format_signature(&commit.committer())).as_bytes());
    buf.push(b'\n');
    buf.extend_from_slice(commit.message_bytes());
    buf
}

fn format_signature(sig: &git2::Signature<'_>) -> String {
    let offset_minutes = sig.when().offset_minutes();
    let sign = if offset_minutes < 0 { "-" } else { "+" };
    let abs = offset_minutes.abs();
    format!(
        "{} <{}> {} {sign}{:02}{:02}",
        sig.name().unwrap_or_default(),
        sig.email().unwrap_or_default(),
        sig.when().seconds(),
        abs / 60,
        abs % 60,
    )
}
