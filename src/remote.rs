//! Remote HEAD resolution and push, the two operations that talk to a
//! remote without cloning it wholesale.
//!
//! Grounded on `mirror.rs`'s `get_remote_refs`/`mirror_push`/`targeted_push`
//! (direct `git2` remote connect/ls/push calls, refspec construction,
//! `Error::git` wrapping) — the closest the teacher comes to this crate's
//! remote-resolution and push machinery, even though the teacher's use case
//! (mirroring) differs from a checkout client's.

use git2::{PushOptions, Remote, Repository};
use tokio_util::sync::CancellationToken;

use crate::auth::AuthOptions;
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::transport::{git2_proxy_options, transport_auth_cancellable};
use crate::types::{ProxyOptions, PushConfig};

/// Resolves `ref_name` against the remote at `url` without cloning,
/// returning `"<ref_name>@<algo>:<hex>"` for the commit the ref points to
/// (peeling an annotated tag to its target commit), or the empty string if
/// unresolved.
pub fn get_remote_head(
    repo: &Repository,
    url: &str,
    ref_name: &str,
    auth: &AuthOptions,
    proxy: Option<&ProxyOptions>,
    fallback_to_default_known_hosts: bool,
    cancellation: Option<&CancellationToken>,
) -> Result<String> {
    if ref_name.starts_with('/') || ref_name.ends_with('/') {
        return Err(Error::invalid_ref_name(format!(
            "ref name '{ref_name}' must not begin or end with '/'"
        )));
    }

    let mut remote = repo.remote_anonymous(url)?;
    let transport = transport_auth_cancellable(auth, proxy, fallback_to_default_known_hosts, cancellation)?;
    let proxy_options = transport.proxy.as_ref().map(git2_proxy_options);
    let mut conn = remote.connect_auth(git2::Direction::Fetch, Some(transport.callbacks), proxy_options)?;

    let mut fallback: Option<String> = None;
    let dereferenced_suffix = format!("{ref_name}^{{}}");

    for head in conn.list()? {
        let name = head.name();
        if name == dereferenced_suffix {
            return Ok(format!("{ref_name}@{}", Hash::from(head.oid()).digest()));
        }
        if name == ref_name {
            if !name.starts_with("refs/tags/") {
                return Ok(format!("{ref_name}@{}", Hash::from(head.oid()).digest()));
            }
            fallback = Some(format!("{ref_name}@{}", Hash::from(head.oid()).digest()));
        }
    }

    drop(conn);
    Ok(fallback.unwrap_or_default())
}

/// Pushes `cfg.refspecs`, or, when empty, exactly the refspec mapping the
/// current HEAD to itself — never every local branch.
pub fn push(
    repo: &Repository,
    url: &str,
    head_ref: &str,
    auth: &AuthOptions,
    proxy: Option<&ProxyOptions>,
    fallback_to_default_known_hosts: bool,
    cancellation: Option<&CancellationToken>,
    cfg: &PushConfig,
) -> Result<()> {
    let mut remote: Remote<'_> = repo.find_remote("origin").or_else(|_| repo.remote_anonymous(url))?;

    let refspecs: Vec<String> = if cfg.refspecs.is_empty() {
        vec![format!(
            "{force}{head_ref}:{head_ref}",
            force = if cfg.force { "+" } else { "" }
        )]
    } else {
        cfg.refspecs
            .iter()
            .map(|spec| if cfg.force && !spec.starts_with('+') { format!("+{spec}") } else { spec.clone() })
            .collect()
    };

    let transport = transport_auth_cancellable(auth, proxy, fallback_to_default_known_hosts, cancellation)?;
    let mut push_options = PushOptions::new();
    push_options.remote_callbacks(transport.callbacks);
    if let Some(p) = &transport.proxy {
        push_options.proxy_options(git2_proxy_options(p));
    }
    if !cfg.options.is_empty() {
        let opts: Vec<String> = cfg.options.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let refs: Vec<&str> = opts.iter().map(String::as_str).collect();
        push_options.push_options(refs);
    }

    let refspec_refs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
    remote
        .push(&refspec_refs, Some(&mut push_options))
        .map_err(|e| Error::git_msg(e.to_string()))
}
