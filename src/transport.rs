//! Builds `git2` remote callbacks and proxy options from [`AuthOptions`],
//! including SSH host-key verification against a parsed known-hosts list.
//!
//! Grounded on the `RemoteCallbacks::new().credentials(...)` /
//! `Cred::ssh_key_from_memory` / `FetchOptions::remote_callbacks()` pattern —
//! the teacher shells out to `git credential fill` instead of using git2
//! credential callbacks, so this module has no teacher counterpart.

use git2::{Cred, CredentialType, RemoteCallbacks};
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthOptions, Transport};
use crate::error::{Error, Result};
use crate::known_hosts::{parse_known_hosts, KnownKeyExt as _};
use crate::types::ProxyOptions;

/// A bundle of everything a `git2` remote operation needs to authenticate
/// and traverse a proxy. Built once per operation since `RemoteCallbacks`
/// borrows the `AuthOptions` it closes over.
pub struct TransportAuth<'a> {
    pub callbacks: RemoteCallbacks<'a>,
    pub proxy: Option<ProxyOptions>,
}

/// Builds credential and host-key callbacks from `opts`. `fallback_to_default_known_hosts`
/// permits SSH auth to consult the machine's default known-hosts file when
/// the caller supplied none of its own. `proxy`, when set, is propagated to
/// every remote operation built from the returned handle (clone, fetch,
/// push, and remote-HEAD listing alike). `cancellation`, when set, is
/// consulted on every progress tick; libgit2 aborts the transfer as soon as
/// a progress callback returns `false`, which is the only cooperative
/// cancellation point it exposes.
pub fn transport_auth<'a>(
    opts: &'a AuthOptions,
    proxy: Option<&ProxyOptions>,
    fallback_to_default_known_hosts: bool,
) -> Result<TransportAuth<'a>> {
    transport_auth_cancellable(opts, proxy, fallback_to_default_known_hosts, None)
}

pub fn transport_auth_cancellable<'a>(
    opts: &'a AuthOptions,
    proxy: Option<&ProxyOptions>,
    fallback_to_default_known_hosts: bool,
    cancellation: Option<&CancellationToken>,
) -> Result<TransportAuth<'a>> {
    let transport = opts.transport.ok_or_else(|| Error::auth_option_invalid("no transport type set"))?;
    let mut callbacks = RemoteCallbacks::new();

    match transport {
        Transport::Http | Transport::Https => {
            if !opts.bearer_token.is_empty() {
                let token = opts.bearer_token.clone();
                callbacks.credentials(move |_url, _username, allowed| {
                    if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                        // libgit2 has no native bearer-token credential type; providers
                        // that accept bearer tokens over HTTP basic expect the token as
                        // the password with an arbitrary non-empty username.
                        Cred::userpass_plaintext("x-access-token", &token)
                    } else {
                        Err(git2::Error::from_str("bearer token requires plaintext user/pass auth"))
                    }
                });
            } else if !opts.username.is_empty() || !opts.password.is_empty() {
                let username = opts.username.clone();
                let password = opts.password.clone();
                callbacks.credentials(move |_url, _username, allowed| {
                    if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                        Cred::userpass_plaintext(&username, &password)
                    } else {
                        Err(git2::Error::from_str("no usable credential type offered"))
                    }
                });
            }
        }
        Transport::Ssh => {
            let username = if opts.username.is_empty() { "git".to_string() } else { opts.username.clone() };
            let identity = opts.identity.clone();
            let passphrase = opts.password.clone();
            if !identity.is_empty() {
                callbacks.credentials(move |_url, username_from_url, allowed| {
                    if allowed.contains(CredentialType::SSH_KEY) {
                        let user = username_from_url.unwrap_or(&username);
                        let phrase = if passphrase.is_empty() { None } else { Some(passphrase.as_str()) };
                        Cred::ssh_key_from_memory(user, None, std::str::from_utf8(&identity).unwrap_or_default(), phrase)
                    } else {
                        Err(git2::Error::from_str("no usable credential type offered"))
                    }
                });
            } else if !fallback_to_default_known_hosts {
                return Err(Error::auth_option_invalid(
                    "SSH transport requires an identity unless default known_hosts fallback is enabled",
                ));
            } else {
                callbacks.credentials(move |_url, username_from_url, allowed| {
                    if allowed.contains(CredentialType::SSH_KEY) {
                        Cred::ssh_key_from_agent(username_from_url.unwrap_or(&username))
                    } else {
                        Err(git2::Error::from_str("no usable credential type offered"))
                    }
                });
            }

            let known_hosts_text = if !opts.known_hosts.is_empty() {
                Some(String::from_utf8_lossy(&opts.known_hosts).into_owned())
            } else if fallback_to_default_known_hosts {
                default_known_hosts_path()
                    .and_then(|p| std::fs::read_to_string(p).ok())
            } else {
                None
            };

            if let Some(text) = known_hosts_text {
                let known = parse_known_hosts(&text)?;
                let host = opts.host.clone();
                callbacks.certificate_check(move |cert, _host_str| {
                    let Some(hostkey) = cert.as_hostkey() else {
                        return Ok(git2::CertificateCheckStatus::CertificateOk);
                    };
                    let Some(key_bytes) = hostkey.hostkey() else {
                        return Err(git2::Error::from_str("no host key offered"));
                    };
                    let matched = known.iter().any(|k| k.matches(&host) && k.key.ends_with(key_bytes));
                    if matched {
                        Ok(git2::CertificateCheckStatus::CertificateOk)
                    } else {
                        Err(git2::Error::from_str(&format!("host key verification failed for {host}")))
                    }
                });
            }
        }
    }

    if let Some(token) = cancellation.cloned() {
        let for_transfer = token.clone();
        callbacks.transfer_progress(move |_stats| !for_transfer.is_cancelled());
        callbacks.sideband_progress(move |_text| !token.is_cancelled());
    }

    Ok(TransportAuth { callbacks, proxy: proxy.cloned() })
}

fn default_known_hosts_path() -> Option<std::path::PathBuf> {
    std::env::var_os("HOME").map(|home| std::path::Path::new(&home).join(".ssh/known_hosts"))
}

/// Converts `proxy` into `git2`'s proxy options.
pub fn git2_proxy_options(proxy: &ProxyOptions) -> git2::ProxyOptions<'_> {
    let mut opts = git2::ProxyOptions::new();
    opts.url(&proxy.url);
    opts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_transport_is_rejected() {
        let opts = AuthOptions::default();
        assert!(transport_auth(&opts, None, false).is_err());
    }

    #[test]
    fn ssh_without_identity_requires_fallback_flag() {
        let opts = AuthOptions { transport: Some(Transport::Ssh), host: "example.com".into(), ..Default::default() };
        assert!(transport_auth(&opts, None, false).is_err());
        assert!(transport_auth(&opts, None, true).is_ok());
    }

    #[test]
    fn proxy_settings_propagate_into_transport_auth() {
        let opts = AuthOptions { transport: Some(Transport::Https), ..Default::default() };
        let proxy = ProxyOptions { url: "http://proxy.example.com:8080".into(), ..Default::default() };
        let transport = transport_auth(&opts, Some(&proxy), false).unwrap();
        assert_eq!(transport.proxy.as_ref().unwrap().url, proxy.url);
    }

    #[test]
    fn cancellation_token_does_not_prevent_building_callbacks() {
        let opts = AuthOptions { transport: Some(Transport::Https), ..Default::default() };
        let token = CancellationToken::new();
        token.cancel();
        assert!(transport_auth_cancellable(&opts, None, false, Some(&token)).is_ok());
    }
}
