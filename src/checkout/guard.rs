//! Pre- and post-checkout guards: reject credentials over cleartext HTTP,
//! and reject a worktree left dirty by a nominally-successful checkout.

use url::Url;

use crate::auth::AuthOptions;
use crate::error::{Error, Result};

/// Validates a target URL before any network call. Unless
/// `credentials_over_http` is set, rejects `http://` (or scheme-less) URLs
/// that carry user-info, basic credentials, or a bearer token.
pub fn validate_url(target: &str, auth: &AuthOptions, credentials_over_http: bool) -> Result<()> {
    if !auth.bearer_token.is_empty() && (!auth.username.is_empty() || !auth.password.is_empty()) {
        return Err(Error::auth_option_invalid(
            "cannot combine basic auth and a bearer token on the same request",
        ));
    }

    if credentials_over_http {
        return Ok(());
    }

    let parsed = Url::parse(target).map_err(|e| Error::auth_option_invalid(e.to_string()))?;
    let scheme = parsed.scheme().to_ascii_lowercase();
    if scheme != "http" && !scheme.is_empty() {
        return Ok(());
    }

    let has_url_userinfo = !parsed.username().is_empty() || parsed.password().is_some();
    let has_credentials = !auth.username.is_empty() || !auth.password.is_empty() || !auth.bearer_token.is_empty();
    if has_url_userinfo || has_credentials {
        return Err(Error::auth_option_invalid(
            "URL cannot contain credentials when using HTTP",
        ));
    }
    Ok(())
}

/// Checked immediately after every successful concrete checkout: a handful
/// of edge cases (absolute symlinks pointing outside a chroot) can leave the
/// worktree dirty even though the checkout itself reported success.
pub fn ensure_clean(repo: &git2::Repository) -> Result<()> {
    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true).include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts))?;
    if statuses.is_empty() {
        Ok(())
    } else {
        Err(Error::DirtyRepository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Transport;

    #[test]
    fn plain_http_with_basic_auth_is_rejected() {
        let auth = AuthOptions { transport: Some(Transport::Http), username: "u".into(), ..Default::default() };
        assert!(validate_url("http://example.com/r.git", &auth, false).is_err());
    }

    #[test]
    fn plain_http_allowed_with_insecure_flag() {
        let auth = AuthOptions { transport: Some(Transport::Http), username: "u".into(), ..Default::default() };
        assert!(validate_url("http://example.com/r.git", &auth, true).is_ok());
    }

    #[test]
    fn https_with_credentials_is_fine() {
        let auth = AuthOptions { transport: Some(Transport::Https), username: "u".into(), ..Default::default() };
        assert!(validate_url("https://example.com/r.git", &auth, false).is_ok());
    }

    #[test]
    fn url_userinfo_over_http_is_rejected() {
        let auth = AuthOptions::default();
        assert!(validate_url("http://u:p@example.com/r.git", &auth, false).is_err());
    }

    #[test]
    fn basic_and_bearer_together_is_rejected_regardless_of_scheme() {
        let auth = AuthOptions { bearer_token: "t".into(), username: "u".into(), ..Default::default() };
        assert!(validate_url("https://example.com/r.git", &auth, false).is_err());
    }
}
