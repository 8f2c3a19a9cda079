//! Provider-issued bearer tokens, fetched asynchronously before a remote
//! operation when [`crate::auth::AuthOptions::bearer_token`] is empty and
//! `provider_opts` names a known provider.

use serde::Deserialize;

use crate::auth::{AuthOptions, ProviderOptions};
use crate::error::{Error, Result};

const AZURE_DEVOPS_SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default";

#[derive(Deserialize)]
struct AzureTokenResponse {
    access_token: String,
}

/// Fetches a bearer token for the named provider and returns `opts` with
/// `bearer_token` populated. Called once per remote operation; the token is
/// not cached across calls since provider tokens are typically short-lived.
pub async fn get_credentials(opts: &AuthOptions) -> Result<String> {
    let provider = opts
        .provider_opts
        .as_ref()
        .ok_or_else(|| Error::invalid_provider("<none>"))?;

    match provider.name.as_str() {
        "azure" => fetch_azure_token().await,
        other => Err(Error::invalid_provider(other)),
    }
}

/// Applies a freshly-fetched provider token to a clone of `opts`, leaving the
/// caller's original untouched.
pub async fn with_provider_token(opts: &AuthOptions) -> Result<AuthOptions> {
    if !opts.bearer_token.is_empty() || opts.provider_opts.is_none() {
        return Ok(opts.clone());
    }
    let token = get_credentials(opts).await?;
    let mut next = opts.clone();
    next.bearer_token = token;
    Ok(next)
}

/// Synchronous bridge for the `git2`-driven call stack (`clone`/`push`),
/// which has no `async` entry point of its own: spins up a throwaway
/// current-thread runtime to drive [`with_provider_token`] to completion.
/// A no-op (no runtime spun up) when no provider token needs fetching.
pub fn resolve_auth_blocking(opts: &AuthOptions) -> Result<AuthOptions> {
    if !opts.bearer_token.is_empty() || opts.provider_opts.is_none() {
        return Ok(opts.clone());
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::git_msg(format!("building provider-token runtime: {e}")))?;
    runtime.block_on(with_provider_token(opts))
}

async fn fetch_azure_token() -> Result<String> {
    // Azure Instance Metadata Service, reachable from any Azure-hosted workload.
    let endpoint = format!(
        "http://169.254.169.254/metadata/identity/oauth2/token?api-version=2018-02-01&resource={AZURE_DEVOPS_SCOPE}"
    );
    let client = reqwest::Client::new();
    let resp = client
        .get(&endpoint)
        .header("Metadata", "true")
        .send()
        .await
        .map_err(|e| Error::git_msg(format!("fetching azure token: {e}")))?
        .error_for_status()
        .map_err(|e| Error::git_msg(format!("azure token endpoint: {e}")))?;

    let parsed: AzureTokenResponse = resp
        .json()
        .await
        .map_err(|e| Error::git_msg(format!("decoding azure token response: {e}")))?;
    Ok(parsed.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let opts = AuthOptions {
            provider_opts: Some(ProviderOptions { name: "unknown-provider".into() }),
            ..Default::default()
        };
        let err = get_credentials(&opts).await;
        assert!(matches!(err, Err(Error::InvalidProvider(_))));
    }

    #[tokio::test]
    async fn existing_bearer_token_is_left_untouched() {
        let opts = AuthOptions { bearer_token: "already-set".into(), ..Default::default() };
        let next = with_provider_token(&opts).await.unwrap();
        assert_eq!(next.bearer_token, "already-set");
    }
}
