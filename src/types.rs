use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};

use crate::hash::Hash;

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// An author or committer identity, with the timezone offset the action was
/// recorded under (git commits carry an absolute offset, not just an instant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: DateTime<FixedOffset>) -> Self {
        Self { name: name.into(), email: email.into(), when }
    }

    pub(crate) fn from_git2(sig: &git2::Signature<'_>) -> crate::error::Result<Self> {
        let offset = FixedOffset::east_opt(sig.when().offset_minutes() * 60)
            .ok_or_else(|| crate::error::Error::git_msg("invalid signature offset"))?;
        let when = DateTime::<chrono::Utc>::from_timestamp(sig.when().seconds(), 0)
            .ok_or_else(|| crate::error::Error::git_msg("invalid signature timestamp"))?
            .with_timezone(&offset);
        Ok(Self {
            name: sig.name().unwrap_or_default().to_string(),
            email: sig.email().unwrap_or_default().to_string(),
            when,
        })
    }
}

// ---------------------------------------------------------------------------
// Commit / AnnotatedTag
// ---------------------------------------------------------------------------

/// A resolved commit. A *partial* commit (only `hash`/`reference` populated)
/// is returned when a checkout strategy short-circuits against a caller's
/// `last_observed_commit`; every other field is empty/default in that case.
#[derive(Debug, Clone, Default)]
pub struct Commit {
    pub hash: Hash,
    pub reference: String,
    pub author: Option<Signature>,
    pub committer: Option<Signature>,
    pub signature: String,
    /// The commit object serialized without any embedded PGP signature;
    /// `verify()` recomputes over exactly this payload.
    pub encoded: Vec<u8>,
    pub message: String,
    pub referencing_tag: Option<AnnotatedTag>,
}

impl Commit {
    pub fn is_partial(&self) -> bool {
        self.encoded.is_empty()
    }

    /// Verifies `signature` over `encoded` against each armored key ring in
    /// turn, returning the signer's fingerprint on first success.
    pub fn verify(&self, key_rings: &[&str]) -> crate::error::Result<String> {
        crate::signature::verify_detached(&self.signature, &self.encoded, key_rings)
    }
}

/// An annotated tag object (as opposed to a lightweight tag, which is just a
/// reference directly at a commit).
#[derive(Debug, Clone)]
pub struct AnnotatedTag {
    pub hash: Hash,
    pub name: String,
    pub tagger: Option<Signature>,
    pub signature: String,
    pub encoded: Vec<u8>,
    pub message: String,
}

impl AnnotatedTag {
    pub fn verify(&self, key_rings: &[&str]) -> crate::error::Result<String> {
        crate::signature::verify_detached(&self.signature, &self.encoded, key_rings)
    }
}

// ---------------------------------------------------------------------------
// Checkout configuration
// ---------------------------------------------------------------------------

/// Which revision a clone/checkout should resolve to. Exactly one strategy
/// governs resolution; the type system enforces the exactly-one-of rule that
/// five independent optional fields could not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutStrategy {
    Branch(String),
    Tag(String),
    Commit { hash: String, branch: Option<String> },
    SemVer(String),
    RefName(String),
}

#[derive(Debug, Clone, Default)]
pub struct CloneConfig {
    pub checkout_strategy: Option<CheckoutStrategy>,
    pub last_observed_commit: String,
    pub shallow_clone: bool,
    pub recurse_submodules: bool,
}

// ---------------------------------------------------------------------------
// Push / commit configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PushConfig {
    pub refspecs: Vec<String>,
    pub force: bool,
    pub options: BTreeMap<String, String>,
}

#[derive(Clone, Default)]
pub struct CommitOptions {
    pub files: BTreeMap<String, Vec<u8>>,
    pub signer: Option<crate::signature::PgpEntity>,
    pub signer_passphrase: String,
}

impl std::fmt::Debug for CommitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitOptions")
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .field("signer", &self.signer.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Known-hosts / transport registry entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KnownKey {
    pub hosts: Vec<String>,
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ProxyOptions {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct TransportOptions {
    pub target_url: String,
    pub auth_opts: crate::auth::AuthOptions,
    pub proxy_options: Option<ProxyOptions>,
    pub context: String,
}

impl std::fmt::Debug for TransportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportOptions")
            .field("target_url", &self.target_url)
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_commit_has_no_encoded_payload() {
        let c = Commit { hash: Hash::new("a".repeat(40)), reference: "refs/heads/main".into(), ..Default::default() };
        assert!(c.is_partial());
    }

    #[test]
    fn concrete_commit_is_not_partial() {
        let c = Commit { encoded: vec![1, 2, 3], ..Default::default() };
        assert!(!c.is_partial());
    }
}
