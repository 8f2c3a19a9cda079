//! A Git repository client library: clone/checkout-by-strategy, push, branch
//! switching, and a confined worktree filesystem, with HTTP(S)/SSH transport
//! authentication and known-hosts verification, for use by continuous-delivery
//! reconciliation controllers.
//!
//! # Key types
//!
//! - [`client::RepositoryClient`] — binds a working directory to one auth
//!   configuration and one ambient repository handle; `clone`/`init` it
//!   against a remote, then `commit`/`push`/`switch_branch`.
//! - [`types::CheckoutStrategy`] — which revision a clone should resolve to
//!   (branch, tag, commit, semver constraint, or arbitrary reference name).
//! - [`auth::AuthOptions`] — credentials and connection policy for a remote.
//! - [`confined_fs::ConfinedFs`] — a filesystem view anchored to a single
//!   working-directory root.
//!
//! # Quick example
//!
//! ```rust,no_run
//! use gitclient::{RepositoryClient, ClientOptions};
//! use gitclient::auth::AuthOptions;
//! use gitclient::types::{CloneConfig, CheckoutStrategy};
//!
//! let client = RepositoryClient::new(
//!     "/tmp/work/my-repo",
//!     AuthOptions::default(),
//!     ClientOptions::default(),
//! ).unwrap();
//!
//! let cfg = CloneConfig {
//!     checkout_strategy: Some(CheckoutStrategy::Branch("main".into())),
//!     ..Default::default()
//! };
//! let commit = client.clone("https://example.com/my-repo.git", &cfg).unwrap();
//! ```

pub mod auth;
pub mod checkout;
pub mod client;
pub mod confined_fs;
pub mod error;
pub mod hash;
pub mod known_hosts;
pub mod lock;
pub mod paths;
pub mod provider;
pub mod registry;
pub mod remote;
pub mod revision;
pub mod signature;
pub mod transport;
pub mod types;

pub use client::{ClientOptions, CommitOutcome, RepositoryClient};
pub use error::{Error, Result};
