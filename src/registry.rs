//! A process-wide registry of in-flight [`TransportOptions`], keyed by a
//! synthetic per-clone URL. `git2`'s smart-transport extension point has no
//! way to thread per-call state down to its callback, so the callback looks
//! the entry up here by the key embedded in the URL it was given.
//!
//! Grounded generally on the teacher's own `Arc`-shared `GitStoreInner`
//! (`store.rs`), generalized from per-instance to process-wide scope because
//! nothing else reaches this deep into `git2`'s internals.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::types::TransportOptions;

static REGISTRY: Lazy<Mutex<HashMap<String, TransportOptions>>> = Lazy::new(|| Mutex::new(HashMap::new()));

pub fn register(key: String, opts: TransportOptions) -> Result<()> {
    REGISTRY.lock().map_err(|e| Error::git_msg(e.to_string()))?.insert(key, opts);
    Ok(())
}

pub fn lookup(key: &str) -> Result<Option<TransportOptions>> {
    Ok(REGISTRY.lock().map_err(|e| Error::git_msg(e.to_string()))?.get(key).cloned())
}

pub fn unregister(key: &str) -> Result<()> {
    REGISTRY.lock().map_err(|e| Error::git_msg(e.to_string()))?.remove(key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthOptions;

    #[test]
    fn register_lookup_unregister_roundtrip() {
        let key = "test-key-1".to_string();
        register(
            key.clone(),
            TransportOptions {
                target_url: "https://example.com/r".into(),
                auth_opts: AuthOptions::default(),
                proxy_options: None,
                context: "test".into(),
            },
        )
        .unwrap();
        assert!(lookup(&key).unwrap().is_some());
        unregister(&key).unwrap();
        assert!(lookup(&key).unwrap().is_none());
    }
}
