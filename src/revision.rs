use crate::hash::Hash;

/// Splits a revision string into its pointer (possibly empty) and hex hash,
/// accepting both the canonical `"<pointer>@<algo>:<hex>"` form and the
/// legacy `"<pointer>/<hex>"` form.
pub fn split(rev: &str) -> (String, String) {
    if let Some((pointer, rest)) = rev.split_once('@') {
        let hex = rest.split_once(':').map(|(_, h)| h).unwrap_or(rest);
        return (pointer.to_string(), hex.to_string());
    }
    if let Some((pointer, hex)) = rev.rsplit_once('/') {
        return (pointer.to_string(), hex.to_string());
    }
    (String::new(), rev.to_string())
}

/// Normalizes any accepted revision form into the canonical form, eliding a
/// `HEAD` pointer. Idempotent: `transform(transform(rev)) == transform(rev)`.
pub fn transform(rev: &str) -> String {
    let (pointer, hex) = split(rev);
    let digest = Hash::new(hex).digest();
    if pointer.is_empty() || pointer == "HEAD" {
        digest
    } else {
        format!("{pointer}@{digest}")
    }
}

pub fn extract_hash(rev: &str) -> Hash {
    let (_, hex) = split(rev);
    Hash::new(hex)
}

pub fn extract_pointer(rev: &str) -> String {
    let (pointer, _) = split(rev);
    pointer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_is_idempotent() {
        let rev = "main@sha1:deadbeef";
        assert_eq!(transform(rev), transform(&transform(rev)));
    }

    #[test]
    fn transform_legacy_form() {
        let hex = "a".repeat(40);
        let rev = format!("main/{hex}");
        assert_eq!(transform(&rev), format!("main@sha1:{hex}"));
    }

    #[test]
    fn transform_elides_head() {
        let hex = "a".repeat(40);
        let rev = format!("HEAD@sha1:{hex}");
        assert_eq!(transform(&rev), format!("sha1:{hex}"));
    }

    #[test]
    fn split_recompose_matches_transform() {
        let rev = "release/1.0@sha1:cafebabe";
        let (pointer, hex) = split(rev);
        let recomposed = format!("{pointer}@{}", Hash::new(hex).digest());
        assert_eq!(recomposed, transform(rev));
    }

    #[test]
    fn extract_hash_bare_hex() {
        let hex = "b".repeat(40);
        assert_eq!(extract_hash(&hex).as_str(), hex);
    }

    #[test]
    fn extract_pointer_bare_hex_is_empty() {
        assert_eq!(extract_pointer("deadbeef"), "");
    }

    proptest::proptest! {
        #[test]
        fn idempotence_holds_for_arbitrary_pointers_and_hex(
            pointer in "[a-zA-Z0-9/_.-]{0,20}",
            hex in "[a-f0-9]{40}",
        ) {
            let rev = if pointer.is_empty() {
                hex.clone()
            } else {
                format!("{pointer}@sha1:{hex}")
            };
            let once = transform(&rev);
            let twice = transform(&once);
            proptest::prop_assert_eq!(once, twice);
        }
    }
}
