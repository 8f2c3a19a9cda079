use crate::error::{Error, Result};

/// Validate a git reference name (the branch/tag component after
/// `refs/heads/`/`refs/tags/`), per git's `check-ref-format` rules.
///
/// # Errors
/// Returns [`Error::InvalidRefName`] if the name violates any rule.
pub fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_ref_name("ref name must not be empty"));
    }

    for ch in name.chars() {
        match ch {
            ':' | ' ' | '\t' | '\n' | '\r' | '\\' | '^' | '~' | '?' | '*' | '[' => {
                return Err(Error::invalid_ref_name(format!(
                    "ref name contains invalid character: {:?}",
                    ch,
                )));
            }
            _ => {}
        }
    }

    if name.contains("..") {
        return Err(Error::invalid_ref_name("ref name must not contain '..'"));
    }

    if name.contains("@{") {
        return Err(Error::invalid_ref_name("ref name must not contain '@{'"));
    }

    if name.ends_with('.') {
        return Err(Error::invalid_ref_name("ref name must not end with '.'"));
    }

    if name.ends_with(".lock") {
        return Err(Error::invalid_ref_name("ref name must not end with '.lock'"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_ref_ok() {
        assert!(validate_ref_name("refs/heads/main").is_ok());
    }

    #[test]
    fn validate_ref_rejects_space() {
        assert!(validate_ref_name("refs/heads/my branch").is_err());
    }

    #[test]
    fn validate_ref_rejects_colon() {
        assert!(validate_ref_name("refs:heads").is_err());
    }

    #[test]
    fn validate_ref_rejects_dotdot() {
        assert!(validate_ref_name("refs/heads/a..b").is_err());
    }

    #[test]
    fn validate_ref_rejects_at_brace() {
        assert!(validate_ref_name("refs/heads/a@{0}").is_err());
    }

    #[test]
    fn validate_ref_rejects_trailing_dot() {
        assert!(validate_ref_name("refs/heads/a.").is_err());
    }

    #[test]
    fn validate_ref_rejects_dot_lock() {
        assert!(validate_ref_name("refs/heads/a.lock").is_err());
    }

    #[test]
    fn validate_ref_rejects_empty() {
        assert!(validate_ref_name("").is_err());
    }
}
