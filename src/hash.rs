use std::fmt;

/// An object identifier algorithm. Inferred from hex length rather than
/// carried explicitly, since that is all the wire format gives us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha1,
    Unknown,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Sha1 => write!(f, "sha1"),
            Algorithm::Unknown => write!(f, "unknown"),
        }
    }
}

/// An opaque commit object identifier, stored as lowercase hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(String);

impl Hash {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn algorithm(&self) -> Algorithm {
        if self.0.len() == 40 {
            Algorithm::Sha1
        } else {
            Algorithm::Unknown
        }
    }

    /// `"<algo>:<hex>"`.
    pub fn digest(&self) -> String {
        format!("{}:{}", self.algorithm(), self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<git2::Oid> for Hash {
    fn from(oid: git2::Oid) -> Self {
        Self(oid.to_string())
    }
}

impl From<&str> for Hash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Hash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_algorithm_from_length() {
        let h = Hash::new("a".repeat(40));
        assert_eq!(h.algorithm(), Algorithm::Sha1);
    }

    #[test]
    fn unknown_algorithm_from_other_lengths() {
        let h = Hash::new("abc123");
        assert_eq!(h.algorithm(), Algorithm::Unknown);
    }

    #[test]
    fn digest_format() {
        let h = Hash::new("a".repeat(40));
        assert_eq!(h.digest(), format!("sha1:{}", "a".repeat(40)));
    }
}
