use std::path::PathBuf;

/// All errors produced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("path outside working dir: {0}")]
    PathEscape(String),

    #[error("chroot is not supported")]
    ChrootUnsupported,

    #[error("repository not found at {url}: {message}")]
    RepositoryNotFound { message: String, url: String },

    #[error("no git repository open")]
    NoGitRepository,

    #[error("no staged files")]
    NoStagedFiles,

    #[error("repository working tree is dirty after checkout")]
    DirtyRepository,

    #[error("invalid auth options: {0}")]
    AuthOptionInvalid(String),

    #[error("invalid known_hosts entry: {0}")]
    InvalidKnownHosts(String),

    #[error("host key verification failed for {0}")]
    HostKeyMismatch(String),

    #[error("unable to verify payload with any of the given key rings")]
    SignatureVerificationFailed,

    #[error("signature is empty")]
    EmptySignature,

    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    #[error("unable to resolve ref '{0}' to a specific commit")]
    UnresolvableRef(String),

    #[error("git error: {0}")]
    Git(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

impl Error {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn invalid_ref_name(name: impl Into<String>) -> Self {
        Self::InvalidRefName(name.into())
    }

    pub fn path_escape(path: impl Into<String>) -> Self {
        Self::PathEscape(path.into())
    }

    pub fn repository_not_found(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::RepositoryNotFound {
            message: message.into(),
            url: url.into(),
        }
    }

    pub fn auth_option_invalid(reason: impl Into<String>) -> Self {
        Self::AuthOptionInvalid(reason.into())
    }

    pub fn invalid_known_hosts(reason: impl Into<String>) -> Self {
        Self::InvalidKnownHosts(reason.into())
    }

    pub fn host_key_mismatch(host: impl Into<String>) -> Self {
        Self::HostKeyMismatch(host.into())
    }

    pub fn invalid_provider(name: impl Into<String>) -> Self {
        Self::InvalidProvider(name.into())
    }

    pub fn unresolvable_ref(name: impl Into<String>) -> Self {
        Self::UnresolvableRef(name.into())
    }

    pub fn git(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Git(Box::new(err))
    }

    pub fn git_msg(msg: impl Into<String>) -> Self {
        // libgit2 drops the informative remote line on some rejected pushes;
        // rewrite that specific, unhelpful message into something actionable.
        let msg = msg.into();
        if msg.contains("unknown error: remote: ") {
            Self::Git("push rejected; check git secret has write access".into())
        } else {
            Self::Git(msg.into())
        }
    }

    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.into().display(), err),
        ))
    }
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        Self::git(err)
    }
}
