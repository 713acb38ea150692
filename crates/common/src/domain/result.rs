use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failures reported by the external collaborators (live feed, document store)
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Feed error: {0}")]
    FeedError(String),

    #[error("Feed stream cancelled by server: {0}")]
    FeedClosed(String),

    #[error("Feed credentials revoked")]
    AuthRevoked,

    #[error("Malformed feed frame: {0}")]
    MalformedFrame(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

/// Invalid startup configuration. Always fatal: the process must not start listening.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cipher key must be exactly {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("cipher IV must be exactly {expected} bytes, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },

    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: String, reason: String },

    #[error("missing required configuration: {0}")]
    Missing(String),
}
