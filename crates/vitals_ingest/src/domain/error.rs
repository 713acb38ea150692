use common::domain::DomainError;
use common::DecodeError;
use std::fmt;
use thiserror::Error;

/// A feed event (or one item of a batch) that does not have the expected shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEventError {
    pub path: String,
    /// Batch key of the offending item; `None` when the whole event is malformed
    pub key: Option<String>,
    pub reason: String,
}

impl fmt::Display for MalformedEventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "malformed item {} at {}: {}", key, self.path, self.reason),
            None => write!(f, "malformed event at {}: {}", self.path, self.reason),
        }
    }
}

impl std::error::Error for MalformedEventError {}

/// Failure of one or both persistence writes. The writes are independent, so
/// a snapshot failure does not prevent the history append (or vice versa).
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("snapshot merge failed: {0}")]
    Snapshot(#[source] DomainError),

    #[error("history append failed: {0}")]
    History(#[source] DomainError),

    #[error("snapshot merge failed: {snapshot}; history append failed: {history}")]
    Both {
        snapshot: DomainError,
        history: DomainError,
    },
}

/// Why a single reading was dropped by the pipeline
#[derive(Debug, Error)]
pub enum ReadingError {
    #[error("decode failed at {} stage: {0}", .0.stage())]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Write(#[from] WriteError),
}
