//! Error taxonomy for metadata collectors.
//!
//! These errors never reach callers of the public collectors: the collector,
//! detector and resolver recover from them and fall back to empty results.
//! They exist so internal steps can use `?` and log a precise reason.

/// Errors raised by an individual collection step.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("git command failed: {0}")]
    GitCommand(String),

    #[error("git command timed out after {secs} seconds")]
    GitTimeout { secs: u64 },

    #[error("malformed commit data: {0}")]
    MalformedCommit(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for collection steps.
pub type Result<T> = std::result::Result<T, MetaError>;
