//! Error types for the governance engine.

use thiserror::Error;

/// Result type for governance operations.
pub type Result<T> = std::result::Result<T, GovernanceError>;

/// Errors that can occur while loading policy or processing a record.
///
/// Policy and data-shape problems are absorbed inside the engine (fail-open);
/// only [`GovernanceError::Validator`] ever reaches a caller of
/// [`crate::GovernanceEngine::validate_and_redact`].
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// The policy document was readable but structurally wrong.
    #[error("policy error: {0}")]
    PolicyError(String),

    /// I/O error during policy file operations.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The filesystem watcher could not be started.
    #[error("watch error: {0}")]
    WatchError(#[from] notify::Error),

    /// The external violation tagger failed for this record.
    #[error("validator error: {0}")]
    Validator(String),
}

impl GovernanceError {
    /// Create a validator error from any displayable cause.
    pub fn validator(cause: impl std::fmt::Display) -> Self {
        GovernanceError::Validator(cause.to_string())
    }
}
