//! Error types for the logging adapter.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("invalid log configuration: {0}")]
    Config(String),

    #[cfg(feature = "metrics")]
    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("governance error: {0}")]
    Governance(#[from] lg_redact::GovernanceError),
}

pub type Result<T> = std::result::Result<T, LoggingError>;
