//! Error types for learnsync-core

use thiserror::Error;

use crate::models::ErrorCategory;
use crate::remote::RemoteError;

/// Result type alias using learnsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in learnsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote upsert failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Conflict not found
    #[error("Conflict not found: {0}")]
    ConflictNotFound(String),

    /// Queued record not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Server returned data that cannot be applied locally
    #[error("Invalid server data: {0}")]
    InvalidServerData(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Category recorded in the error ledger for this failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Remote(error) => error.category(),
            other => ErrorCategory::classify(false, &other.to_string()),
        }
    }
}
