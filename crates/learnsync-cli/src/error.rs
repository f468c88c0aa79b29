use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] learnsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No record JSON provided")]
    EmptyRecord,
    #[error("Conflict ID cannot be empty")]
    EmptyConflictId,
    #[error("Could not resolve a data directory; pass --db-path")]
    NoDataDir,
    #[error(
        "Sync is not configured. Set LEARNSYNC_API_BASE_URL (and LEARNSYNC_AUTH_TOKEN if the API requires it)."
    )]
    SyncNotConfigured,
}
