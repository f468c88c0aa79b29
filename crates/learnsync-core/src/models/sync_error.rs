//! Sync failure ledger entries

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::SyncRecord;

/// Retries allowed for a retryable failure before it is left for the user.
pub const MAX_RETRIES: u32 = 3;

/// Broad failure category; only `Network` failures are retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Network,
    Server,
    Conflict,
    Validation,
}

impl ErrorCategory {
    /// Categorize a failure from its message.
    ///
    /// Transport failures are `Network` regardless of wording; otherwise a
    /// mention of 409/conflict wins over 400/validation, and everything
    /// else counts as a server failure.
    pub fn classify(is_network: bool, message: &str) -> Self {
        if is_network {
            return Self::Network;
        }
        let message = message.to_ascii_lowercase();
        if message.contains("409") || message.contains("conflict") {
            Self::Conflict
        } else if message.contains("400") || message.contains("validation") {
            Self::Validation
        } else {
            Self::Server
        }
    }

    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Network => "network",
            Self::Server => "server",
            Self::Conflict => "conflict",
            Self::Validation => "validation",
        })
    }
}

/// A failed sync call, kept until a retry succeeds or the user clears it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncError {
    pub id: String,
    /// Kind task name (`quiz-attempts`, ...) or `sync` for a failed pass
    pub task: String,
    pub category: ErrorCategory,
    pub message: String,
    /// The record to retry; absent for whole-pass failures
    pub record: Option<SyncRecord>,
    pub detected_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl SyncError {
    pub fn new(
        task: impl Into<String>,
        category: ErrorCategory,
        message: impl Into<String>,
        record: Option<SyncRecord>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            task: task.into(),
            category,
            message: message.into(),
            record,
            detected_at,
            retry_count: 0,
            max_retries: MAX_RETRIES,
        }
    }

    /// Whether another automatic retry may be scheduled.
    pub const fn can_retry(&self) -> bool {
        self.category.is_retryable() && self.record.is_some() && self.retry_count < self.max_retries
    }
}
