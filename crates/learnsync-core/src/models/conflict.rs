//! Sync conflict model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::{ProgressEntry, RecordKind, SyncRecord};
use crate::error::Error;

/// How a conflict is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    /// Force the local version onto the server
    Local,
    /// Overwrite the local copy with the server's version
    Server,
    /// Reserved; no merge strategy exists yet
    Merge,
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Server => "server",
            Self::Merge => "merge",
        })
    }
}

impl FromStr for ConflictResolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "server" => Ok(Self::Server),
            "merge" => Ok(Self::Merge),
            other => Err(Error::InvalidInput(format!(
                "unknown conflict resolution: {other}"
            ))),
        }
    }
}

/// A record the server refused because it holds a competing version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// `{kind}-{record id}-{detected unix ms}`
    pub id: String,
    pub kind: RecordKind,
    pub record_id: String,
    pub local_data: SyncRecord,
    /// Server's version, shaped by the remote API
    pub server_data: Value,
    pub detected_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolution: Option<ConflictResolution>,
}

impl SyncConflict {
    pub fn new(local_data: SyncRecord, server_data: Value, detected_at: DateTime<Utc>) -> Self {
        let kind = local_data.kind();
        let record_id = local_data.id().to_string();
        Self {
            id: format!("{kind}-{record_id}-{}", detected_at.timestamp_millis()),
            kind,
            record_id,
            local_data,
            server_data,
            detected_at,
            resolved: false,
            resolution: None,
        }
    }

    /// Whether this conflict concerns the same record as `record`.
    pub fn is_for(&self, record: &SyncRecord) -> bool {
        self.kind == record.kind() && self.record_id == record.id()
    }
}

/// The fields of a server-side progress entry the auto-resolver compares.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(alias = "completionPercentage")]
    pub completion_percentage: f64,
    #[serde(alias = "lastAccessed")]
    pub last_accessed: DateTime<Utc>,
}

impl ProgressSnapshot {
    /// Parse the server's conflicting progress entry; `None` when unreadable.
    pub fn from_server(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Decide a progress conflict without asking the learner.
///
/// The local entry wins when it is at least as complete and at least as
/// recent; the server wins when it is strictly more complete. Anything else
/// needs a manual decision.
pub fn progress_winner(
    local: &ProgressEntry,
    server: &ProgressSnapshot,
) -> Option<ConflictResolution> {
    if local.completion_percentage >= server.completion_percentage
        && local.last_accessed >= server.last_accessed
    {
        Some(ConflictResolution::Local)
    } else if server.completion_percentage > local.completion_percentage {
        Some(ConflictResolution::Server)
    } else {
        None
    }
}
