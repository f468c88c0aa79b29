//! Sync status snapshot

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Read-only view of the engine, derived from the queue and error ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub pending_items: usize,
    pub failed_items: usize,
    /// Percentage of the current or last pass (0-100)
    pub sync_progress: u8,
}
