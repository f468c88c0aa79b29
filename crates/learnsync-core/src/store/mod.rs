//! Storage seams used by the sync engine.
//!
//! The local queue owns the offline records and is the only writer of their
//! sync flags; the conflict store persists the engine's conflict list.

mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{RecordKind, SyncConflict, SyncRecord};

pub use memory::{MemoryConflictStore, MemoryLocalQueue};

/// Durable queue of records captured while offline.
#[async_trait]
pub trait LocalQueue: Send + Sync {
    /// Add a record as unsynced. Re-enqueueing a known id is an error.
    async fn enqueue(&self, record: SyncRecord) -> Result<()>;

    /// Unsynced records of one kind, oldest first.
    async fn unsynced(&self, kind: RecordKind) -> Result<Vec<SyncRecord>>;

    /// Flag a record as synced. Marking an already synced record is a no-op.
    async fn mark_synced(&self, kind: RecordKind, id: &str) -> Result<()>;

    /// Whether a record is flagged synced; unknown records are not.
    async fn is_synced(&self, kind: RecordKind, id: &str) -> Result<bool>;

    /// Replace a record's contents with the server's version, keeping its flag.
    async fn apply_server_version(&self, record: &SyncRecord) -> Result<()>;

    /// Unsynced record counts for every kind, in pass order.
    async fn pending_by_kind(&self) -> Result<Vec<(RecordKind, usize)>>;

    async fn pending_count(&self) -> Result<usize> {
        Ok(self
            .pending_by_kind()
            .await?
            .into_iter()
            .map(|(_, count)| count)
            .sum())
    }
}

/// Persistence for the conflict list.
#[async_trait]
pub trait ConflictStore: Send + Sync {
    /// Stored conflicts; missing or unreadable storage yields an empty list.
    async fn load(&self) -> Result<Vec<SyncConflict>>;

    /// Insert or update one conflict by id.
    async fn save(&self, conflict: &SyncConflict) -> Result<()>;

    /// Replace the stored list in one write.
    async fn replace_all(&self, conflicts: &[SyncConflict]) -> Result<()>;
}
