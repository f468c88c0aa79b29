//! In-memory queue and conflict store

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{ConflictStore, LocalQueue};
use crate::error::{Error, Result};
use crate::models::{RecordKind, SyncConflict, SyncRecord};

/// FIFO queue held in process memory.
#[derive(Debug, Default)]
pub struct MemoryLocalQueue {
    records: Mutex<Vec<SyncRecord>>,
}

impl MemoryLocalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue pre-populated with `records`, in order.
    pub fn with_records(records: impl IntoIterator<Item = SyncRecord>) -> Self {
        Self {
            records: Mutex::new(records.into_iter().collect()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SyncRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current copy of a record.
    pub fn get(&self, kind: RecordKind, id: &str) -> Option<SyncRecord> {
        self.lock()
            .iter()
            .find(|record| record.kind() == kind && record.id() == id)
            .cloned()
    }

    pub fn records(&self) -> Vec<SyncRecord> {
        self.lock().clone()
    }
}

fn not_found(kind: RecordKind, id: &str) -> Error {
    Error::RecordNotFound(format!("{kind} {id}"))
}

#[async_trait]
impl LocalQueue for MemoryLocalQueue {
    async fn enqueue(&self, mut record: SyncRecord) -> Result<()> {
        let mut records = self.lock();
        if records
            .iter()
            .any(|queued| queued.kind() == record.kind() && queued.id() == record.id())
        {
            return Err(Error::InvalidInput(format!(
                "{} {} is already queued",
                record.kind(),
                record.id()
            )));
        }
        record.set_synced(false);
        records.push(record);
        Ok(())
    }

    async fn unsynced(&self, kind: RecordKind) -> Result<Vec<SyncRecord>> {
        Ok(self
            .lock()
            .iter()
            .filter(|record| record.kind() == kind && !record.is_synced())
            .cloned()
            .collect())
    }

    async fn mark_synced(&self, kind: RecordKind, id: &str) -> Result<()> {
        let mut records = self.lock();
        let record = records
            .iter_mut()
            .find(|record| record.kind() == kind && record.id() == id)
            .ok_or_else(|| not_found(kind, id))?;
        record.set_synced(true);
        Ok(())
    }

    async fn is_synced(&self, kind: RecordKind, id: &str) -> Result<bool> {
        Ok(self
            .get(kind, id)
            .is_some_and(|record| record.is_synced()))
    }

    async fn apply_server_version(&self, record: &SyncRecord) -> Result<()> {
        let mut records = self.lock();
        let stored = records
            .iter_mut()
            .find(|stored| stored.kind() == record.kind() && stored.id() == record.id())
            .ok_or_else(|| not_found(record.kind(), record.id()))?;
        let synced = stored.is_synced();
        *stored = record.clone();
        stored.set_synced(synced);
        Ok(())
    }

    async fn pending_by_kind(&self) -> Result<Vec<(RecordKind, usize)>> {
        let records = self.lock();
        Ok(RecordKind::ALL
            .iter()
            .map(|kind| {
                let count = records
                    .iter()
                    .filter(|record| record.kind() == *kind && !record.is_synced())
                    .count();
                (*kind, count)
            })
            .collect())
    }
}

/// Conflict list held in process memory.
#[derive(Debug, Default)]
pub struct MemoryConflictStore {
    conflicts: Mutex<Vec<SyncConflict>>,
}

impl MemoryConflictStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SyncConflict>> {
        self.conflicts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Vec<SyncConflict> {
        self.lock().clone()
    }
}

#[async_trait]
impl ConflictStore for MemoryConflictStore {
    async fn load(&self) -> Result<Vec<SyncConflict>> {
        Ok(self.snapshot())
    }

    async fn save(&self, conflict: &SyncConflict) -> Result<()> {
        let mut conflicts = self.lock();
        match conflicts.iter_mut().find(|stored| stored.id == conflict.id) {
            Some(stored) => *stored = conflict.clone(),
            None => conflicts.push(conflict.clone()),
        }
        Ok(())
    }

    async fn replace_all(&self, conflicts: &[SyncConflict]) -> Result<()> {
        *self.lock() = conflicts.to_vec();
        Ok(())
    }
}
