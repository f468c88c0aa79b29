//! libSQL implementation of the conflict store

use async_trait::async_trait;

use super::{Database, SharedDatabase};
use crate::error::Result;
use crate::models::SyncConflict;
use crate::store::ConflictStore;

/// `sync_state` key holding the conflict list as JSON.
pub const CONFLICTS_KEY: &str = "sync_conflicts";

/// Conflict list stored as one JSON document in `sync_state`.
#[derive(Debug, Clone)]
pub struct LibSqlConflictStore {
    db: SharedDatabase,
}

impl LibSqlConflictStore {
    pub const fn new(db: SharedDatabase) -> Self {
        Self { db }
    }
}

async fn read(db: &Database) -> Result<Vec<SyncConflict>> {
    let mut rows = db
        .connection()
        .query("SELECT value FROM sync_state WHERE key = ?", [CONFLICTS_KEY])
        .await?;
    let Some(row) = rows.next().await? else {
        return Ok(Vec::new());
    };
    let value: String = row.get(0)?;
    match serde_json::from_str(&value) {
        Ok(conflicts) => Ok(conflicts),
        Err(error) => {
            tracing::warn!("Stored conflict list is unreadable, starting empty: {error}");
            Ok(Vec::new())
        }
    }
}

async fn write(db: &Database, conflicts: &[SyncConflict]) -> Result<()> {
    let value = serde_json::to_string(conflicts)?;
    db.connection()
        .execute(
            "INSERT OR REPLACE INTO sync_state (key, value) VALUES (?, ?)",
            [CONFLICTS_KEY, value.as_str()],
        )
        .await?;
    Ok(())
}

/// Upsert `conflict` into the stored list inside one transaction.
async fn upsert(db: &Database, conflict: &SyncConflict) -> Result<()> {
    let mut conflicts = read(db).await?;
    match conflicts.iter_mut().find(|stored| stored.id == conflict.id) {
        Some(stored) => *stored = conflict.clone(),
        None => conflicts.push(conflict.clone()),
    }
    write(db, &conflicts).await
}

#[async_trait]
impl ConflictStore for LibSqlConflictStore {
    async fn load(&self) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        read(&db).await
    }

    async fn save(&self, conflict: &SyncConflict) -> Result<()> {
        // The guard spans the read and the write so concurrent saves queue up.
        let db = self.db.lock().await;
        db.connection().execute("BEGIN IMMEDIATE", ()).await?;
        match upsert(&db, conflict).await {
            Ok(()) => {
                if let Err(error) = db.connection().execute("COMMIT", ()).await {
                    db.connection().execute("ROLLBACK", ()).await.ok();
                    return Err(error.into());
                }
                Ok(())
            }
            Err(error) => {
                db.connection().execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }

    async fn replace_all(&self, conflicts: &[SyncConflict]) -> Result<()> {
        let db = self.db.lock().await;
        write(&db, conflicts).await
    }
}
