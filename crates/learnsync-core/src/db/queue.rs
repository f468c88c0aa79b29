//! libSQL implementation of the offline record queue

use async_trait::async_trait;
use chrono::Utc;

use super::SharedDatabase;
use crate::error::{Error, Result};
use crate::models::{RecordKind, SyncRecord};
use crate::store::LocalQueue;

/// Offline queue persisted in the `offline_records` table.
///
/// The `synced` column is authoritative; the flag inside the stored payload
/// is overwritten when rows are read back.
#[derive(Debug, Clone)]
pub struct LibSqlLocalQueue {
    db: SharedDatabase,
}

impl LibSqlLocalQueue {
    pub const fn new(db: SharedDatabase) -> Self {
        Self { db }
    }
}

fn not_found(kind: RecordKind, id: &str) -> Error {
    Error::RecordNotFound(format!("{kind} {id}"))
}

fn encode(record: &SyncRecord) -> Result<String> {
    let mut payload = record.payload()?;
    if let Some(fields) = payload.as_object_mut() {
        fields.remove("synced");
    }
    Ok(serde_json::to_string(&payload)?)
}

#[async_trait]
impl LocalQueue for LibSqlLocalQueue {
    async fn enqueue(&self, record: SyncRecord) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let kind = record.kind();

        let mut rows = conn
            .query(
                "SELECT 1 FROM offline_records WHERE kind = ? AND id = ?",
                libsql::params![kind.as_str(), record.id()],
            )
            .await?;
        if rows.next().await?.is_some() {
            return Err(Error::InvalidInput(format!(
                "{kind} {} is already queued",
                record.id()
            )));
        }

        conn.execute(
            "INSERT INTO offline_records (kind, id, payload, synced, queued_at)
             VALUES (?, ?, ?, 0, ?)",
            libsql::params![
                kind.as_str(),
                record.id(),
                encode(&record)?,
                Utc::now().timestamp_millis()
            ],
        )
        .await?;
        tracing::debug!("Queued {kind} {}", record.id());
        Ok(())
    }

    async fn unsynced(&self, kind: RecordKind) -> Result<Vec<SyncRecord>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT id, payload FROM offline_records
                 WHERE kind = ? AND synced = 0
                 ORDER BY queued_at, rowid",
                [kind.as_str()],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let payload: String = row.get(1)?;
            let parsed = serde_json::from_str(&payload)
                .map_err(Error::from)
                .and_then(|value| SyncRecord::from_payload(kind, value));
            match parsed {
                Ok(mut record) => {
                    record.set_synced(false);
                    records.push(record);
                }
                Err(error) => {
                    tracing::warn!("Skipping unreadable queued {kind} {id}: {error}");
                }
            }
        }
        Ok(records)
    }

    async fn mark_synced(&self, kind: RecordKind, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let updated = db
            .connection()
            .execute(
                "UPDATE offline_records SET synced = 1 WHERE kind = ? AND id = ?",
                libsql::params![kind.as_str(), id],
            )
            .await?;
        if updated == 0 {
            return Err(not_found(kind, id));
        }
        Ok(())
    }

    async fn is_synced(&self, kind: RecordKind, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT synced FROM offline_records WHERE kind = ? AND id = ?",
                libsql::params![kind.as_str(), id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? != 0),
            None => Ok(false),
        }
    }

    async fn apply_server_version(&self, record: &SyncRecord) -> Result<()> {
        let db = self.db.lock().await;
        let updated = db
            .connection()
            .execute(
                "UPDATE offline_records SET payload = ? WHERE kind = ? AND id = ?",
                libsql::params![encode(record)?, record.kind().as_str(), record.id()],
            )
            .await?;
        if updated == 0 {
            return Err(not_found(record.kind(), record.id()));
        }
        Ok(())
    }

    async fn pending_by_kind(&self) -> Result<Vec<(RecordKind, usize)>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT kind, COUNT(*) FROM offline_records WHERE synced = 0 GROUP BY kind",
                (),
            )
            .await?;

        let mut counts: Vec<(RecordKind, usize)> =
            RecordKind::ALL.iter().map(|kind| (*kind, 0)).collect();
        while let Some(row) = rows.next().await? {
            let kind: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let Ok(kind) = kind.parse::<RecordKind>() else {
                tracing::warn!("Ignoring queued rows of unknown kind {kind}");
                continue;
            };
            if let Some(slot) = counts.iter_mut().find(|(slot_kind, _)| *slot_kind == kind) {
                slot.1 = usize::try_from(count).unwrap_or_default();
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{shared, Database};
    use crate::models::{Achievement, ProgressEntry};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn setup() -> LibSqlLocalQueue {
        let db = Database::open_in_memory().await.unwrap();
        LibSqlLocalQueue::new(shared(db))
    }

    fn achievement(id: &str) -> SyncRecord {
        SyncRecord::Achievement(Achievement {
            id: id.to_string(),
            achievement_id: "first-quiz".to_string(),
            unlocked_at: Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap(),
            synced: false,
        })
    }

    fn progress(id: &str) -> SyncRecord {
        SyncRecord::Progress(ProgressEntry {
            id: id.to_string(),
            subject: "history".to_string(),
            topic: "rome".to_string(),
            cognitive_level: "remember".to_string(),
            completion_percentage: 30.0,
            time_spent_secs: 900,
            mastery_level: 0.2,
            last_accessed: Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap(),
            synced: true,
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enqueue_stores_records_unsynced_in_order() {
        let queue = setup().await;
        queue.enqueue(achievement("a-1")).await.unwrap();
        queue.enqueue(achievement("a-2")).await.unwrap();
        queue.enqueue(progress("p-1")).await.unwrap();

        let ids: Vec<String> = queue
            .unsynced(RecordKind::Achievement)
            .await
            .unwrap()
            .iter()
            .map(|record| record.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a-1", "a-2"]);

        // Enqueue ignores the incoming flag
        let pending = queue.unsynced(RecordKind::Progress).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].is_synced());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enqueue_rejects_duplicates() {
        let queue = setup().await;
        queue.enqueue(achievement("a-1")).await.unwrap();
        let error = queue.enqueue(achievement("a-1")).await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_synced_twice_is_noop() {
        let queue = setup().await;
        queue.enqueue(achievement("a-1")).await.unwrap();

        queue.mark_synced(RecordKind::Achievement, "a-1").await.unwrap();
        queue.mark_synced(RecordKind::Achievement, "a-1").await.unwrap();

        assert!(queue.is_synced(RecordKind::Achievement, "a-1").await.unwrap());
        assert!(queue.unsynced(RecordKind::Achievement).await.unwrap().is_empty());
        assert_eq!(queue.pending_count().await.unwrap(), 0);

        let error = queue
            .mark_synced(RecordKind::Achievement, "missing")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::RecordNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_apply_server_version_rewrites_payload() {
        let queue = setup().await;
        queue.enqueue(progress("p-1")).await.unwrap();

        let server = progress("p-1")
            .with_server_version(&json!({"completion_percentage": 95.0}))
            .unwrap();
        queue.apply_server_version(&server).await.unwrap();

        let pending = queue.unsynced(RecordKind::Progress).await.unwrap();
        let SyncRecord::Progress(entry) = &pending[0] else {
            panic!("unexpected kind");
        };
        assert!((entry.completion_percentage - 95.0).abs() < f64::EPSILON);

        let error = queue
            .apply_server_version(&progress("p-404"))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::RecordNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pending_by_kind_includes_empty_kinds() {
        let queue = setup().await;
        queue.enqueue(achievement("a-1")).await.unwrap();
        queue.enqueue(progress("p-1")).await.unwrap();
        queue.mark_synced(RecordKind::Progress, "p-1").await.unwrap();

        assert_eq!(
            queue.pending_by_kind().await.unwrap(),
            vec![
                (RecordKind::QuizAttempt, 0),
                (RecordKind::Progress, 0),
                (RecordKind::ChatMessage, 0),
                (RecordKind::Achievement, 1),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreadable_rows_are_skipped() {
        let queue = setup().await;
        queue.enqueue(achievement("a-1")).await.unwrap();
        {
            let db = queue.db.lock().await;
            db.connection()
                .execute(
                    "INSERT INTO offline_records (kind, id, payload, synced, queued_at)
                     VALUES ('achievement', 'broken', '{not json', 0, 0)",
                    (),
                )
                .await
                .unwrap();
        }

        let pending = queue.unsynced(RecordKind::Achievement).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id(), "a-1");
    }
}
