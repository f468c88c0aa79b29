//! Conflict detection and resolution

use std::sync::Arc;

use serde_json::Value;

use super::{lock, SyncInner};
use crate::error::{Error, Result};
use crate::events::EventPayload;
use crate::models::{
    progress_winner, ConflictResolution, ProgressSnapshot, RecordKind, SyncConflict, SyncRecord,
};
use crate::remote::{PushMode, PushOutcome};

impl SyncInner {
    /// Settle a 409 reply for `record`.
    pub(super) async fn handle_conflict(
        self: &Arc<Self>,
        record: &SyncRecord,
        server: Value,
    ) -> Result<()> {
        match record.kind() {
            // The server already holds these; nothing to reconcile.
            RecordKind::ChatMessage | RecordKind::Achievement => {
                tracing::debug!(
                    "{} {} already exists on the server",
                    record.kind(),
                    record.id()
                );
                self.queue.mark_synced(record.kind(), record.id()).await
            }
            RecordKind::QuizAttempt | RecordKind::Progress => {
                let conflict = self.register_conflict(record, server).await?;
                self.auto_resolve(&conflict).await
            }
        }
    }

    /// Store a conflict and announce it. A record that already has an
    /// unresolved conflict keeps that entry, refreshed with the new versions
    /// and detection time.
    async fn register_conflict(&self, record: &SyncRecord, server: Value) -> Result<SyncConflict> {
        let writing = self.conflict_writes.lock().await;
        let detected_at = self.clock.now();
        let (conflict, is_new) = {
            let mut conflicts = lock(&self.conflicts);
            if let Some(existing) = conflicts
                .iter_mut()
                .find(|conflict| !conflict.resolved && conflict.is_for(record))
            {
                existing.local_data = record.clone();
                existing.server_data = server;
                existing.detected_at = detected_at;
                (existing.clone(), false)
            } else {
                let conflict = SyncConflict::new(record.clone(), server, detected_at);
                conflicts.push(conflict.clone());
                (conflict, true)
            }
        };

        self.conflict_store.save(&conflict).await?;
        drop(writing);

        if is_new {
            tracing::info!(
                "Conflict detected for {} {} ({})",
                conflict.kind,
                conflict.record_id,
                conflict.id
            );
            self.publish(EventPayload::ConflictDetected(conflict.clone()));
        }
        Ok(conflict)
    }

    async fn auto_resolve(self: &Arc<Self>, conflict: &SyncConflict) -> Result<()> {
        match &conflict.local_data {
            // A retaken quiz is a second legitimate attempt; keep both.
            SyncRecord::QuizAttempt(_) => {
                self.queue
                    .mark_synced(conflict.kind, &conflict.record_id)
                    .await?;
                self.mark_resolved(&conflict.id, None).await
            }
            SyncRecord::Progress(local) => {
                let winner = ProgressSnapshot::from_server(&conflict.server_data)
                    .and_then(|server| progress_winner(local, &server));
                match winner {
                    Some(resolution) => {
                        tracing::debug!("Auto-resolving {} with {resolution}", conflict.id);
                        self.apply_resolution(conflict, resolution).await?;
                    }
                    None => tracing::warn!(
                        "Conflict {} needs a manual resolution",
                        conflict.id
                    ),
                }
                Ok(())
            }
            SyncRecord::ChatMessage(_) | SyncRecord::Achievement(_) => Ok(()),
        }
    }

    /// Perform the one-sided update for `resolution` and mark the conflict
    /// resolved. Returns `false` when nothing was applied.
    async fn apply_resolution(
        &self,
        conflict: &SyncConflict,
        resolution: ConflictResolution,
    ) -> Result<bool> {
        match resolution {
            ConflictResolution::Local => {
                let outcome = self
                    .remote
                    .push(&conflict.local_data, PushMode::Overwrite)
                    .await?;
                if let PushOutcome::Conflict(_) = outcome {
                    return Err(Error::InvalidServerData(format!(
                        "server refused to overwrite {} {} (conflict)",
                        conflict.kind, conflict.record_id
                    )));
                }
                self.queue
                    .mark_synced(conflict.kind, &conflict.record_id)
                    .await?;
            }
            ConflictResolution::Server => {
                let updated = conflict
                    .local_data
                    .with_server_version(&conflict.server_data)?;
                self.queue.apply_server_version(&updated).await?;
                self.queue
                    .mark_synced(conflict.kind, &conflict.record_id)
                    .await?;
            }
            ConflictResolution::Merge => {
                tracing::warn!(
                    "Merge resolution is not supported; conflict {} stays unresolved",
                    conflict.id
                );
                return Ok(false);
            }
        }

        self.mark_resolved(&conflict.id, Some(resolution)).await?;
        tracing::info!("Resolved conflict {} ({resolution})", conflict.id);
        Ok(true)
    }

    async fn mark_resolved(
        &self,
        conflict_id: &str,
        resolution: Option<ConflictResolution>,
    ) -> Result<()> {
        let _writing = self.conflict_writes.lock().await;
        let updated = {
            let mut conflicts = lock(&self.conflicts);
            conflicts
                .iter_mut()
                .find(|conflict| conflict.id == conflict_id)
                .map(|conflict| {
                    conflict.resolved = true;
                    conflict.resolution = resolution;
                    conflict.clone()
                })
        };
        match updated {
            Some(conflict) => self.conflict_store.save(&conflict).await,
            None => Err(Error::ConflictNotFound(conflict_id.to_string())),
        }
    }

    pub(super) async fn resolve_conflict(
        &self,
        conflict_id: &str,
        resolution: ConflictResolution,
    ) -> Result<bool> {
        let conflict = lock(&self.conflicts)
            .iter()
            .find(|conflict| conflict.id == conflict_id)
            .cloned()
            .ok_or_else(|| Error::ConflictNotFound(conflict_id.to_string()))?;
        if conflict.resolved {
            tracing::debug!("Conflict {conflict_id} is already resolved");
            return Ok(true);
        }

        let applied = self.apply_resolution(&conflict, resolution).await?;
        if applied {
            self.refresh_pending().await;
        }
        Ok(applied)
    }

    pub(super) async fn clear_resolved_conflicts(&self) -> Result<usize> {
        let _writing = self.conflict_writes.lock().await;
        let remaining: Vec<SyncConflict> = lock(&self.conflicts)
            .iter()
            .filter(|conflict| !conflict.resolved)
            .cloned()
            .collect();
        self.conflict_store.replace_all(&remaining).await?;

        let removed = {
            let mut conflicts = lock(&self.conflicts);
            let before = conflicts.len();
            conflicts.retain(|conflict| !conflict.resolved);
            before - conflicts.len()
        };
        tracing::info!("Cleared {removed} resolved conflicts");
        Ok(removed)
    }
}
