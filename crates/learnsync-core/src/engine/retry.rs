//! Failure recording and retry scheduling

use std::sync::Arc;

use super::{lock, SyncInner};
use crate::error::Error;
use crate::events::EventPayload;
use crate::ledger::ErrorLedger;
use crate::models::{SyncError, SyncRecord};

impl SyncInner {
    /// Add a failure to the ledger, schedule its first retry when it is
    /// retryable, and publish it.
    pub(super) fn record_failure(
        self: &Arc<Self>,
        task: &str,
        record: Option<SyncRecord>,
        error: &Error,
    ) {
        let mut entry = SyncError::new(
            task,
            error.category(),
            error.to_string(),
            record,
            self.clock.now(),
        );
        entry.max_retries = self.settings.max_retries;
        tracing::warn!(task, category = %entry.category, "Sync failed: {}", entry.message);

        let published = entry.clone();
        {
            let mut ledger = lock(&self.ledger);
            let retry = entry.can_retry();
            let id = entry.id.clone();
            ledger.record(entry);
            if retry {
                self.schedule_retry(&mut ledger, &id, 0);
            }
        }
        self.publish(EventPayload::SyncError(published));
    }

    fn schedule_retry(self: &Arc<Self>, ledger: &mut ErrorLedger, error_id: &str, retry_count: u32) {
        let delay = self.settings.retry_delay(retry_count);
        tracing::debug!("Retrying {error_id} in {delay:?}");
        let inner = Arc::downgrade(self);
        let id = error_id.to_string();
        ledger.schedule(error_id, delay, async move {
            if let Some(inner) = inner.upgrade() {
                inner.retry(&id).await;
            }
        });
    }

    /// Re-send the record behind a ledger entry.
    async fn retry(self: &Arc<Self>, error_id: &str) {
        let started = lock(&self.ledger).begin_retry(error_id);
        let Some((attempt, record)) = started else {
            return;
        };
        tracing::info!(
            "Retrying {} {} (attempt {attempt})",
            record.kind(),
            record.id()
        );

        // A later pass may already have delivered it.
        let outcome = match self.queue.is_synced(record.kind(), record.id()).await {
            Ok(true) => Ok(()),
            Ok(false) => self.sync_record(&record).await,
            Err(error) => Err(error),
        };

        match outcome {
            Ok(()) => {
                lock(&self.ledger).remove(error_id);
                self.refresh_pending().await;
                tracing::info!("Retry of {} {} succeeded", record.kind(), record.id());
            }
            Err(error) => {
                let mut ledger = lock(&self.ledger);
                ledger.note_failure(error_id, error.to_string());
                if ledger.can_retry(error_id) {
                    self.schedule_retry(&mut ledger, error_id, attempt);
                } else {
                    tracing::warn!(
                        "Giving up on {} {} after {attempt} retries: {error}",
                        record.kind(),
                        record.id()
                    );
                }
            }
        }
    }
}
