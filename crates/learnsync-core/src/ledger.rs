//! Error ledger
//!
//! Holds every failed sync call until a retry succeeds or the user clears it,
//! together with the timers of the retries currently scheduled.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::models::{SyncError, SyncRecord};

#[derive(Debug, Default)]
pub struct ErrorLedger {
    errors: Vec<SyncError>,
    timers: HashMap<String, JoinHandle<()>>,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: SyncError) {
        self.errors.push(error);
    }

    /// Entries in detection order.
    pub fn errors(&self) -> &[SyncError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SyncError> {
        self.errors.iter().find(|error| error.id == id)
    }

    /// Drop an entry and any timer still pending for it.
    pub fn remove(&mut self, id: &str) -> Option<SyncError> {
        if let Some(timer) = self.timers.remove(id) {
            timer.abort();
        }
        let index = self.errors.iter().position(|error| error.id == id)?;
        Some(self.errors.remove(index))
    }

    /// Start a retry attempt: bump the retry count and hand back the attempt
    /// number with the record to re-send.
    ///
    /// The caller is the timer task itself, so its handle is forgotten rather
    /// than aborted.
    pub fn begin_retry(&mut self, id: &str) -> Option<(u32, SyncRecord)> {
        self.timers.remove(id);
        let error = self.errors.iter_mut().find(|error| error.id == id)?;
        let record = error.record.clone()?;
        error.retry_count += 1;
        Some((error.retry_count, record))
    }

    /// Store the latest failure message of an entry.
    pub fn note_failure(&mut self, id: &str, message: impl Into<String>) {
        if let Some(error) = self.errors.iter_mut().find(|error| error.id == id) {
            error.message = message.into();
        }
    }

    pub fn can_retry(&self, id: &str) -> bool {
        self.get(id).is_some_and(SyncError::can_retry)
    }

    /// Run `retry` after `delay`, tracking the timer under the entry id.
    pub fn schedule<F>(&mut self, id: &str, delay: Duration, retry: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            retry.await;
        });
        if let Some(previous) = self.timers.insert(id.to_string(), handle) {
            previous.abort();
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Abort every scheduled retry, keeping the entries.
    pub fn cancel_timers(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }

    /// Abort every scheduled retry and empty the ledger.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&mut self) -> usize {
        self.cancel_timers();
        let removed = self.errors.len();
        self.errors.clear();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Achievement, ErrorCategory};
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn network_error() -> SyncError {
        SyncError::new(
            "achievements",
            ErrorCategory::Network,
            "Network error: offline",
            Some(SyncRecord::Achievement(Achievement {
                id: "a-1".to_string(),
                achievement_id: "streak-7".to_string(),
                unlocked_at: Utc::now(),
                synced: false,
            })),
            Utc::now(),
        )
    }

    #[test]
    fn begin_retry_counts_attempts() {
        let mut ledger = ErrorLedger::new();
        let error = network_error();
        let id = error.id.clone();
        ledger.record(error);

        let (attempt, record) = ledger.begin_retry(&id).unwrap();
        assert_eq!(attempt, 1);
        assert_eq!(record.id(), "a-1");
        assert!(ledger.can_retry(&id));

        ledger.begin_retry(&id);
        ledger.begin_retry(&id);
        assert_eq!(ledger.get(&id).unwrap().retry_count, 3);
        assert!(!ledger.can_retry(&id));
    }

    #[test]
    fn begin_retry_needs_a_record() {
        let mut ledger = ErrorLedger::new();
        let error = SyncError::new("sync", ErrorCategory::Server, "boom", None, Utc::now());
        let id = error.id.clone();
        ledger.record(error);
        assert!(ledger.begin_retry(&id).is_none());
        assert!(ledger.begin_retry("missing").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_timers() {
        let mut ledger = ErrorLedger::new();
        let error = network_error();
        let id = error.id.clone();
        ledger.record(error);

        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        ledger.schedule(&id, Duration::from_secs(1), async move {
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(ledger.pending_timers(), 1);

        assert_eq!(ledger.clear(), 1);
        assert!(ledger.is_empty());
        assert_eq!(ledger.pending_timers(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
