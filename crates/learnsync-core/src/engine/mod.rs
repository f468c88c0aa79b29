//! Sync orchestrator
//!
//! [`SyncManager`] runs synchronization passes over the local queue, one at a
//! time. A pass walks the record kinds in a fixed order, pushes every unsynced
//! record, routes 409 replies to conflict handling and every other failure to
//! the error ledger. Passes start from the periodic timer, from the
//! connectivity monitor when the device comes back online, or on request.

mod conflicts;
mod retry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::config::SyncSettings;
use crate::connectivity::{ConnectivityMonitor, SyncTrigger};
use crate::error::Result;
use crate::events::{
    EventBus, EventKind, EventPayload, Listener, ListenerId, ProgressUpdate, SyncComplete,
};
use crate::ledger::ErrorLedger;
use crate::models::{RecordKind, SyncConflict, SyncError, SyncRecord, SyncStatus};
use crate::remote::{HealthProbe, HttpRemote, PushMode, PushOutcome, RemoteApi};
use crate::store::{ConflictStore, LocalQueue};
use crate::util::percent;

/// Collaborators injected into a [`SyncManager`].
pub struct SyncDependencies {
    pub queue: Arc<dyn LocalQueue>,
    pub conflict_store: Arc<dyn ConflictStore>,
    pub remote: Arc<dyn RemoteApi>,
    pub probe: Arc<dyn HealthProbe>,
    pub clock: Arc<dyn Clock>,
    /// Connectivity assumed until the first native signal or probe
    pub initially_online: bool,
}

impl SyncDependencies {
    /// Dependencies talking to the configured API over HTTP.
    pub fn http(
        settings: &SyncSettings,
        queue: Arc<dyn LocalQueue>,
        conflict_store: Arc<dyn ConflictStore>,
    ) -> Result<Self> {
        let remote = Arc::new(HttpRemote::new(settings)?);
        Ok(Self {
            queue,
            conflict_store,
            remote: Arc::clone(&remote) as Arc<dyn RemoteApi>,
            probe: remote,
            clock: Arc::new(SystemClock),
            initially_online: false,
        })
    }
}

#[derive(Debug, Default)]
struct PassState {
    last_sync_time: Option<DateTime<Utc>>,
    pending_items: usize,
    sync_progress: u8,
}

struct SyncInner {
    settings: SyncSettings,
    queue: Arc<dyn LocalQueue>,
    conflict_store: Arc<dyn ConflictStore>,
    remote: Arc<dyn RemoteApi>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    connectivity: Arc<ConnectivityMonitor>,
    is_syncing: AtomicBool,
    started: AtomicBool,
    state: Mutex<PassState>,
    conflicts: Mutex<Vec<SyncConflict>>,
    /// Held while the conflict list is changed and persisted, so the stored
    /// copy follows the same order of updates as the in-memory one.
    conflict_writes: tokio::sync::Mutex<()>,
    ledger: Mutex<ErrorLedger>,
    triggers: Mutex<Option<mpsc::UnboundedReceiver<SyncTrigger>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the syncing flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Offline sync engine handle. Clones share one engine.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<SyncInner>,
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("settings", &self.inner.settings)
            .field("status", &self.get_sync_status())
            .finish_non_exhaustive()
    }
}

impl SyncManager {
    /// Build an engine and load persisted conflicts. Background work starts
    /// with [`start`](Self::start).
    pub async fn new(settings: SyncSettings, deps: SyncDependencies) -> Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let events = EventBus::new();
        let connectivity = Arc::new(ConnectivityMonitor::new(
            deps.initially_online,
            deps.probe,
            settings.probe_timeout,
            events.clone(),
            Arc::clone(&deps.clock),
            sender,
        ));

        let conflicts = deps.conflict_store.load().await?;
        if !conflicts.is_empty() {
            tracing::info!("Loaded {} stored conflicts", conflicts.len());
        }

        let inner = Arc::new(SyncInner {
            settings,
            queue: deps.queue,
            conflict_store: deps.conflict_store,
            remote: deps.remote,
            clock: deps.clock,
            events,
            connectivity,
            is_syncing: AtomicBool::new(false),
            started: AtomicBool::new(false),
            state: Mutex::new(PassState::default()),
            conflicts: Mutex::new(conflicts),
            conflict_writes: tokio::sync::Mutex::new(()),
            ledger: Mutex::new(ErrorLedger::new()),
            triggers: Mutex::new(Some(receiver)),
            tasks: Mutex::new(Vec::new()),
        });
        inner.refresh_pending().await;

        Ok(Self { inner })
    }

    /// Start the periodic timer, the health probe, and reconnect-triggered
    /// passes. Calling it again has no effect.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(receiver) = lock(&self.inner.triggers).take() else {
            return;
        };

        let mut tasks = lock(&self.inner.tasks);
        tasks.push(spawn_trigger_loop(Arc::downgrade(&self.inner), receiver));
        tasks.push(spawn_periodic_loop(
            Arc::downgrade(&self.inner),
            self.inner.settings.sync_interval,
        ));
        tasks.push(
            self.inner
                .connectivity
                .spawn_probe_loop(self.inner.settings.probe_interval),
        );
        tracing::info!(
            "Sync engine started (interval {:?}, probe every {:?})",
            self.inner.settings.sync_interval,
            self.inner.settings.probe_interval
        );
    }

    /// Snapshot of the engine state.
    pub fn get_sync_status(&self) -> SyncStatus {
        let state = lock(&self.inner.state);
        SyncStatus {
            is_online: self.inner.connectivity.is_online(),
            is_syncing: self.inner.is_syncing.load(Ordering::SeqCst),
            last_sync_time: state.last_sync_time,
            pending_items: state.pending_items,
            failed_items: lock(&self.inner.ledger).len(),
            sync_progress: state.sync_progress,
        }
    }

    pub fn get_conflicts(&self) -> Vec<SyncConflict> {
        lock(&self.inner.conflicts).clone()
    }

    pub fn get_errors(&self) -> Vec<SyncError> {
        lock(&self.inner.ledger).errors().to_vec()
    }

    /// Run a pass now. Returns `false` when a pass was already running and
    /// this request was ignored.
    pub async fn force_sync(&self) -> bool {
        self.inner.run_pass(SyncTrigger::Manual).await
    }

    /// Settle a conflict manually.
    ///
    /// Returns `false` when the conflict stays unresolved, which is the case
    /// for [`ConflictResolution::Merge`](crate::ConflictResolution::Merge).
    /// Resolving an already resolved conflict is a no-op.
    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        resolution: crate::ConflictResolution,
    ) -> Result<bool> {
        self.inner.resolve_conflict(conflict_id, resolution).await
    }

    /// Drop every resolved conflict from memory and storage.
    pub async fn clear_resolved_conflicts(&self) -> Result<usize> {
        self.inner.clear_resolved_conflicts().await
    }

    /// Cancel scheduled retries and empty the error ledger.
    pub fn clear_errors(&self) -> usize {
        let removed = lock(&self.inner.ledger).clear();
        tracing::info!("Cleared {removed} sync errors");
        removed
    }

    pub fn add_event_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        self.inner.events.subscribe(kind, listener)
    }

    pub fn remove_event_listener(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.events.unsubscribe(kind, id)
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.inner.connectivity
    }

    /// Hard stop: abort background loops and retry timers and drop all
    /// listeners. A pass already in flight runs to completion.
    pub fn destroy(&self) {
        for task in lock(&self.inner.tasks).drain(..) {
            task.abort();
        }
        lock(&self.inner.ledger).cancel_timers();
        self.inner.events.clear();
        self.inner.started.store(true, Ordering::SeqCst);
        tracing::info!("Sync engine stopped");
    }
}

fn spawn_trigger_loop(
    inner: Weak<SyncInner>,
    mut receiver: mpsc::UnboundedReceiver<SyncTrigger>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(trigger) = receiver.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            tokio::spawn(async move {
                inner.run_pass(trigger).await;
            });
        }
    })
}

fn spawn_periodic_loop(inner: Weak<SyncInner>, interval: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            if inner.connectivity.is_online() && !inner.is_syncing.load(Ordering::SeqCst) {
                inner.run_pass(SyncTrigger::Periodic).await;
            }
        }
    })
}

impl SyncInner {
    fn publish(&self, payload: EventPayload) {
        self.events.publish(payload, self.clock.now());
    }

    fn set_progress(&self, progress: u8) {
        lock(&self.state).sync_progress = progress;
    }

    async fn refresh_pending(&self) {
        match self.queue.pending_count().await {
            Ok(pending) => lock(&self.state).pending_items = pending,
            Err(error) => tracing::warn!("Could not count pending records: {error}"),
        }
    }

    async fn run_pass(self: &Arc<Self>, trigger: SyncTrigger) -> bool {
        if self
            .is_syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(?trigger, "Sync already in progress; request ignored");
            return false;
        }
        let _guard = PassGuard(&self.is_syncing);

        tracing::info!(?trigger, "Sync pass started");
        self.set_progress(0);

        match self.sync_all_kinds().await {
            Ok(()) => {
                self.refresh_pending().await;
                let now = self.clock.now();
                lock(&self.state).last_sync_time = Some(now);
                let conflict_count = lock(&self.conflicts).len();
                let error_count = lock(&self.ledger).len();
                self.publish(EventPayload::SyncComplete(SyncComplete {
                    timestamp: now,
                    conflict_count,
                    error_count,
                }));
                tracing::info!(
                    "Sync pass finished ({conflict_count} conflicts, {error_count} errors)"
                );
            }
            Err(error) => {
                tracing::error!("Sync pass aborted: {error}");
                self.record_failure("sync", None, &error);
            }
        }

        // Reported as complete even when some kinds failed.
        self.set_progress(100);
        true
    }

    async fn sync_all_kinds(self: &Arc<Self>) -> Result<()> {
        let total = RecordKind::ALL.len();
        for (index, kind) in RecordKind::ALL.into_iter().enumerate() {
            let records = self.queue.unsynced(kind).await?;
            if !records.is_empty() {
                tracing::debug!("Syncing {} {}", records.len(), kind.task_name());
            }

            for record in records {
                if let Err(error) = self.sync_record(&record).await {
                    self.record_failure(kind.task_name(), Some(record), &error);
                }
            }

            let completed = index + 1;
            let progress = percent(completed, total);
            self.set_progress(progress);
            self.publish(EventPayload::ProgressUpdate(ProgressUpdate {
                progress,
                current_task: kind.task_name().to_string(),
                completed_tasks: completed,
                total_tasks: total,
            }));
        }
        Ok(())
    }

    /// Push one record and settle the reply.
    async fn sync_record(self: &Arc<Self>, record: &SyncRecord) -> Result<()> {
        match self.remote.push(record, PushMode::Upsert).await? {
            PushOutcome::Accepted => {
                self.queue.mark_synced(record.kind(), record.id()).await?;
                tracing::debug!("Synced {} {}", record.kind(), record.id());
                Ok(())
            }
            PushOutcome::Conflict(server) => self.handle_conflict(record, server).await,
        }
    }
}
