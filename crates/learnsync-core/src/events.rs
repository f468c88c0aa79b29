//! Typed publish/subscribe bus for sync lifecycle events.
//!
//! Observers (dashboards, status badges, the CLI `watch` command) subscribe
//! per [`EventKind`] instead of polling. A listener that panics is logged and
//! skipped; the remaining listeners still receive the event.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{SyncConflict, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    StatusChange,
    ProgressUpdate,
    ConflictDetected,
    SyncComplete,
    SyncError,
}

impl EventKind {
    pub const ALL: [Self; 5] = [
        Self::StatusChange,
        Self::ProgressUpdate,
        Self::ConflictDetected,
        Self::SyncComplete,
        Self::SyncError,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StatusChange => "status-change",
            Self::ProgressUpdate => "progress-update",
            Self::ConflictDetected => "conflict-detected",
            Self::SyncComplete => "sync-complete",
            Self::SyncError => "sync-error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connectivity transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub is_online: bool,
    pub was_online: bool,
    pub timestamp: DateTime<Utc>,
}

/// Coarse pass progress, advanced once per record kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub progress: u8,
    pub current_task: String,
    pub completed_tasks: usize,
    pub total_tasks: usize,
}

/// Summary published when a pass finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncComplete {
    pub timestamp: DateTime<Utc>,
    pub conflict_count: usize,
    pub error_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    StatusChange(StatusChange),
    ProgressUpdate(ProgressUpdate),
    ConflictDetected(SyncConflict),
    SyncComplete(SyncComplete),
    SyncError(SyncError),
}

impl EventPayload {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::StatusChange(_) => EventKind::StatusChange,
            Self::ProgressUpdate(_) => EventKind::ProgressUpdate,
            Self::ConflictDetected(_) => EventKind::ConflictDetected,
            Self::SyncComplete(_) => EventKind::SyncComplete,
            Self::SyncError(_) => EventKind::SyncError,
        }
    }
}

/// Envelope delivered to listeners: `{type, data, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: EventPayload,
    pub timestamp: DateTime<Utc>,
}

impl SyncEvent {
    pub fn new(data: EventPayload, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: data.kind(),
            data,
            timestamp,
        }
    }
}

pub type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
}

/// Cloneable handle to a shared listener registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        let counts: HashMap<_, _> = registry
            .listeners
            .iter()
            .map(|(kind, listeners)| (*kind, listeners.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `listener` for `kind`.
    ///
    /// Registering the same `Arc` twice for one kind returns the existing id.
    pub fn subscribe(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let mut registry = self.lock();
        let existing = registry.listeners.get(&kind).and_then(|listeners| {
            listeners
                .iter()
                .find(|(_, registered)| same_listener(registered, &listener))
                .map(|(id, _)| *id)
        });
        if let Some(id) = existing {
            return id;
        }

        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry
            .listeners
            .entry(kind)
            .or_default()
            .push((id, listener));
        id
    }

    /// Convenience wrapper around [`subscribe`](Self::subscribe) for closures.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.subscribe(kind, Arc::new(listener))
    }

    /// Remove a listener. Returns `false` when it was not registered.
    pub fn unsubscribe(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut registry = self.lock();
        let Some(listeners) = registry.listeners.get_mut(&kind) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        before != listeners.len()
    }

    /// Deliver an event to every listener of its kind, in registration order.
    ///
    /// Returns the number of listeners that handled it without panicking.
    pub fn publish(&self, data: EventPayload, timestamp: DateTime<Utc>) -> usize {
        let event = SyncEvent::new(data, timestamp);
        let listeners: Vec<(ListenerId, Listener)> = self
            .lock()
            .listeners
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!(
                        event = %event.kind,
                        listener = id.0,
                        "Event listener panicked; continuing with remaining listeners"
                    );
                }
            }
        }
        delivered
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Drop every registered listener.
    pub fn clear(&self) {
        self.lock().listeners.clear();
    }
}

fn same_listener(left: &Listener, right: &Listener) -> bool {
    std::ptr::eq(
        Arc::as_ptr(left).cast::<()>(),
        Arc::as_ptr(right).cast::<()>(),
    )
}
