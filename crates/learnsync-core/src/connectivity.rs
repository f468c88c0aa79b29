//! Connectivity monitor
//!
//! Keeps one `online` flag fed by two sources: native online/offline signals
//! from the host and a periodic `HEAD` probe of the health endpoint. Either
//! source may flip the flag; every flip publishes a status-change event and a
//! false to true transition asks the sync engine for a pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::events::{EventBus, EventPayload, StatusChange};
use crate::remote::HealthProbe;

/// Why a sync pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Periodic,
    CameOnline,
    Manual,
}

/// Online/offline transition reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeSignal {
    Online,
    Offline,
}

pub struct ConnectivityMonitor {
    online: AtomicBool,
    probe: Arc<dyn HealthProbe>,
    probe_timeout: Duration,
    events: EventBus,
    clock: Arc<dyn Clock>,
    triggers: mpsc::UnboundedSender<SyncTrigger>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl ConnectivityMonitor {
    pub fn new(
        initially_online: bool,
        probe: Arc<dyn HealthProbe>,
        probe_timeout: Duration,
        events: EventBus,
        clock: Arc<dyn Clock>,
        triggers: mpsc::UnboundedSender<SyncTrigger>,
    ) -> Self {
        Self {
            online: AtomicBool::new(initially_online),
            probe,
            probe_timeout,
            events,
            clock,
            triggers,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Feed a native online/offline signal.
    pub fn handle_signal(&self, signal: NativeSignal) -> bool {
        self.apply(signal == NativeSignal::Online)
    }

    /// Probe the health endpoint once and apply the result.
    ///
    /// A probe that does not answer within the probe timeout counts as offline.
    pub async fn check_now(&self) -> bool {
        let reachable = tokio::time::timeout(self.probe_timeout, self.probe.probe())
            .await
            .unwrap_or(false);
        self.apply(reachable);
        reachable
    }

    /// Set the online flag. Returns `true` when the state changed.
    pub fn apply(&self, online: bool) -> bool {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return false;
        }

        if online {
            tracing::info!("Connection restored");
        } else {
            tracing::info!("Connection lost");
        }

        let now = self.clock.now();
        self.events.publish(
            EventPayload::StatusChange(StatusChange {
                is_online: online,
                was_online,
                timestamp: now,
            }),
            now,
        );

        if online && self.triggers.send(SyncTrigger::CameOnline).is_err() {
            tracing::debug!("Sync trigger channel closed; skipping reconnect sync");
        }
        true
    }

    /// Spawn the periodic health probe. The first probe runs one interval
    /// after start; the loop ends once the monitor is dropped.
    pub fn spawn_probe_loop(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let monitor: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                monitor.check_now().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct FixedProbe {
        reachable: AtomicBool,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedProbe {
        fn new(reachable: bool, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reachable: AtomicBool::new(reachable),
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HealthProbe for FixedProbe {
        async fn probe(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reachable.load(Ordering::SeqCst)
        }
    }

    fn monitor(
        online: bool,
        probe: Arc<FixedProbe>,
    ) -> (
        Arc<ConnectivityMonitor>,
        EventBus,
        mpsc::UnboundedReceiver<SyncTrigger>,
    ) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let events = EventBus::new();
        let monitor = Arc::new(ConnectivityMonitor::new(
            online,
            probe,
            Duration::from_secs(5),
            events.clone(),
            Arc::new(SystemClock),
            sender,
        ));
        (monitor, events, receiver)
    }

    #[tokio::test]
    async fn coming_online_publishes_and_requests_sync() {
        let (monitor, events, mut triggers) =
            monitor(false, FixedProbe::new(true, Duration::ZERO));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        events.on(EventKind::StatusChange, move |event| {
            if let EventPayload::StatusChange(change) = &event.data {
                sink.lock()
                    .unwrap()
                    .push((change.was_online, change.is_online));
            }
        });

        assert!(monitor.handle_signal(NativeSignal::Online));
        assert!(!monitor.handle_signal(NativeSignal::Online));
        assert!(monitor.is_online());

        assert_eq!(*seen.lock().unwrap(), vec![(false, true)]);
        assert_eq!(triggers.try_recv().unwrap(), SyncTrigger::CameOnline);
        assert!(triggers.try_recv().is_err());
    }

    #[tokio::test]
    async fn going_offline_does_not_request_sync() {
        let (monitor, _events, mut triggers) =
            monitor(true, FixedProbe::new(false, Duration::ZERO));
        assert!(monitor.handle_signal(NativeSignal::Offline));
        assert!(!monitor.is_online());
        assert!(triggers.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_counts_as_offline() {
        let (monitor, _events, _triggers) =
            monitor(true, FixedProbe::new(true, Duration::from_secs(30)));
        assert!(!monitor.check_now().await);
        assert!(!monitor.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_loop_overrides_cached_state() {
        let probe = FixedProbe::new(true, Duration::ZERO);
        let (monitor, _events, mut triggers) = monitor(false, Arc::clone(&probe));
        let handle = monitor.spawn_probe_loop(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
        assert!(!monitor.is_online());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert!(monitor.is_online());
        assert_eq!(triggers.recv().await, Some(SyncTrigger::CameOnline));

        probe.reachable.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!monitor.is_online());

        handle.abort();
    }
}
