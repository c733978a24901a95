//! One-way monitor events.
//!
//! The monitor publishes what happened; status displays subscribe. Nothing
//! in the monitor holds a reference back to a subscriber.

use tokio::sync::broadcast;

/// Something observable happened in the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A scan cycle began over this many enabled sources.
    CycleStarted { sources: usize },
    /// One source finished scanning.
    SourceScanned {
        source_id: i64,
        platform: String,
        new_items: usize,
        failed: bool,
    },
    /// A scan cycle ended.
    CycleCompleted {
        new_items: usize,
        failures: usize,
        cancelled: bool,
    },
    /// The cached login state flipped.
    AuthStatusChanged { authenticated: bool },
}

/// Broadcast sender for [`MonitorEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: MonitorEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
