//! Bridge implementation that maps job events to broadcast transport.
//!
//! The [`BroadcastEventBridge`] lives at the boundary between the
//! orchestrator and transport concerns, forwarding typed job events to the
//! `tokio::sync::broadcast` channel that WebSocket handlers subscribe to.

use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::{BroadcastEvent, JobEvent};

/// Bridges job events to the WebSocket broadcast channel.
///
/// # Thread Safety
///
/// The bridge is `Send + Sync` and can be shared across async tasks.
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<BroadcastEvent>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Creates a new bridge wrapping an existing broadcast sender.
    #[must_use]
    pub fn with_sender(tx: broadcast::Sender<BroadcastEvent>) -> Self {
        Self { tx }
    }

    /// Returns a new receiver for the broadcast channel.
    ///
    /// WebSocket handlers use this to subscribe to events. Slow subscribers
    /// may observe `Lagged` and coalesce to the latest events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }

    /// Returns a reference to the broadcast sender.
    #[must_use]
    pub fn sender(&self) -> &broadcast::Sender<BroadcastEvent> {
        &self.tx
    }
}

impl EventEmitter for BroadcastEventBridge {
    fn emit_job(&self, event: JobEvent) {
        if let Err(e) = self.tx.send(BroadcastEvent::Job(event)) {
            log::trace!("[EventBridge] No broadcast receivers: {}", e);
        }
    }
}
