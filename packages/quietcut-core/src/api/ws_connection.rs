//! WebSocket connection tracking and management.
//!
//! This module provides tracking of progress-subscription connections with
//! force-close capability:
//!
//! - `WsConnectionManager`: tracks all active WebSocket connections
//! - `ConnectionGuard`: RAII guard for automatic cleanup on disconnect

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::jobs::JobId;

/// Internal connection state.
struct ConnectionState {
    /// The job this connection subscribed to, once a SUBSCRIBE arrived.
    subscribed_job: Mutex<Option<JobId>>,
}

/// Manages all active WebSocket connections.
///
/// Thread-safe and designed for concurrent access from multiple WebSocket
/// handlers. Uses hierarchical cancellation tokens for efficient force-close
/// of all connections on shutdown.
pub struct WsConnectionManager {
    /// Active connections: connection_id -> ConnectionState
    connections: DashMap<String, ConnectionState>,
    /// Counter for generating unique connection IDs.
    next_id: AtomicU64,
    /// Global cancellation token - when cancelled, all connections close.
    /// Wrapped in RwLock so it can be replaced after close_all().
    global_cancel: RwLock<CancellationToken>,
}

impl WsConnectionManager {
    /// Creates a new connection manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            global_cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Registers a new connection and returns a guard for RAII cleanup.
    pub fn register(self: &Arc<Self>) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let conn_id = format!("ws-{}", id);
        let cancel_token = self.global_cancel.read().child_token();

        self.connections.insert(
            conn_id.clone(),
            ConnectionState {
                subscribed_job: Mutex::new(None),
            },
        );
        log::info!(
            "[WS] Connection registered: {} (total: {})",
            conn_id,
            self.connections.len()
        );

        ConnectionGuard {
            id: conn_id,
            manager: Arc::clone(self),
            cancel_token,
        }
    }

    /// Records which job a connection subscribed to.
    pub fn set_subscription(&self, conn_id: &str, job_id: JobId) {
        if let Some(state) = self.connections.get(conn_id) {
            *state.subscribed_job.lock() = Some(job_id);
        }
    }

    /// Unregisters a connection by ID.
    fn unregister(&self, id: &str) {
        if self.connections.remove(id).is_some() {
            log::info!(
                "[WS] Connection unregistered: {} (remaining: {})",
                id,
                self.connections.len()
            );
        }
    }

    /// Returns the number of active connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Returns the number of connections subscribed to a given job.
    #[must_use]
    pub fn subscriber_count(&self, job_id: &JobId) -> usize {
        self.connections
            .iter()
            .filter(|entry| *entry.value().subscribed_job.lock() == Some(*job_id))
            .count()
    }

    /// Force-closes all connections.
    ///
    /// Cancels the global token, signalling all connection handlers to
    /// terminate gracefully; a fresh token then allows new connections.
    /// Returns the number of connections that were signaled to close.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        if count > 0 {
            log::info!("[WS] Force-closing {} connection(s)", count);
            let mut guard = self.global_cancel.write();
            guard.cancel();
            *guard = CancellationToken::new();
        }
        count
    }
}

impl Default for WsConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that unregisters a connection when dropped.
pub struct ConnectionGuard {
    id: String,
    manager: Arc<WsConnectionManager>,
    /// Token for this specific connection - cancelled on force-close.
    cancel_token: CancellationToken,
}

impl ConnectionGuard {
    /// Returns the connection ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the cancellation token for this connection.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_drop_updates_count() {
        let manager = Arc::new(WsConnectionManager::new());
        assert_eq!(manager.connection_count(), 0);
        {
            let _guard = manager.register();
            assert_eq!(manager.connection_count(), 1);
        }
        assert_eq!(manager.connection_count(), 0);
    }

    #[test]
    fn subscription_tracking_counts_per_job() {
        let manager = Arc::new(WsConnectionManager::new());
        let guard_a = manager.register();
        let guard_b = manager.register();
        let job = JobId::new();

        manager.set_subscription(guard_a.id(), job);
        assert_eq!(manager.subscriber_count(&job), 1);
        manager.set_subscription(guard_b.id(), job);
        assert_eq!(manager.subscriber_count(&job), 2);
        assert_eq!(manager.subscriber_count(&JobId::new()), 0);
    }

    #[test]
    fn close_all_cancels_live_tokens() {
        let manager = Arc::new(WsConnectionManager::new());
        let guard = manager.register();
        assert!(!guard.cancel_token().is_cancelled());
        assert_eq!(manager.close_all(), 1);
        assert!(guard.cancel_token().is_cancelled());

        // New registrations get a fresh, uncancelled token.
        let fresh = manager.register();
        assert!(!fresh.cancel_token().is_cancelled());
    }
}
