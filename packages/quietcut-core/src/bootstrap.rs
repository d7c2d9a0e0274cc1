//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where the
//! store, orchestrator and event bridge are instantiated and wired together.
//! This pattern provides:
//!
//! - **Clarity**: All dependency relationships are visible in one place
//! - **Testability**: Easy to swap implementations for testing
//! - **Maintainability**: Service creation logic is isolated from usage

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::api::WsConnectionManager;
use crate::context::StorageContext;
use crate::error::{QuietcutError, QuietcutResult};
use crate::events::{BroadcastEvent, BroadcastEventBridge, EventEmitter};
use crate::jobs::store::JobStore;
use crate::media::MediaToolchain;
use crate::services::JobOrchestrator;
use crate::state::Config;
use crate::transcript::http::HttpTranscriber;
use crate::transcript::Transcriber;

/// Container for all bootstrapped services.
///
/// Consumed by `AppState` to build the final application state.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Drives the per-job pipeline.
    pub orchestrator: Arc<JobOrchestrator>,
    /// Typed job store (shared with the orchestrator).
    pub store: Arc<JobStore>,
    /// Storage roots and path validation.
    pub storage: Arc<StorageContext>,
    /// Broadcast channel sender for real-time events.
    pub broadcast_tx: broadcast::Sender<BroadcastEvent>,
    /// Event bridge for emitting events to WebSocket subscribers.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Initiates graceful shutdown of all services.
    ///
    /// Cancels running analyses (terminating decoder children) and closes
    /// all WebSocket connections. Job records already reflect the terminal
    /// `Cancelled` state once the pipelines drain.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        self.cancel_token.cancel();
        self.orchestrator.shutdown();

        // Give cancelled pipelines a bounded window to reach their terminal
        // transition so records land as Cancelled rather than Interrupted.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while self.orchestrator.active_count() > 0 && std::time::Instant::now() < deadline {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        let connections_closed = self.ws_manager.close_all();
        if connections_closed > 0 {
            log::info!(
                "[Bootstrap] Closed {} WebSocket connection(s)",
                connections_closed
            );
        }

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Bootstraps all application services with their dependencies.
///
/// The wiring order matters - services are created in dependency order:
///
/// 1. Storage roots (validated and created)
/// 2. Job store (records loaded, interrupted jobs swept)
/// 3. Event infrastructure (broadcast channel, bridge)
/// 4. Transcription collaborator (when configured)
/// 5. Orchestrator (depends on all of the above)
///
/// # Errors
///
/// Returns an error when the configuration is invalid, the storage roots
/// cannot be created, or the transcription client cannot be constructed.
///
/// # Panics
///
/// Panics if called outside of a Tokio runtime context: the orchestrator
/// captures the current runtime handle for spawning pipeline tasks.
pub fn bootstrap_services(config: &Config) -> QuietcutResult<BootstrappedServices> {
    config
        .validate()
        .map_err(QuietcutError::Configuration)?;

    let runtime = tokio::runtime::Handle::current();

    let storage = Arc::new(
        StorageContext::new(&config.upload_root, &config.output_root)
            .map_err(|e| QuietcutError::Configuration(e.to_string()))?,
    );

    let store = Arc::new(
        JobStore::new(config.data_dir.as_deref())
            .map_err(|e| QuietcutError::Configuration(format!("job store: {e}")))?,
    );
    let (restored, interrupted) = store.restore();
    if restored > 0 {
        log::info!(
            "[Bootstrap] Restored {} job record(s), {} marked interrupted",
            restored,
            interrupted
        );
    }

    let (broadcast_tx, _) = broadcast::channel::<BroadcastEvent>(config.event_channel_capacity);
    let event_bridge = Arc::new(BroadcastEventBridge::with_sender(broadcast_tx.clone()));
    let ws_manager = Arc::new(WsConnectionManager::new());
    let cancel_token = CancellationToken::new();

    let toolchain = MediaToolchain::new(
        config.decoder_binary.clone(),
        config.probe_binary.clone(),
    );

    let transcriber: Option<Arc<dyn Transcriber>> = match &config.transcription.endpoint {
        Some(endpoint) => Some(Arc::new(
            HttpTranscriber::new(endpoint.clone())
                .map_err(|e| QuietcutError::Configuration(e.to_string()))?,
        )),
        None => None,
    };

    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&storage),
        toolchain,
        transcriber,
        config.transcription.required,
        Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
        config.max_concurrent_analyses,
        runtime,
    ));

    Ok(BootstrappedServices {
        orchestrator,
        store,
        storage,
        broadcast_tx,
        event_bridge,
        ws_manager,
        cancel_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn bootstrap_wires_services_and_sweeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            upload_root: dir.path().join("uploads"),
            output_root: dir.path().join("output"),
            data_dir: Some(dir.path().join("data")),
            ..Default::default()
        };

        let services = bootstrap_services(&config).unwrap();
        assert_eq!(services.ws_manager.connection_count(), 0);
        assert!(services.storage.upload_root().is_dir());
        assert!(services.storage.output_root().is_dir());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = Config {
            upload_root: PathBuf::from("./same"),
            output_root: PathBuf::from("./same"),
            ..Default::default()
        };
        assert!(matches!(
            bootstrap_services(&config),
            Err(QuietcutError::Configuration(_))
        ));
    }
}
