//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to the orchestrator.
//! It provides the router construction and server startup functionality.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::bootstrap::BootstrappedServices;
use crate::events::BroadcastEventBridge;
use crate::services::JobOrchestrator;
use crate::state::Config;

pub mod http;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::WsConnectionManager;

/// Port range scanned when no preferred port is configured.
const AUTO_PORT_RANGE: (u16, u16) = (8700, 8710);

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services.
/// All business logic lives in the orchestrator and store.
#[derive(Clone)]
pub struct AppState {
    /// Drives the per-job pipeline.
    pub orchestrator: Arc<JobOrchestrator>,
    /// Event bridge feeding WebSocket subscribers.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Application configuration.
    pub config: Arc<RwLock<Config>>,
}

impl AppState {
    /// Builds the API state from bootstrapped services.
    #[must_use]
    pub fn new(services: &BootstrappedServices, config: Arc<RwLock<Config>>) -> Self {
        Self {
            orchestrator: Arc::clone(&services.orchestrator),
            event_bridge: Arc::clone(&services.event_bridge),
            ws_manager: Arc::clone(&services.ws_manager),
            config,
        }
    }
}

async fn find_available_port(
    start: u16,
    end: u16,
) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    for port in start..=end {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Starts the HTTP server on the configured or auto-discovered port.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let preferred_port = state.config.read().preferred_port;
    let (port, listener) = if preferred_port > 0 {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], preferred_port));
        (preferred_port, tokio::net::TcpListener::bind(&addr).await?)
    } else {
        find_available_port(AUTO_PORT_RANGE.0, AUTO_PORT_RANGE.1).await?
    };

    log::info!("Server listening on http://0.0.0.0:{}", port);
    let app = http::create_router(state);

    axum::serve(listener, app).await?;
    Ok(())
}
