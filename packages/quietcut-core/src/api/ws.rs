//! WebSocket handler for job progress subscriptions.
//!
//! A connection subscribes to exactly one job and then receives:
//!
//! - `{ "kind": "progress", "progress": .., "message": .. }` updates
//! - `{ "kind": "result", "report": .. }` when the job completes
//! - `{ "kind": "error", "reason": .. }` on failure (cancellation is
//!   delivered as the reason `"cancelled"`)
//! - `{ "kind": "ping" }` keepalives, which clients echo back
//!
//! On subscribe the client immediately gets a snapshot of the job's current
//! state, so late subscribers never miss the terminal outcome. The
//! connection closes once a terminal message has been delivered.

use std::str::FromStr;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::{SplitSink, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::analysis::ReportSummary;
use crate::api::AppState;
use crate::constants::WS_KEEPALIVE_INTERVAL_SECS;
use crate::events::{BroadcastEvent, JobEvent};
use crate::jobs::{JobId, JobStatus};

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Message Types
// ─────────────────────────────────────────────────────────────────────────────

/// Incoming WebSocket message envelope.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WsIncoming {
    Subscribe { payload: SubscribeRequest },
    Heartbeat,
    /// Client echo of a server keepalive ping.
    Pong,
}

/// Subscription request payload.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeRequest {
    job_id: String,
}

/// Outgoing WebSocket messages (the documented wire shapes).
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum WsOutgoing {
    Progress { progress: f64, message: String },
    Result { report: ReportSummary },
    Error { reason: String },
    Ping,
}

impl WsOutgoing {
    /// Serializes the message to a WebSocket text message.
    fn to_message(&self) -> Option<Message> {
        serde_json::to_string(self)
            .ok()
            .map(|s| Message::Text(s.into()))
    }

    /// Whether this message ends the subscription.
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, outgoing: WsOutgoing) -> bool {
    match outgoing.to_message() {
        Some(msg) => sender.send(msg).await.is_ok(),
        None => false,
    }
}

/// Maps a broadcast job event onto the wire shapes.
fn event_to_outgoing(event: &JobEvent) -> WsOutgoing {
    match event {
        JobEvent::Progress {
            progress, message, ..
        } => WsOutgoing::Progress {
            progress: *progress,
            message: message.clone(),
        },
        JobEvent::Completed { report, .. } => WsOutgoing::Result {
            report: report.clone(),
        },
        JobEvent::Failed { reason, .. } => WsOutgoing::Error {
            reason: reason.clone(),
        },
        JobEvent::Cancelled { .. } => WsOutgoing::Error {
            reason: "cancelled".into(),
        },
    }
}

/// Builds the snapshot message for a freshly subscribed job.
///
/// Returns `(message, closes_connection)`.
fn snapshot_for(state: &AppState, id: &JobId) -> (WsOutgoing, bool) {
    let Some(job) = state.orchestrator.store().get(id) else {
        return (
            WsOutgoing::Error {
                reason: "job_not_found".into(),
            },
            true,
        );
    };
    match &job.status {
        JobStatus::Completed { report } => (
            WsOutgoing::Result {
                report: report.summary(),
            },
            true,
        ),
        JobStatus::Failed { reason } => (
            WsOutgoing::Error {
                reason: reason.phrase().to_string(),
            },
            true,
        ),
        JobStatus::Cancelled => (
            WsOutgoing::Error {
                reason: "cancelled".into(),
            },
            true,
        ),
        _ => (
            WsOutgoing::Progress {
                progress: job.progress,
                message: job.message.clone(),
            },
            false,
        ),
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Main WebSocket connection handler.
async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut broadcast_rx = state.event_bridge.subscribe();
    let mut subscribed: Option<JobId> = None;
    let mut last_activity = Instant::now();

    let conn_guard = state.ws_manager.register();
    let cancel_token = conn_guard.cancel_token().clone();

    let (heartbeat_timeout, heartbeat_check) = {
        let config = state.config.read();
        (
            Duration::from_secs(config.ws_heartbeat_timeout_secs),
            Duration::from_secs(config.ws_heartbeat_check_interval_secs),
        )
    };

    // Delay mode skips missed ticks rather than bursting to catch up.
    let mut heartbeat_interval = tokio::time::interval(heartbeat_check);
    heartbeat_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut keepalive_interval =
        tokio::time::interval(Duration::from_secs(WS_KEEPALIVE_INTERVAL_SECS));
    keepalive_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Force-close request (shutdown)
            _ = cancel_token.cancelled() => {
                log::info!("[WS] Connection force-closed: {}", conn_guard.id());
                break;
            }
            // Incoming messages from the client
            msg = receiver.next() => {
                last_activity = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WsIncoming>(&text) {
                            Ok(WsIncoming::Subscribe { payload }) => {
                                let Ok(job_id) = JobId::from_str(&payload.job_id) else {
                                    let _ = send(&mut sender, WsOutgoing::Error {
                                        reason: "invalid_job_id".into(),
                                    }).await;
                                    break;
                                };
                                subscribed = Some(job_id);
                                state.ws_manager.set_subscription(conn_guard.id(), job_id);

                                // Snapshot first, then the live stream.
                                let (snapshot, closes) = snapshot_for(&state, &job_id);
                                let sent = send(&mut sender, snapshot).await;
                                if !sent || closes {
                                    break;
                                }
                            }
                            Ok(WsIncoming::Heartbeat) | Ok(WsIncoming::Pong) => {
                                // Activity timestamp already refreshed above.
                            }
                            Err(_) => {} // Unknown message type, ignore
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            // Job events from the orchestrator
            event = broadcast_rx.recv() => {
                match event {
                    Ok(BroadcastEvent::Job(event)) => {
                        let Some(job_id) = subscribed else { continue };
                        if event.job_id() != job_id {
                            continue;
                        }
                        let outgoing = event_to_outgoing(&event);
                        let terminal = outgoing.is_terminal();
                        if !send(&mut sender, outgoing).await || terminal {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Slow subscriber: coalesce by resending the current
                        // snapshot instead of replaying n missed events.
                        log::debug!("[WS] Subscriber lagged by {} event(s)", n);
                        if let Some(job_id) = subscribed {
                            let (snapshot, closes) = snapshot_for(&state, &job_id);
                            if !send(&mut sender, snapshot).await || closes {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            // Server keepalive ping
            _ = keepalive_interval.tick() => {
                if !send(&mut sender, WsOutgoing::Ping).await {
                    break;
                }
            }
            // Heartbeat timeout check
            _ = heartbeat_interval.tick() => {
                if last_activity.elapsed() > heartbeat_timeout {
                    log::warn!("[WS] Heartbeat timeout: {}", conn_guard.id());
                    break;
                }
            }
        }
    }

    // ConnectionGuard drop unregisters the connection.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outgoing_wire_shapes_match_the_contract() {
        let progress = WsOutgoing::Progress {
            progress: 0.42,
            message: "Analyzing audio".into(),
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["kind"], "progress");
        assert_eq!(json["progress"], 0.42);

        let error = WsOutgoing::Error {
            reason: "cancelled".into(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["reason"], "cancelled");

        let ping = serde_json::to_value(WsOutgoing::Ping).unwrap();
        assert_eq!(ping["kind"], "ping");
    }

    #[test]
    fn incoming_subscribe_parses() {
        let msg: WsIncoming = serde_json::from_str(
            r#"{"type":"SUBSCRIBE","payload":{"jobId":"4a3f31e2-9a50-4fc5-b3f2-1f1e35a4f10a"}}"#,
        )
        .unwrap();
        assert!(matches!(msg, WsIncoming::Subscribe { .. }));

        let msg: WsIncoming = serde_json::from_str(r#"{"type":"HEARTBEAT"}"#).unwrap();
        assert!(matches!(msg, WsIncoming::Heartbeat));
    }

    #[test]
    fn terminal_classification() {
        assert!(WsOutgoing::Error {
            reason: "x".into()
        }
        .is_terminal());
        assert!(!WsOutgoing::Ping.is_terminal());
        assert!(!WsOutgoing::Progress {
            progress: 0.0,
            message: String::new()
        }
        .is_terminal());
    }
}
