//! QuietCut Core - shared library for QuietCut.
//!
//! This crate provides the core functionality for QuietCut, an automatic
//! rough-cut service for talking-head recordings: it detects silences (and
//! optionally disfluencies), plans the complementary keep-cuts, and emits
//! two editor-native EDL XML documents plus optional transcript files. It is
//! designed to be used by the standalone headless server and by operator
//! tooling.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`timeline`]: Intervals, frame grids and cuts - the shared data model
//! - [`media`]: External toolchain collaborators (probe, PCM decode)
//! - [`analysis`]: Silence detection, filler matching, cut planning
//! - [`transcript`]: Transcript model and the transcription collaborator
//! - [`export`]: EDL synthesis (legacy + structural XML) and transcripts
//! - [`jobs`]: Job records, settings validation, the status state machine
//! - [`services`]: The orchestrator driving the per-job pipeline
//! - [`events`]: Event system for real-time client communication
//! - [`api`]: HTTP/WebSocket front door
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! The crate defines traits to decouple the pipeline from platform and
//! collaborator specifics:
//!
//! - [`EventEmitter`](events::EventEmitter): Emitting job events
//! - [`Transcriber`](transcript::Transcriber): The speech-to-text collaborator
//! - [`ProgressSink`](analysis::ProgressSink): Stage progress reporting

#![warn(clippy::all)]

pub mod analysis;
pub mod api;
pub mod bootstrap;
pub mod constants;
pub mod context;
pub mod error;
pub mod events;
pub mod export;
pub mod jobs;
pub mod media;
pub mod services;
pub mod state;
pub mod timeline;
pub mod transcript;
pub mod utils;

// Re-export commonly used types at the crate root
pub use analysis::{AnalysisReport, CancelFlag, ReportSummary};
pub use context::StorageContext;
pub use error::{ErrorCode, QuietcutError, QuietcutResult};
pub use events::{BroadcastEvent, BroadcastEventBridge, EventEmitter, JobEvent};
pub use jobs::store::JobStore;
pub use jobs::{Job, JobId, JobSettings, JobStatus};
pub use state::{Config, TranscriptionConfig};
pub use timeline::{Cut, Fps, TimeInterval};

// Re-export media types
pub use media::{MediaInfo, MediaToolchain};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, ServerError, WsConnectionManager};
