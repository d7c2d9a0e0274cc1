//! Event system for real-time client communication.
//!
//! This module provides:
//! - [`EventEmitter`] trait for the orchestrator to emit job events
//! - [`JobEvent`] types describing job lifecycle and progress
//!
//! The actual transport (WebSocket push) is handled in the `api` module via
//! [`BroadcastEventBridge`].

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

use crate::analysis::ReportSummary;
use crate::jobs::JobId;

/// Events broadcast to subscribed clients.
///
/// Today the only category is job events; the wrapper keeps the wire shape
/// open for additional categories without breaking subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Events from the job pipeline.
    Job(JobEvent),
}

/// Job lifecycle and progress events.
///
/// Subscribers receive these in emission order for a given job; across jobs
/// there is no ordering guarantee.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobEvent {
    /// Overall progress advanced.
    Progress {
        #[serde(rename = "jobId")]
        job_id: JobId,
        /// Monotonically non-decreasing overall progress in `[0, 1]`.
        progress: f64,
        /// Human-readable description of the current work.
        message: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The job reached `Completed`; the report summary is attached.
    Completed {
        #[serde(rename = "jobId")]
        job_id: JobId,
        report: ReportSummary,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The job reached `Failed`.
    Failed {
        #[serde(rename = "jobId")]
        job_id: JobId,
        /// Coarse reason phrase; tool output never travels here.
        reason: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The job reached `Cancelled`.
    Cancelled {
        #[serde(rename = "jobId")]
        job_id: JobId,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

impl JobEvent {
    /// The job this event belongs to.
    #[must_use]
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Progress { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. }
            | Self::Cancelled { job_id, .. } => *job_id,
        }
    }

    /// Whether this event closes the subscription (terminal state reached).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

impl From<JobEvent> for BroadcastEvent {
    fn from(event: JobEvent) -> Self {
        BroadcastEvent::Job(event)
    }
}
