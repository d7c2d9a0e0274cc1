//! Event emitter abstraction for decoupling the pipeline from transport.
//!
//! The orchestrator depends on the [`EventEmitter`] trait rather than a
//! concrete broadcast channel, enabling testing and alternative transports.

use super::JobEvent;

/// Trait for emitting job events without knowledge of transport.
pub trait EventEmitter: Send + Sync {
    /// Emits a job lifecycle or progress event.
    fn emit_job(&self, event: JobEvent);
}

/// No-op emitter for tests and fire-and-forget tooling.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_job(&self, _event: JobEvent) {
        // No-op: events go via WebSocket only in server mode
    }
}

/// Logging emitter for debugging and development.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_job(&self, event: JobEvent) {
        tracing::debug!(?event, "job_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Test emitter that counts events.
    struct CountingEventEmitter {
        count: AtomicUsize,
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit_job(&self, _event: JobEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn counting_emitter_tracks_events() {
        let emitter = Arc::new(CountingEventEmitter {
            count: AtomicUsize::new(0),
        });
        let id = JobId::new();
        emitter.emit_job(JobEvent::Progress {
            job_id: id,
            progress: 0.5,
            message: "analyzing".into(),
            timestamp: 0,
        });
        emitter.emit_job(JobEvent::Cancelled {
            job_id: id,
            timestamp: 0,
        });
        assert_eq!(emitter.count.load(Ordering::SeqCst), 2);
    }
}
