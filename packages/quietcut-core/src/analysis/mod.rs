//! Audio analysis pipeline: silence detection, filler matching, cut planning.
//!
//! The stages are pure consumers of their upstream output and run on the
//! worker pool, never on the I/O scheduler:
//!
//! - [`silence`]: windowed RMS silence detection over a PCM stream
//! - [`fillers`]: tier-gated disfluency matching over transcript words
//! - [`planner`]: fuse -> shrink -> invert planning of keep-cuts
//!
//! Each stage checks the job's [`CancelFlag`] at its checkpoints and reports
//! progress through a [`ProgressSink`], rate-limited at the source.

pub mod fillers;
pub mod planner;
pub mod silence;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::fillers::FillerHit;
use crate::timeline::{total_duration_s, total_frames, Cut, Fps, TimeInterval};

/// Errors surfaced by the analysis stages.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The job's cancellation flag was set; the stage stopped at a checkpoint.
    #[error("analysis cancelled")]
    Cancelled,

    /// A pipeline invariant was violated. This is a bug, not an input problem.
    #[error("internal analysis error: {0}")]
    Internal(String),

    /// Reading the PCM stream failed.
    #[error("PCM stream error: {0}")]
    Io(#[from] std::io::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Cancellation
// ─────────────────────────────────────────────────────────────────────────────

/// Shared cancellation flag polled by analysis stages between window batches.
///
/// Cancelling is idempotent and purely cooperative: the next checkpoint in the
/// running stage observes the flag and returns [`AnalysisError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a fresh, unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. Safe to call any number of times.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Progress
// ─────────────────────────────────────────────────────────────────────────────

/// Sink for fractional stage progress in `[0.0, 1.0]`.
///
/// Stages clamp and rate-limit before reporting, so implementations can
/// forward directly to the job store and event bridge.
pub trait ProgressSink: Send {
    /// Reports stage progress as a fraction of the stage's own work.
    fn report(&mut self, fraction: f64);
}

impl<F: FnMut(f64) + Send> ProgressSink for F {
    fn report(&mut self, fraction: f64) {
        self(fraction)
    }
}

/// Sink that discards all reports (tests, fire-and-forget stages).
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn report(&mut self, _fraction: f64) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Analysis Report
// ─────────────────────────────────────────────────────────────────────────────

/// Bundle carried between stages and attached to a completed job.
///
/// The job owns its report; each stage consumes its upstream output by move
/// (the raw silence list is folded into `cuts` by the planner and kept here
/// only for the result summary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Source duration in seconds (from the probe).
    pub duration_s: f64,
    /// Sample rate the analyzer actually consumed (decode-side rate).
    pub sample_rate_hz: u32,
    /// Detected silence intervals, sorted and disjoint.
    pub silences: Vec<TimeInterval>,
    /// Detected filler words, sorted and de-duplicated.
    pub fillers: Vec<FillerHit>,
    /// Planned keep-cuts covering the source.
    pub cuts: Vec<Cut>,
    /// Padding applied around removals (milliseconds).
    pub padding_ms: u32,
    /// Export frame grid.
    pub fps: Fps,
}

impl AnalysisReport {
    /// Seconds of source media that survive editing.
    #[must_use]
    pub fn total_kept_s(&self) -> f64 {
        self.cuts.iter().map(|c| c.interval.duration_s()).sum()
    }

    /// Seconds of source media removed by the plan.
    #[must_use]
    pub fn total_removed_s(&self) -> f64 {
        (self.duration_s - self.total_kept_s()).max(0.0)
    }

    /// Compact summary for status responses and result events.
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            duration_s: self.duration_s,
            silence_count: self.silences.len(),
            filler_count: self.fillers.len(),
            cut_count: self.cuts.len(),
            total_kept_s: self.total_kept_s(),
            total_removed_s: self.total_removed_s(),
            total_kept_frames: total_frames(&self.cuts),
            fps: self.fps,
        }
    }

    /// Verifies the planner's invariants before export.
    ///
    /// Returns [`AnalysisError::Internal`]: a violation here is a logic bug
    /// and fails the job with an `analysis_internal` reason.
    pub fn check_invariants(&self) -> Result<(), AnalysisError> {
        if !crate::timeline::is_sorted_disjoint(&self.silences) {
            return Err(AnalysisError::Internal(
                "silence intervals unsorted or overlapping".into(),
            ));
        }
        let keeps: Vec<TimeInterval> = self.cuts.iter().map(|c| c.interval).collect();
        if !crate::timeline::is_sorted_disjoint(&keeps) {
            return Err(AnalysisError::Internal(
                "cut intervals unsorted or overlapping".into(),
            ));
        }
        if self.cuts.iter().any(|c| c.out_frame <= c.in_frame) {
            return Err(AnalysisError::Internal(
                "cut with non-positive frame span".into(),
            ));
        }
        let kept = total_duration_s(&keeps);
        if kept > self.duration_s + 1e-6 {
            return Err(AnalysisError::Internal(format!(
                "kept duration {kept:.6}s exceeds source duration {:.6}s",
                self.duration_s
            )));
        }
        Ok(())
    }
}

/// Counts and totals shown to API clients; the full report stays in the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub duration_s: f64,
    pub silence_count: usize,
    pub filler_count: usize,
    pub cut_count: usize,
    pub total_kept_s: f64,
    pub total_removed_s: f64,
    pub total_kept_frames: i64,
    pub fps: Fps,
}
