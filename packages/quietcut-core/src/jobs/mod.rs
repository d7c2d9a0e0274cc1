//! Job model: identifiers, settings, the status state machine.
//!
//! A job is the process-wide record of one upload working its way through
//! the pipeline. Status is a sum type whose transitions form a DAG; illegal
//! transitions are a programmer error and panic in [`store::JobStore`].

pub mod store;

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::analysis::AnalysisReport;
use crate::timeline::Fps;
use crate::transcript::ModelSize;

// ─────────────────────────────────────────────────────────────────────────────
// Job Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Unique 128-bit random job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Error for a settings value outside its documented range.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid value for {option}: {detail}")]
pub struct SettingsError {
    /// The offending option name as it appears on the wire.
    pub option: &'static str,
    /// Human-readable constraint description.
    pub detail: String,
}

fn default_silence_threshold_db() -> i32 {
    -45
}
fn default_min_silence_ms() -> u32 {
    800
}
fn default_padding_ms() -> u32 {
    250
}
fn default_filler_sensitivity() -> f64 {
    0.7
}

/// Effective per-job settings from the upload's configuration block.
///
/// Unknown options are rejected at parse time (`deny_unknown_fields`);
/// range violations are rejected by [`JobSettings::validate`] before any
/// job record exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct JobSettings {
    /// Silence threshold in dB full-scale (−60 ... −20).
    #[serde(default = "default_silence_threshold_db")]
    pub silence_threshold_db: i32,

    /// Minimum silence duration worth cutting (100 ... 5000 ms).
    #[serde(default = "default_min_silence_ms")]
    pub min_silence_ms: u32,

    /// Symmetric padding kept around removals (0 ... 1000 ms).
    #[serde(default = "default_padding_ms")]
    pub padding_ms: u32,

    /// Export frame grid; only the documented rates are accepted.
    #[serde(default)]
    pub fps: Fps,

    /// Whether to run transcription and filler detection.
    #[serde(default)]
    pub detect_fillers: bool,

    /// Filler detector sensitivity (0.0 ... 1.0).
    #[serde(default = "default_filler_sensitivity")]
    pub filler_sensitivity: f64,

    /// Model size requested from the transcription collaborator.
    #[serde(default)]
    pub transcription_model_size: ModelSize,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            silence_threshold_db: default_silence_threshold_db(),
            min_silence_ms: default_min_silence_ms(),
            padding_ms: default_padding_ms(),
            fps: Fps::default(),
            detect_fillers: false,
            filler_sensitivity: default_filler_sensitivity(),
            transcription_model_size: ModelSize::default(),
        }
    }
}

impl JobSettings {
    /// Checks every option against its documented range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(-60..=-20).contains(&self.silence_threshold_db) {
            return Err(SettingsError {
                option: "silence_threshold_db",
                detail: format!("{} is outside −60..−20", self.silence_threshold_db),
            });
        }
        if !(100..=5000).contains(&self.min_silence_ms) {
            return Err(SettingsError {
                option: "min_silence_ms",
                detail: format!("{} is outside 100..5000", self.min_silence_ms),
            });
        }
        if self.padding_ms > 1000 {
            return Err(SettingsError {
                option: "padding_ms",
                detail: format!("{} is outside 0..1000", self.padding_ms),
            });
        }
        if !(0.0..=1.0).contains(&self.filler_sensitivity) {
            return Err(SettingsError {
                option: "filler_sensitivity",
                detail: format!("{} is outside 0.0..1.0", self.filler_sensitivity),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Phase shown to clients while a job is analyzing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    Probing,
    Decoding,
    Transcribing,
    Planning,
}

/// Why a job failed. The coarse phrase reaches API clients; the detail stays
/// in the record and the job's log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// External toolchain could not read the container headers.
    ProbeFailed { detail: String },
    /// External decoder exited abnormally.
    DecodeFailed { detail: String },
    /// Pipeline invariant violation; a bug, not an input problem.
    AnalysisInternal { detail: String },
    /// Transcription collaborator refused or was missing while mandatory.
    TranscriptionUnavailable { detail: String },
    /// Process restarted while the job was in flight; no resume is attempted.
    Interrupted,
}

impl FailureReason {
    /// Machine-readable code for API responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProbeFailed { .. } => "probe_failed",
            Self::DecodeFailed { .. } => "decode_failed",
            Self::AnalysisInternal { .. } => "analysis_internal",
            Self::TranscriptionUnavailable { .. } => "transcription_unavailable",
            Self::Interrupted => "interrupted",
        }
    }

    /// Coarse user-facing phrase; never contains tool output.
    #[must_use]
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::ProbeFailed { .. } => "The media container could not be read",
            Self::DecodeFailed { .. } => "Audio decoding failed",
            Self::AnalysisInternal { .. } => "Internal analysis error",
            Self::TranscriptionUnavailable { .. } => "Transcription is unavailable",
            Self::Interrupted => "Processing was interrupted by a restart",
        }
    }
}

/// Job lifecycle status. Transitions form a DAG; see [`JobStatus::can_transition_to`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Uploading,
    Uploaded,
    Analyzing {
        progress: f64,
        phase: AnalysisPhase,
    },
    Exporting,
    Completed {
        report: AnalysisReport,
    },
    Failed {
        reason: FailureReason,
    },
    Cancelled,
}

impl JobStatus {
    /// Short name for logs and API payloads.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Analyzing { .. } => "analyzing",
            Self::Exporting => "exporting",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the status is terminal (`Completed`, `Failed`, `Cancelled`).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }

    /// The status DAG. Failure and cancellation are reachable from every
    /// non-terminal state; terminal states have no successors.
    #[must_use]
    pub fn can_transition_to(&self, next: &JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Self::Failed { .. } | Self::Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (Self::Uploading, Self::Uploaded)
                | (Self::Uploaded, Self::Analyzing { .. })
                | (Self::Analyzing { .. }, Self::Analyzing { .. })
                | (Self::Analyzing { .. }, Self::Exporting)
                | (Self::Exporting, Self::Completed { .. })
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Job Record
// ─────────────────────────────────────────────────────────────────────────────

/// Wall-clock duration of each completed stage (milliseconds).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimings {
    pub probe_ms: Option<u64>,
    pub analyze_ms: Option<u64>,
    pub transcribe_ms: Option<u64>,
    pub export_ms: Option<u64>,
}

/// Paths of the files written for a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFiles {
    pub legacy_xml: PathBuf,
    pub structural_xml: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srt: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vtt: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txt: Option<PathBuf>,
}

impl ResultFiles {
    /// Iterates over `(wire name, path)` pairs for download resolution.
    pub fn entries(&self) -> Vec<(&'static str, &PathBuf)> {
        let mut entries = vec![
            ("legacy.xml", &self.legacy_xml),
            ("structural.xml", &self.structural_xml),
        ];
        if let Some(srt) = &self.srt {
            entries.push(("transcript.srt", srt));
        }
        if let Some(vtt) = &self.vtt {
            entries.push(("transcript.vtt", vtt));
        }
        if let Some(txt) = &self.txt {
            entries.push(("transcript.txt", txt));
        }
        entries
    }
}

/// Process-wide record of one job; durable across restarts.
///
/// Mutated only through the store's transition and progress methods; the
/// orchestrator is the single writer for any given job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub created_at_ms: u64,
    pub source_filename: String,
    pub source_path: PathBuf,
    pub settings: JobSettings,
    pub status: JobStatus,
    /// Monotonically non-decreasing overall progress in `[0, 1]`.
    pub progress: f64,
    /// Last human-readable progress message.
    pub message: String,
    #[serde(default)]
    pub timings: StageTimings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_files: Option<ResultFiles>,
    /// Warnings accumulated during the run (skipped stages, rate mismatches).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Job {
    /// Creates a fresh record in `Uploading` state.
    #[must_use]
    pub fn new(source_filename: String, source_path: PathBuf, settings: JobSettings) -> Self {
        Self {
            id: JobId::new(),
            created_at_ms: crate::utils::now_millis(),
            source_filename,
            source_path,
            settings,
            status: JobStatus::Uploading,
            progress: 0.0,
            message: "Uploading".into(),
            timings: StageTimings::default(),
            result_files: None,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults_match_documented_values() {
        let s: JobSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.silence_threshold_db, -45);
        assert_eq!(s.min_silence_ms, 800);
        assert_eq!(s.padding_ms, 250);
        assert_eq!(s.fps.timebase(), 30);
        assert!(!s.detect_fillers);
        assert_eq!(s.filler_sensitivity, 0.7);
        assert_eq!(s.transcription_model_size, ModelSize::Base);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn unknown_options_are_rejected_at_parse_time() {
        let result = serde_json::from_str::<JobSettings>(r#"{"frame_rate": 30}"#);
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let mut s = JobSettings::default();
        s.silence_threshold_db = -10;
        assert_eq!(s.validate().unwrap_err().option, "silence_threshold_db");

        let mut s = JobSettings::default();
        s.min_silence_ms = 50;
        assert_eq!(s.validate().unwrap_err().option, "min_silence_ms");

        let mut s = JobSettings::default();
        s.padding_ms = 1500;
        assert_eq!(s.validate().unwrap_err().option, "padding_ms");

        let mut s = JobSettings::default();
        s.filler_sensitivity = 1.5;
        assert_eq!(s.validate().unwrap_err().option, "filler_sensitivity");
    }

    #[test]
    fn unsupported_fps_fails_at_parse_time() {
        let result = serde_json::from_str::<JobSettings>(r#"{"fps": 48}"#);
        assert!(result.is_err());
        let ok: JobSettings = serde_json::from_str(r#"{"fps": 23.976}"#).unwrap();
        assert!(ok.fps.is_ntsc());
    }

    #[test]
    fn status_dag_permits_the_happy_path() {
        let report_free_statuses = [
            JobStatus::Uploading,
            JobStatus::Uploaded,
            JobStatus::Analyzing {
                progress: 0.0,
                phase: AnalysisPhase::Probing,
            },
            JobStatus::Exporting,
        ];
        for pair in report_free_statuses.windows(2) {
            assert!(
                pair[0].can_transition_to(&pair[1]),
                "{} -> {}",
                pair[0].name(),
                pair[1].name()
            );
        }
    }

    #[test]
    fn status_dag_rejects_backwards_and_terminal_moves() {
        let analyzing = JobStatus::Analyzing {
            progress: 0.5,
            phase: AnalysisPhase::Decoding,
        };
        assert!(!analyzing.can_transition_to(&JobStatus::Uploaded));
        assert!(!JobStatus::Cancelled.can_transition_to(&JobStatus::Uploading));
        assert!(!JobStatus::Cancelled.can_transition_to(&JobStatus::Cancelled));
        assert!(!JobStatus::Exporting.can_transition_to(&analyzing));
    }

    #[test]
    fn failure_and_cancellation_reachable_from_any_live_state() {
        let failed = JobStatus::Failed {
            reason: FailureReason::Interrupted,
        };
        for status in [
            JobStatus::Uploading,
            JobStatus::Uploaded,
            JobStatus::Exporting,
        ] {
            assert!(status.can_transition_to(&failed));
            assert!(status.can_transition_to(&JobStatus::Cancelled));
        }
    }

    #[test]
    fn failure_reason_phrases_never_leak_detail() {
        let reason = FailureReason::DecodeFailed {
            detail: "ffmpeg said: moov atom not found".into(),
        };
        assert_eq!(reason.code(), "decode_failed");
        assert!(!reason.phrase().contains("moov"));
    }

    #[test]
    fn job_record_round_trips_through_json() {
        let job = Job::new(
            "talk.mp4".into(),
            PathBuf::from("/uploads/x/talk.mp4"),
            JobSettings::default(),
        );
        let json = serde_json::to_string_pretty(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, job.id);
        assert_eq!(back.status.name(), "uploading");
    }
}
