//! Fixed pipeline constants that should NOT be changed.
//!
//! These values pin the analysis window geometry, the progress contract
//! towards subscribers, and the editor-XML conventions. Changing them would
//! change analysis results or break importers that consume the exports.

// ─────────────────────────────────────────────────────────────────────────────
// Audio Analysis
// ─────────────────────────────────────────────────────────────────────────────

/// Duration of one RMS analysis window (milliseconds).
///
/// The analyzer consumes PCM in fixed windows of `sample_rate / 100` frames,
/// so every window covers 10 ms regardless of sample rate.
pub const ANALYSIS_WINDOW_MS: u32 = 10;

/// Number of analysis windows consumed per worker checkpoint (~1 s of audio).
///
/// Cancellation is polled and progress is (potentially) reported once per
/// batch, never mid-window.
pub const ANALYSIS_BATCH_WINDOWS: usize = 100;

/// Minimum wall-clock gap between two progress reports from the analyzer (ms).
pub const PROGRESS_REPORT_INTERVAL_MS: u64 = 200;

/// Full-scale amplitude of the decoded sample format (signed 16-bit PCM).
pub const PCM_FULL_SCALE: f64 = i16::MAX as f64;

/// Gap tolerance when matching duplicated words in the filler detector (ms).
pub const DUPLICATE_WORD_GAP_MS: u32 = 250;

// ─────────────────────────────────────────────────────────────────────────────
// External Decoder
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum number of decoder stderr bytes retained for failure reports.
///
/// Only the tail matters: the toolchain prints its actual error last.
pub const DECODER_STDERR_TAIL_BYTES: usize = 4096;

/// File name of the per-job decoder log written into the job directory.
pub const DECODER_LOG_FILE: &str = "decoder.log";

// ─────────────────────────────────────────────────────────────────────────────
// Uploads
// ─────────────────────────────────────────────────────────────────────────────

/// Media container extensions accepted by the upload endpoint.
///
/// The decoder contract only requires "a container the toolchain can parse",
/// but the front door rejects anything outside this list before a job exists.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "m4v", "mkv", "webm", "avi", "mts", "wav", "mp3", "m4a", "aac", "flac",
];

// ─────────────────────────────────────────────────────────────────────────────
// Job Pipeline Progress Breakpoints
// ─────────────────────────────────────────────────────────────────────────────

/// Overall progress once the container probe has succeeded.
pub const PROGRESS_AFTER_PROBE: f64 = 0.05;

/// Overall progress once decode + silence analysis has finished
/// (when a transcription stage follows).
pub const PROGRESS_AFTER_ANALYZE: f64 = 0.60;

/// Overall progress once decode + silence analysis has finished
/// (when no transcription stage follows).
pub const PROGRESS_AFTER_ANALYZE_NO_TRANSCRIPT: f64 = 0.85;

/// Overall progress once transcription has finished.
pub const PROGRESS_AFTER_TRANSCRIBE: f64 = 0.85;

/// Overall progress once cut planning has finished.
pub const PROGRESS_AFTER_PLAN: f64 = 0.90;

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket / Events
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity of the event broadcast channel for WebSocket subscribers.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// WebSocket heartbeat timeout (seconds).
pub const WS_HEARTBEAT_TIMEOUT_SECS: u64 = 30;

/// Interval between WebSocket heartbeat checks (seconds).
pub const WS_HEARTBEAT_CHECK_INTERVAL_SECS: u64 = 1;

/// Interval between server-sent keepalive pings (seconds).
pub const WS_KEEPALIVE_INTERVAL_SECS: u64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used in exported documents (sequence/project naming).
pub const APP_NAME: &str = "QuietCut";

/// Service identifier reported by the health endpoint.
pub const SERVICE_ID: &str = "quietcut";
