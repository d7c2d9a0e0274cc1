//! Energy-based silence detection over a decoded PCM stream.
//!
//! The analyzer consumes interleaved signed 16-bit frames in fixed 10 ms
//! windows, computes per-window RMS in dB full-scale, and runs a two-state
//! machine (`InSpeech` / `InSilence`) that emits every sub-threshold run of
//! at least `min_silence_ms`.
//!
//! The implementation is single-threaded and deterministic: identical input
//! bytes always produce an identical interval list.

use std::io::Read;
use std::time::Instant;

use crate::analysis::{AnalysisError, CancelFlag, ProgressSink};
use crate::constants::{ANALYSIS_BATCH_WINDOWS, PCM_FULL_SCALE, PROGRESS_REPORT_INTERVAL_MS};
use crate::timeline::TimeInterval;

/// Parameters for one silence-analysis run.
#[derive(Debug, Clone)]
pub struct SilenceParams {
    /// Sample rate of the incoming PCM stream (the decode-side rate).
    pub sample_rate_hz: u32,
    /// Interleaved channel count (mono and stereo are treated uniformly).
    pub channels: u16,
    /// A window is silent iff its level is at or below this (dB full-scale).
    pub threshold_db: f64,
    /// Minimum silence run worth reporting (milliseconds).
    pub min_silence_ms: u32,
}

/// Result of a silence-analysis run.
#[derive(Debug, Clone)]
pub struct SilenceOutcome {
    /// Detected silences, sorted, disjoint, each >= `min_silence_ms`.
    pub silences: Vec<TimeInterval>,
    /// Seconds of audio actually consumed from the stream.
    ///
    /// May fall short of the probed duration when the decoder closed the pipe
    /// early; callers compare against the probe and warn on mismatch.
    pub analyzed_duration_s: f64,
}

enum WindowState {
    Speech,
    Silence { start_window: u64 },
}

/// Analyzes a PCM stream for silence runs.
///
/// `expected_duration_s` (from the probe) only drives progress reporting; the
/// detection itself runs to end-of-stream and tolerates short streams. The
/// cancellation flag is polled once per ~1 s batch, never mid-window, and
/// progress reports are limited to one per [`PROGRESS_REPORT_INTERVAL_MS`].
pub fn analyze<R: Read>(
    mut pcm: R,
    params: &SilenceParams,
    expected_duration_s: Option<f64>,
    cancel: &CancelFlag,
    progress: &mut dyn ProgressSink,
) -> Result<SilenceOutcome, AnalysisError> {
    let window_frames = (params.sample_rate_hz / 100).max(1) as usize;
    let bytes_per_frame = params.channels.max(1) as usize * 2;
    let window_bytes = window_frames * bytes_per_frame;
    let window_secs = window_frames as f64 / params.sample_rate_hz as f64;
    let min_silence_windows =
        (params.min_silence_ms as u64).div_ceil(crate::constants::ANALYSIS_WINDOW_MS as u64);
    let total_windows_estimate = expected_duration_s
        .map(|d| (d / window_secs).ceil().max(1.0) as u64)
        .unwrap_or(0);

    let mut buf = vec![0u8; window_bytes];
    let mut silences = Vec::new();
    let mut state = WindowState::Speech;
    let mut windows_done: u64 = 0;
    let mut frames_total: u64 = 0;
    let mut last_report: Option<Instant> = None;

    let close_silence =
        |silences: &mut Vec<TimeInterval>, start_window: u64, end_window: u64, end_s: f64| {
            if end_window.saturating_sub(start_window) >= min_silence_windows {
                let start_s = start_window as f64 * window_secs;
                if let Ok(interval) = TimeInterval::new(start_s, end_s) {
                    silences.push(interval);
                }
            }
        };

    loop {
        let read = fill_window(&mut pcm, &mut buf)?;
        if read < bytes_per_frame {
            break;
        }
        let frames_in_window = read / bytes_per_frame;
        frames_total += frames_in_window as u64;

        let level_db = window_level_db(&buf[..frames_in_window * bytes_per_frame], params.channels);
        let silent = level_db <= params.threshold_db;

        match state {
            WindowState::Speech if silent => {
                state = WindowState::Silence {
                    start_window: windows_done,
                };
            }
            WindowState::Silence { start_window } if !silent => {
                let end_s = windows_done as f64 * window_secs;
                close_silence(&mut silences, start_window, windows_done, end_s);
                state = WindowState::Speech;
            }
            _ => {}
        }

        windows_done += 1;

        // Checkpoint between window batches: poll cancellation, maybe report.
        if windows_done % ANALYSIS_BATCH_WINDOWS as u64 == 0 {
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
            if total_windows_estimate > 0 {
                let due = last_report.map_or(true, |t| {
                    t.elapsed().as_millis() as u64 >= PROGRESS_REPORT_INTERVAL_MS
                });
                if due {
                    let fraction =
                        (windows_done as f64 / total_windows_estimate as f64).min(1.0);
                    progress.report(fraction);
                    last_report = Some(Instant::now());
                }
            }
        }

        if read < window_bytes {
            break;
        }
    }

    let analyzed_duration_s = frames_total as f64 / params.sample_rate_hz as f64;
    if let WindowState::Silence { start_window } = state {
        close_silence(&mut silences, start_window, windows_done, analyzed_duration_s);
    }
    progress.report(1.0);

    Ok(SilenceOutcome {
        silences,
        analyzed_duration_s,
    })
}

/// Reads as much of one window as the stream still holds.
///
/// Short reads at end-of-stream are expected; callers receive whatever
/// arrived ("deliver all bytes received" tolerance for early pipe close).
fn fill_window<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Computes a window's level in dB full-scale.
///
/// Channels are mixed down by averaging each frame before squaring, so mono
/// and stereo input produce comparable levels. A window whose RMS rounds to
/// zero is assigned negative infinity.
fn window_level_db(bytes: &[u8], channels: u16) -> f64 {
    let channels = channels.max(1) as usize;
    let frame_count = bytes.len() / (channels * 2);
    if frame_count == 0 {
        return f64::NEG_INFINITY;
    }

    let mut sum_squares = 0.0f64;
    for frame in 0..frame_count {
        let mut mixed = 0.0f64;
        for ch in 0..channels {
            let offset = (frame * channels + ch) * 2;
            let sample = i16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
            mixed += sample as f64;
        }
        mixed /= channels as f64;
        sum_squares += mixed * mixed;
    }

    let rms = (sum_squares / frame_count as f64).sqrt();
    if rms <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * (rms / PCM_FULL_SCALE).log10()
    }
}
