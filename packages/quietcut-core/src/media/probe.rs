//! Container probing through the external probe tool.
//!
//! Runs the probe binary with JSON output and extracts the handful of fields
//! the pipeline needs: duration, container frame rate, and the audio
//! stream's channel count and sample rate.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use thiserror::Error;

/// Container facts reported by the probe.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Container duration in seconds.
    pub duration_s: f64,
    /// Container frame rate; `0.0` for audio-only sources.
    pub container_fps: f64,
    /// Channel count of the first audio stream.
    pub channels: u16,
    /// Sample rate of the first audio stream (Hz).
    pub sample_rate_hz: u32,
}

/// Errors from the probe stage.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe binary could not be started.
    #[error("failed to launch probe tool: {0}")]
    Launch(#[from] std::io::Error),

    /// The toolchain could not parse the container headers.
    #[error("unreadable container: {stderr_tail}")]
    UnreadableContainer {
        /// Tail of the tool's stderr output.
        stderr_tail: String,
    },

    /// The tool's JSON output did not match the expected shape.
    #[error("unparseable probe output: {0}")]
    Parse(String),

    /// The container holds no audio stream to analyze.
    #[error("container has no audio stream")]
    NoAudioStream,
}

#[derive(Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    channels: Option<u16>,
    sample_rate: Option<String>,
    duration: Option<String>,
}

/// Probes `input` with the tool at `binary`.
///
/// The input path travels as a distinct argument vector element; nothing is
/// ever shell-composed.
pub async fn probe(binary: &Path, input: &Path) -> Result<MediaInfo, ProbeError> {
    let output = tokio::process::Command::new(binary)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr_tail = tail_of(&String::from_utf8_lossy(&output.stderr));
        log::warn!(
            "[Probe] Tool failed for {}: {}",
            input.display(),
            stderr_tail
        );
        return Err(ProbeError::UnreadableContainer { stderr_tail });
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parses the probe tool's JSON report. Split out for testing.
pub(crate) fn parse_probe_output(json: &str) -> Result<MediaInfo, ProbeError> {
    let parsed: ProbeOutput =
        serde_json::from_str(json).map_err(|e| ProbeError::Parse(e.to_string()))?;

    let audio = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or(ProbeError::NoAudioStream)?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    let duration_s = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(audio.duration.as_deref())
        .and_then(|d| d.trim().parse::<f64>().ok())
        .ok_or_else(|| ProbeError::Parse("missing container duration".into()))?;

    let container_fps = video
        .and_then(|v| {
            parse_fraction(v.avg_frame_rate.as_deref())
                .or_else(|| parse_fraction(v.r_frame_rate.as_deref()))
        })
        .unwrap_or(0.0);

    let channels = audio.channels.unwrap_or(2).max(1);
    let sample_rate_hz = audio
        .sample_rate
        .as_deref()
        .and_then(|r| r.trim().parse::<u32>().ok())
        .ok_or_else(|| ProbeError::Parse("missing audio sample rate".into()))?;

    Ok(MediaInfo {
        duration_s,
        container_fps,
        channels,
        sample_rate_hz,
    })
}

/// Parses a `num/den` frame-rate fraction; `0/0` (no frames) yields `None`.
fn parse_fraction(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    if let Some((num, den)) = raw.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 || num == 0.0 {
            return None;
        }
        Some(num / den)
    } else {
        raw.parse::<f64>().ok().filter(|v| *v > 0.0)
    }
}

fn tail_of(stderr: &str) -> String {
    const TAIL: usize = crate::constants::DECODER_STDERR_TAIL_BYTES;
    if stderr.len() <= TAIL {
        stderr.trim().to_string()
    } else {
        let mut start = stderr.len() - TAIL;
        while !stderr.is_char_boundary(start) {
            start += 1;
        }
        stderr[start..].trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "codec_type": "video",
                "avg_frame_rate": "30000/1001",
                "r_frame_rate": "30000/1001"
            },
            {
                "codec_type": "audio",
                "channels": 2,
                "sample_rate": "48000",
                "duration": "9.98"
            }
        ],
        "format": { "duration": "10.005333" }
    }"#;

    #[test]
    fn parses_duration_fps_and_audio_params() {
        let info = parse_probe_output(SAMPLE).unwrap();
        assert!((info.duration_s - 10.005333).abs() < 1e-9);
        assert!((info.container_fps - 29.97002997).abs() < 1e-6);
        assert_eq!(info.channels, 2);
        assert_eq!(info.sample_rate_hz, 48000);
    }

    #[test]
    fn audio_only_container_has_zero_fps() {
        let json = r#"{
            "streams": [{ "codec_type": "audio", "channels": 1, "sample_rate": "44100" }],
            "format": { "duration": "4.2" }
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.container_fps, 0.0);
        assert_eq!(info.channels, 1);
    }

    #[test]
    fn missing_audio_stream_is_an_error() {
        let json = r#"{
            "streams": [{ "codec_type": "video", "r_frame_rate": "25/1" }],
            "format": { "duration": "4.2" }
        }"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(ProbeError::NoAudioStream)
        ));
    }

    #[test]
    fn degenerate_frame_rate_fractions_are_ignored() {
        assert_eq!(parse_fraction(Some("0/0")), None);
        assert_eq!(parse_fraction(Some("30/0")), None);
        assert_eq!(parse_fraction(Some("25/1")), Some(25.0));
        assert_eq!(parse_fraction(Some("29.97")), Some(29.97));
        assert_eq!(parse_fraction(None), None);
    }

    #[test]
    fn garbage_json_is_a_parse_error() {
        assert!(matches!(
            parse_probe_output("not json"),
            Err(ProbeError::Parse(_))
        ));
    }
}
