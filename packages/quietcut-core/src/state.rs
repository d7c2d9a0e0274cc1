//! Core application configuration.
//!
//! Provides [`Config`] (the validated runtime configuration of the pipeline
//! and API surface) and [`TranscriptionConfig`] for the transcription
//! collaborator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the transcription collaborator.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TranscriptionConfig {
    /// Base URL of the transcription service; `None` disables transcription.
    pub endpoint: Option<String>,

    /// When true, an unavailable transcriber fails jobs that requested
    /// filler detection; when false the stage is skipped with a warning.
    #[serde(default)]
    pub required: bool,
}

/// Configuration for the QuietCut core.
///
/// All fields have sensible defaults; the server binary layers YAML and
/// environment overrides on top.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    // Server
    /// Preferred port for the HTTP/WS server (0 = auto-allocate).
    pub preferred_port: u16,

    // Storage
    /// Directory receiving raw uploads (one subdirectory per job).
    pub upload_root: PathBuf,

    /// Directory receiving exports (one subdirectory per job).
    pub output_root: PathBuf,

    /// Directory for persistent job records; `None` disables persistence.
    pub data_dir: Option<PathBuf>,

    /// Uploads above this size are refused.
    pub max_upload_bytes: u64,

    // Pipeline
    /// Upper bound on concurrent analyses across the system.
    pub max_concurrent_analyses: usize,

    /// Path to the external decode tool.
    pub decoder_binary: PathBuf,

    /// Path to the external probe tool; derived from the decoder when unset.
    pub probe_binary: Option<PathBuf>,

    /// Transcription collaborator configuration.
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    // WebSocket
    /// WebSocket heartbeat timeout (seconds).
    pub ws_heartbeat_timeout_secs: u64,

    /// Interval between WebSocket heartbeat checks (seconds).
    pub ws_heartbeat_check_interval_secs: u64,

    /// Capacity of the event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 0,
            upload_root: PathBuf::from("./data/uploads"),
            output_root: PathBuf::from("./data/output"),
            data_dir: None,
            max_upload_bytes: 2 * 1024 * 1024 * 1024,
            max_concurrent_analyses: 2,
            decoder_binary: PathBuf::from("ffmpeg"),
            probe_binary: None,
            transcription: TranscriptionConfig::default(),
            ws_heartbeat_timeout_secs: crate::constants::WS_HEARTBEAT_TIMEOUT_SECS,
            ws_heartbeat_check_interval_secs: crate::constants::WS_HEARTBEAT_CHECK_INTERVAL_SECS,
            event_channel_capacity: crate::constants::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Validates values that would cause runtime issues.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_analyses == 0 {
            return Err("max_concurrent_analyses must be >= 1".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be >= 1".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".to_string(),
            );
        }
        if self.upload_root == self.output_root {
            return Err("upload_root and output_root must differ".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = Config {
            max_concurrent_analyses: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn identical_roots_are_rejected() {
        let config = Config {
            upload_root: PathBuf::from("./data"),
            output_root: PathBuf::from("./data"),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
