//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.
//! The documented environment names (`UPLOAD_ROOT`, `OUTPUT_ROOT`,
//! `MAX_UPLOAD_BYTES`, `MAX_CONCURRENT_ANALYSES`, `DECODER_BINARY`) always
//! win over the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to (0 = auto-allocate).
    /// Override: `QUIETCUT_BIND_PORT`
    pub bind_port: u16,

    /// Directory receiving raw uploads.
    /// Override: `UPLOAD_ROOT`
    pub upload_root: PathBuf,

    /// Directory receiving exports.
    /// Override: `OUTPUT_ROOT`
    pub output_root: PathBuf,

    /// Directory for persistent job records.
    /// Override: `QUIETCUT_DATA_DIR`
    pub data_dir: Option<PathBuf>,

    /// Uploads above this size are refused.
    /// Override: `MAX_UPLOAD_BYTES`
    pub max_upload_bytes: u64,

    /// Upper bound on concurrent analyses.
    /// Override: `MAX_CONCURRENT_ANALYSES`
    pub max_concurrent_analyses: usize,

    /// Path to the external decode tool.
    /// Override: `DECODER_BINARY`
    pub decoder_binary: PathBuf,

    /// Path to the external probe tool (derived from the decoder when unset).
    /// Override: `PROBE_BINARY`
    pub probe_binary: Option<PathBuf>,

    /// Base URL of the transcription service; unset disables transcription.
    /// Override: `QUIETCUT_TRANSCRIPTION_ENDPOINT`
    pub transcription_endpoint: Option<String>,

    /// When true, jobs requesting filler detection fail if the transcription
    /// service is unavailable instead of downgrading to a warning.
    pub transcription_required: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = quietcut_core::Config::default();
        Self {
            bind_port: 0,
            upload_root: core.upload_root,
            output_root: core.output_root,
            data_dir: None,
            max_upload_bytes: core.max_upload_bytes,
            max_concurrent_analyses: core.max_concurrent_analyses,
            decoder_binary: core.decoder_binary,
            probe_binary: None,
            transcription_endpoint: None,
            transcription_required: false,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("QUIETCUT_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }
        if let Ok(val) = std::env::var("UPLOAD_ROOT") {
            self.upload_root = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("OUTPUT_ROOT") {
            self.output_root = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("MAX_UPLOAD_BYTES") {
            if let Ok(bytes) = val.parse() {
                self.max_upload_bytes = bytes;
            }
        }
        if let Ok(val) = std::env::var("MAX_CONCURRENT_ANALYSES") {
            if let Ok(count) = val.parse() {
                self.max_concurrent_analyses = count;
            }
        }
        if let Ok(val) = std::env::var("DECODER_BINARY") {
            self.decoder_binary = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("PROBE_BINARY") {
            self.probe_binary = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("QUIETCUT_TRANSCRIPTION_ENDPOINT") {
            self.transcription_endpoint = Some(val);
        }

        // Note: QUIETCUT_DATA_DIR is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to quietcut-core's Config type.
    pub fn to_core_config(&self) -> quietcut_core::Config {
        quietcut_core::Config {
            preferred_port: self.bind_port,
            upload_root: self.upload_root.clone(),
            output_root: self.output_root.clone(),
            data_dir: self.data_dir.clone(),
            max_upload_bytes: self.max_upload_bytes,
            max_concurrent_analyses: self.max_concurrent_analyses,
            decoder_binary: self.decoder_binary.clone(),
            probe_binary: self.probe_binary.clone(),
            transcription: quietcut_core::TranscriptionConfig {
                endpoint: self.transcription_endpoint.clone(),
                required: self.transcription_required,
            },
            ..Default::default()
        }
    }
}
