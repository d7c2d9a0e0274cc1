//! Centralized error types for the QuietCut core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses
//!
//! Stage errors (probe, decode, analysis, transcription) never cross the
//! API boundary directly; the orchestrator folds them into job failure
//! reasons, and only [`QuietcutError`] reaches HTTP clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::context::StorageError;
use crate::jobs::SettingsError;
use crate::media::{DecodeError, ProbeError};
use crate::transcript::TranscriptionError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for ProbeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Launch(_) => "probe_launch_failed",
            Self::UnreadableContainer { .. } => "unreadable_container",
            Self::Parse(_) => "probe_parse_error",
            Self::NoAudioStream => "no_audio_stream",
        }
    }
}

impl ErrorCode for DecodeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Launch(_) => "decoder_launch_failed",
            Self::ToolchainFailed { .. } => "decoder_failed",
        }
    }
}

impl ErrorCode for TranscriptionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "transcription_unavailable",
            Self::Protocol(_) => "transcription_protocol_error",
        }
    }
}

impl ErrorCode for StorageError {
    fn code(&self) -> &'static str {
        match self {
            Self::Root(_) => "storage_root_error",
            Self::UnsupportedExtension(_) => "unsupported_extension",
            Self::OutsideUploadRoot => "path_outside_upload_root",
        }
    }
}

/// Application-wide error type for the QuietCut API surface.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum QuietcutError {
    /// Bad option value, unsupported extension, malformed multipart body.
    /// Surfaced synchronously to the uploader; never creates a job.
    #[error("Invalid input: {0}")]
    InputInvalid(String),

    /// The upload exceeded the configured size cap.
    #[error("Upload too large: limit is {limit_bytes} bytes")]
    UploadTooLarge { limit_bytes: u64 },

    /// Requested job id does not exist.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Requested export file does not exist for this job.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// The operation conflicts with the job's current state
    /// (e.g. removing a job that is still running).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Server configuration error (missing required settings).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl QuietcutError {
    /// Returns a machine-readable error code for API responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputInvalid(_) => "input_invalid",
            Self::UploadTooLarge { .. } => "upload_too_large",
            Self::JobNotFound(_) => "job_not_found",
            Self::FileNotFound(_) => "file_not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InputInvalid(_) => StatusCode::BAD_REQUEST,
            Self::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::JobNotFound(_) | Self::FileNotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for API operations.
pub type QuietcutResult<T> = Result<T, QuietcutError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for QuietcutError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<SettingsError> for QuietcutError {
    fn from(err: SettingsError) -> Self {
        Self::InputInvalid(err.to_string())
    }
}

impl From<StorageError> for QuietcutError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnsupportedExtension(_) | StorageError::OutsideUploadRoot => {
                Self::InputInvalid(err.to_string())
            }
            StorageError::Root(e) => Self::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_invalid_maps_to_bad_request() {
        let err = QuietcutError::InputInvalid("fps 48 unsupported".into());
        assert_eq!(err.code(), "input_invalid");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upload_too_large_maps_to_413() {
        let err = QuietcutError::UploadTooLarge {
            limit_bytes: 1024,
        };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(err.to_string().contains("1024"));
    }

    #[test]
    fn settings_error_becomes_input_invalid() {
        let err: QuietcutError = SettingsError {
            option: "padding_ms",
            detail: "1500 is outside 0..1000".into(),
        }
        .into();
        assert_eq!(err.code(), "input_invalid");
    }

    #[test]
    fn stage_error_codes_are_stable() {
        assert_eq!(ProbeError::NoAudioStream.code(), "no_audio_stream");
        assert_eq!(
            DecodeError::ToolchainFailed {
                stderr_tail: String::new()
            }
            .code(),
            "decoder_failed"
        );
        assert_eq!(
            TranscriptionError::Unavailable("down".into()).code(),
            "transcription_unavailable"
        );
    }
}
