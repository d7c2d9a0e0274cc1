//! Transcript model and the transcription collaborator interface.
//!
//! Transcription itself is an external dependency: a speech-to-text service
//! that reads the uploaded media and returns timed segments. This module
//! specifies that interface ([`Transcriber`]) and ships the HTTP client
//! implementation used in production ([`http::HttpTranscriber`]).

pub mod http;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model size requested from the transcription collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// Wire name of the model size.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

/// One word with its timing inside a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTiming {
    /// The word as transcribed (original casing and punctuation).
    pub text: String,
    /// Word start, seconds from the beginning of the source.
    pub start_s: f64,
    /// Word end, seconds from the beginning of the source.
    pub end_s: f64,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A transcript segment; immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    /// Segment start, seconds from the beginning of the source.
    pub start_s: f64,
    /// Segment end, seconds from the beginning of the source.
    pub end_s: f64,
    /// Full segment text.
    pub text: String,
    /// Word-level timings, when the model provides them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordTiming>>,
}

/// Errors from the transcription collaborator.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// The service is not reachable or refused the request.
    #[error("transcription service unavailable: {0}")]
    Unavailable(String),

    /// The service answered but the payload did not match the contract.
    #[error("transcription protocol error: {0}")]
    Protocol(String),
}

/// Interface of the speech-to-text collaborator.
///
/// The contract is: read the media file at `source`, transcribe its audio
/// with the requested model size, and return segments ordered by start time.
/// Implementations never mutate the source media.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes the media file at `source`.
    async fn transcribe(
        &self,
        source: &Path,
        model: ModelSize,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_size_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ModelSize::Base).unwrap(), "\"base\"");
        let parsed: ModelSize = serde_json::from_str("\"large\"").unwrap();
        assert_eq!(parsed, ModelSize::Large);
    }

    #[test]
    fn segment_without_words_round_trips() {
        let json = r#"{"startS":1.0,"endS":2.5,"text":"bonjour"}"#;
        let seg: TranscriptSegment = serde_json::from_str(json).unwrap();
        assert!(seg.words.is_none());
        let back = serde_json::to_string(&seg).unwrap();
        assert!(!back.contains("words"));
    }
}
