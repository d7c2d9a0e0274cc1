//! HTTP client for the transcription collaborator.
//!
//! The collaborator is any service satisfying this contract:
//!
//! - `POST {endpoint}/transcribe` with JSON `{ "path": ..., "model": ... }`
//! - responds `200` with JSON `{ "segments": [TranscriptSegment, ...] }`
//!
//! The service runs next to QuietCut and reads the uploaded file directly;
//! audio bytes never travel over this connection.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ModelSize, Transcriber, TranscriptSegment, TranscriptionError};

/// Timeout for one transcription request.
///
/// Transcription of a long talk can legitimately take minutes; this bounds
/// hung connections, not honest work.
const TRANSCRIBE_TIMEOUT_SECS: u64 = 1800;

#[derive(Serialize)]
struct TranscribeRequest<'a> {
    path: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct TranscribeResponse {
    segments: Vec<TranscriptSegment>,
}

/// [`Transcriber`] implementation backed by an HTTP transcription service.
pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranscriber {
    /// Creates a client for the service at `endpoint` (no trailing slash).
    pub fn new(endpoint: impl Into<String>) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TRANSCRIBE_TIMEOUT_SECS))
            .build()
            .map_err(|e| TranscriptionError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        source: &Path,
        model: ModelSize,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        let url = format!("{}/transcribe", self.endpoint);
        let body = TranscribeRequest {
            path: &source.to_string_lossy(),
            model: model.as_str(),
        };

        log::info!(
            "[Transcript] Requesting transcription: model={}, source={}",
            model.as_str(),
            source.display()
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TranscriptionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Unavailable(format!(
                "service returned {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Protocol(e.to_string()))?;

        let mut segments = parsed.segments;
        // Ordering is part of the contract; enforce it rather than trusting
        // the collaborator across versions.
        segments.sort_by(|a, b| {
            a.start_s
                .partial_cmp(&b.start_s)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        log::info!("[Transcript] Received {} segment(s)", segments.len());
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let t = HttpTranscriber::new("http://localhost:9090/").unwrap();
        assert_eq!(t.endpoint, "http://localhost:9090");
    }

    #[test]
    fn response_payload_parses() {
        let json = r#"{"segments":[{"startS":0.0,"endS":1.2,"text":"euh bonjour",
            "words":[{"text":"euh","startS":0.0,"endS":0.3,"confidence":0.92},
                     {"text":"bonjour","startS":0.35,"endS":1.2,"confidence":0.99}]}]}"#;
        let parsed: TranscribeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.segments[0].words.as_ref().unwrap().len(), 2);
    }
}
