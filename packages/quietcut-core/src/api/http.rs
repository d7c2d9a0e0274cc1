//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to the orchestrator and store for
//! business logic. Upload admission validates the configuration block and
//! the file extension before any job record exists; the media body is then
//! streamed to the job's upload directory under the size cap.

use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::constants::SERVICE_ID;
use crate::error::{QuietcutError, QuietcutResult};
use crate::jobs::{Job, JobId, JobSettings, JobStatus};

// ─────────────────────────────────────────────────────────────────────────────
// Response Helpers
// ─────────────────────────────────────────────────────────────────────────────
//
// Success responses are always JSON objects built with `json!`; errors never
// go through here - they are `QuietcutError` values rendered by its
// `IntoResponse` impl with a machine-readable code.

/// Wraps a JSON payload in a 200 response.
fn api_json(data: serde_json::Value) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Acknowledgement body for control endpoints (cancel, remove).
fn api_done() -> Response {
    api_json(json!({ "success": true }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    // The multipart body carries the media file plus a small options part.
    let body_limit = state.config.read().max_upload_bytes as usize + 1024 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/jobs", post(create_job).get(list_jobs))
        .route("/api/jobs/{id}", get(get_job).delete(remove_job))
        .route("/api/jobs/{id}/cancel", post(cancel_job))
        .route("/api/jobs/{id}/files/{name}", get(download_file))
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_job_id(raw: &str) -> QuietcutResult<JobId> {
    raw.parse()
        .map_err(|_| QuietcutError::InputInvalid(format!("malformed job id: {raw:?}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe: "Is the process running?"
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.read();
    api_json(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "limits": {
            "maxUploadBytes": config.max_upload_bytes,
            "maxConcurrentAnalyses": config.max_concurrent_analyses
        }
    }))
}

/// Readiness probe: "Can the service take uploads?"
///
/// Verifies the storage roots exist and, when the decoder binary is an
/// absolute path, that it is present on disk.
async fn readiness_check(State(state): State<AppState>) -> Response {
    let storage = state.orchestrator.storage();
    let decoder = state.config.read().decoder_binary.clone();

    let uploads_ready = storage.upload_root().is_dir();
    let outputs_ready = storage.output_root().is_dir();
    let decoder_ready = !decoder.is_absolute() || decoder.is_file();
    let ready = uploads_ready && outputs_ready && decoder_ready;

    let body = json!({
        "status": if ready { "ready" } else { "not_ready" },
        "ready": ready,
        "checks": {
            "uploadRoot": { "ready": uploads_ready },
            "outputRoot": { "ready": outputs_ready },
            "decoder": { "ready": decoder_ready, "value": decoder.display().to_string() }
        }
    });

    if ready {
        api_json(body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Upload
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/jobs
///
/// Multipart request with an `options` part (JSON configuration block,
/// optional, must precede the media) and one `media` part (the file).
/// Invalid options or an unsupported extension fail the request before a
/// job is created.
async fn create_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> QuietcutResult<impl IntoResponse> {
    let mut admitted: Option<Job> = None;
    let result = receive_upload(&state, &mut multipart, &mut admitted).await;

    let job = match result {
        Ok(job) => job,
        Err(e) => {
            // A record admitted mid-request must not outlive the failure.
            if let Some(job) = admitted {
                state.orchestrator.discard_upload(&job.id);
            }
            return Err(e);
        }
    };
    state.orchestrator.finalize_upload(job.id)?;

    log::info!(
        "[API] Upload accepted: job={}, file={}",
        job.id,
        job.source_filename
    );
    Ok(api_json(json!({
        "jobId": job.id.to_string(),
        "status": "uploaded"
    })))
}

/// Walks the multipart parts: an optional `options` part (which must precede
/// the media), then exactly one `media` part streamed to disk.
async fn receive_upload(
    state: &AppState,
    multipart: &mut Multipart,
    admitted: &mut Option<Job>,
) -> QuietcutResult<Job> {
    let max_upload_bytes = state.config.read().max_upload_bytes;
    let mut settings: Option<JobSettings> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| QuietcutError::InputInvalid(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("options") => {
                if admitted.is_some() {
                    return Err(QuietcutError::InputInvalid(
                        "options part must precede the media part".into(),
                    ));
                }
                let text = field.text().await.map_err(|e| {
                    QuietcutError::InputInvalid(format!("unreadable options part: {e}"))
                })?;
                let parsed: JobSettings = serde_json::from_str(&text)
                    .map_err(|e| QuietcutError::InputInvalid(format!("invalid options: {e}")))?;
                settings = Some(parsed);
            }
            Some("media") => {
                if admitted.is_some() {
                    return Err(QuietcutError::InputInvalid("duplicate media part".into()));
                }
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| {
                        QuietcutError::InputInvalid("media part missing a file name".into())
                    })?;

                let job = state
                    .orchestrator
                    .admit(&filename, settings.clone().unwrap_or_default())?;
                let source_path = job.source_path.clone();
                *admitted = Some(job);

                stream_field_to_disk(field, &source_path, max_upload_bytes).await?;
            }
            other => {
                return Err(QuietcutError::InputInvalid(format!(
                    "unknown multipart part: {other:?}"
                )));
            }
        }
    }

    admitted
        .clone()
        .ok_or_else(|| QuietcutError::InputInvalid("missing media part".into()))
}

/// Streams a multipart field to disk, enforcing the upload size cap.
async fn stream_field_to_disk(
    mut field: Field<'_>,
    path: &std::path::Path,
    max_bytes: u64,
) -> QuietcutResult<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| QuietcutError::Internal(format!("cannot create upload file: {e}")))?;

    let mut written: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| QuietcutError::InputInvalid(format!("upload stream error: {e}")))?
    {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(QuietcutError::UploadTooLarge {
                limit_bytes: max_bytes,
            });
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| QuietcutError::Internal(format!("upload write error: {e}")))?;
    }

    if written == 0 {
        return Err(QuietcutError::InputInvalid("empty media upload".into()));
    }

    file.flush()
        .await
        .map_err(|e| QuietcutError::Internal(format!("upload flush error: {e}")))?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Job Queries & Control
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/jobs
async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    let jobs: Vec<serde_json::Value> = state
        .orchestrator
        .store()
        .list()
        .iter()
        .map(|job| {
            json!({
                "id": job.id.to_string(),
                "status": job.status.name(),
                "progress": job.progress,
                "sourceFilename": job.source_filename,
                "createdAtMs": job.created_at_ms,
            })
        })
        .collect();
    api_json(json!({ "jobs": jobs }))
}

/// GET /api/jobs/:id
async fn get_job(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> QuietcutResult<impl IntoResponse> {
    let id = parse_job_id(&id)?;
    let job = state
        .orchestrator
        .store()
        .get(&id)
        .ok_or_else(|| QuietcutError::JobNotFound(id.to_string()))?;
    Ok(api_json(job_status_payload(&job)))
}

/// Builds the status payload: `{ status, progress, message, result?, error? }`.
fn job_status_payload(job: &Job) -> serde_json::Value {
    let mut body = json!({
        "id": job.id.to_string(),
        "status": job.status.name(),
        "progress": job.progress,
        "message": job.message,
        "sourceFilename": job.source_filename,
        "createdAtMs": job.created_at_ms,
        "settings": job.settings,
        "timings": job.timings,
    });

    if !job.warnings.is_empty() {
        body["warnings"] = json!(job.warnings);
    }

    match &job.status {
        JobStatus::Analyzing { phase, .. } => {
            body["phase"] = json!(phase);
        }
        JobStatus::Completed { report } => {
            let mut files = serde_json::Map::new();
            if let Some(result_files) = &job.result_files {
                for (name, _) in result_files.entries() {
                    files.insert(
                        name.to_string(),
                        json!(format!("/api/jobs/{}/files/{}", job.id, name)),
                    );
                }
            }
            body["result"] = json!({
                "report": report.summary(),
                "files": files,
            });
        }
        JobStatus::Failed { reason } => {
            // Coarse reason only; tool output stays in the job's log file.
            body["error"] = json!({
                "code": reason.code(),
                "reason": reason.phrase(),
            });
        }
        _ => {}
    }

    body
}

/// POST /api/jobs/:id/cancel
///
/// Idempotent; succeeds whether the job is running or terminal.
async fn cancel_job(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> QuietcutResult<impl IntoResponse> {
    let id = parse_job_id(&id)?;
    state.orchestrator.cancel(&id)?;
    Ok(api_done())
}

/// DELETE /api/jobs/:id
///
/// Removes a terminal job and deletes its working directories.
async fn remove_job(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> QuietcutResult<impl IntoResponse> {
    let id = parse_job_id(&id)?;
    state.orchestrator.remove(&id)?;
    Ok(api_done())
}

// ─────────────────────────────────────────────────────────────────────────────
// Downloads
// ─────────────────────────────────────────────────────────────────────────────

fn content_type_for(name: &str) -> &'static str {
    if name.ends_with(".xml") {
        "application/xml"
    } else if name.ends_with(".srt") {
        "application/x-subrip"
    } else if name.ends_with(".vtt") {
        "text/vtt"
    } else {
        "text/plain; charset=utf-8"
    }
}

/// GET /api/jobs/:id/files/:name
///
/// Serves an export artifact by its wire name (`legacy.xml`,
/// `structural.xml`, `transcript.srt`, ...). Names resolve only through the
/// job's recorded result paths; nothing else under the output root is
/// reachable.
async fn download_file(
    Path((id, name)): Path<(String, String)>,
    State(state): State<AppState>,
) -> QuietcutResult<Response> {
    let id = parse_job_id(&id)?;
    let job = state
        .orchestrator
        .store()
        .get(&id)
        .ok_or_else(|| QuietcutError::JobNotFound(id.to_string()))?;

    let files = job
        .result_files
        .as_ref()
        .ok_or_else(|| QuietcutError::FileNotFound(name.clone()))?;
    let path = files
        .entries()
        .into_iter()
        .find(|(wire_name, _)| *wire_name == name)
        .map(|(_, path)| path.clone())
        .ok_or_else(|| QuietcutError::FileNotFound(name.clone()))?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| QuietcutError::FileNotFound(name.clone()))?;

    let download_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(&name)
        .to_string();

    Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&name))
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{download_name}\""),
        )
        .body(bytes.into())
        .map_err(|e| QuietcutError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::FailureReason;
    use std::path::PathBuf;

    #[test]
    fn content_types_match_extensions() {
        assert_eq!(content_type_for("legacy.xml"), "application/xml");
        assert_eq!(content_type_for("transcript.srt"), "application/x-subrip");
        assert_eq!(content_type_for("transcript.vtt"), "text/vtt");
        assert_eq!(
            content_type_for("transcript.txt"),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn malformed_job_ids_are_rejected() {
        assert!(parse_job_id("not-a-uuid").is_err());
        assert!(parse_job_id("4a3f31e2-9a50-4fc5-b3f2-1f1e35a4f10a").is_ok());
    }

    #[test]
    fn failed_status_payload_carries_coarse_error_only() {
        let mut job = Job::new(
            "talk.mp4".into(),
            PathBuf::from("/uploads/x/talk.mp4"),
            JobSettings::default(),
        );
        job.status = JobStatus::Failed {
            reason: FailureReason::DecodeFailed {
                detail: "moov atom not found at byte 12345".into(),
            },
        };

        let payload = job_status_payload(&job);
        assert_eq!(payload["error"]["code"], "decode_failed");
        assert!(!payload["error"]["reason"]
            .as_str()
            .unwrap()
            .contains("moov"));
        assert!(payload.get("result").is_none());
    }

    #[test]
    fn analyzing_status_payload_exposes_phase() {
        let mut job = Job::new(
            "talk.mp4".into(),
            PathBuf::from("/uploads/x/talk.mp4"),
            JobSettings::default(),
        );
        job.status = JobStatus::Analyzing {
            progress: 0.3,
            phase: crate::jobs::AnalysisPhase::Decoding,
        };
        job.progress = 0.3;

        let payload = job_status_payload(&job);
        assert_eq!(payload["status"], "analyzing");
        assert_eq!(payload["phase"], "decoding");
    }
}
