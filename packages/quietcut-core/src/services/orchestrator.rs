//! Job orchestrator: drives the per-job state machine.
//!
//! The orchestrator is the single catch point of the pipeline. It admits
//! jobs, dispatches analysis onto the worker pool behind a concurrency
//! semaphore (FIFO beyond the limit), persists every transition and progress
//! update through the store, emits events to subscribers, and owns
//! cancellation: flag, child-process termination, and cleanup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::analysis::fillers::{self, FillerHit};
use crate::analysis::planner;
use crate::analysis::silence::{self, SilenceOutcome, SilenceParams};
use crate::analysis::{AnalysisError, AnalysisReport, CancelFlag};
use crate::constants::{
    DECODER_LOG_FILE, PROGRESS_AFTER_ANALYZE, PROGRESS_AFTER_ANALYZE_NO_TRANSCRIPT,
    PROGRESS_AFTER_PLAN, PROGRESS_AFTER_PROBE, PROGRESS_AFTER_TRANSCRIBE,
};
use crate::context::StorageContext;
use crate::error::{QuietcutError, QuietcutResult};
use crate::events::{EventEmitter, JobEvent};
use crate::export::{legacy, structural, subtitles, verify, EdlInput};
use crate::jobs::store::JobStore;
use crate::jobs::{
    AnalysisPhase, FailureReason, Job, JobId, JobSettings, JobStatus, ResultFiles,
};
use crate::media::{DecodeError, DecoderKillHandle, MediaInfo, MediaToolchain, PcmRequest};
use crate::timeline::Cut;
use crate::transcript::{Transcriber, TranscriptSegment};
use crate::utils::{file_stem, now_millis};

/// Per-job runtime state while an analysis task exists.
///
/// Entries are created through the entry API by whichever side arrives
/// first: the pipeline task, or a cancellation that needs somewhere to
/// leave its flag.
#[derive(Default)]
struct ActiveAnalysis {
    cancel: CancelFlag,
    /// Kill handle of the running decoder child, when one exists.
    decoder: Arc<Mutex<Option<DecoderKillHandle>>>,
}

/// How a pipeline run ended short of completion.
enum PipelineEnd {
    Cancelled,
    Failed(FailureReason),
}

/// Orchestrates the upload -> probe -> analyze -> plan -> export pipeline.
pub struct JobOrchestrator {
    store: Arc<JobStore>,
    storage: Arc<StorageContext>,
    toolchain: MediaToolchain,
    transcriber: Option<Arc<dyn Transcriber>>,
    transcription_required: bool,
    emitter: Arc<dyn EventEmitter>,
    permits: Arc<Semaphore>,
    active: DashMap<JobId, ActiveAnalysis>,
    /// Handle of the I/O runtime; pipeline tasks are spawned here and hop
    /// onto the blocking worker pool for the CPU-bound stages themselves.
    runtime: tokio::runtime::Handle,
}

impl JobOrchestrator {
    /// Wires the orchestrator with its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<JobStore>,
        storage: Arc<StorageContext>,
        toolchain: MediaToolchain,
        transcriber: Option<Arc<dyn Transcriber>>,
        transcription_required: bool,
        emitter: Arc<dyn EventEmitter>,
        max_concurrent_analyses: usize,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            store,
            storage,
            toolchain,
            transcriber,
            transcription_required,
            emitter,
            permits: Arc::new(Semaphore::new(max_concurrent_analyses.max(1))),
            active: DashMap::new(),
            runtime,
        }
    }

    /// The job store (read access for API handlers).
    #[must_use]
    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// The storage context.
    #[must_use]
    pub fn storage(&self) -> &Arc<StorageContext> {
        &self.storage
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Admission & Upload
    // ─────────────────────────────────────────────────────────────────────────

    /// Admits a new job: validates settings and extension, reserves the
    /// upload location, opens the record in `Uploading` state.
    ///
    /// All input validation happens before the record exists; an invalid
    /// request never creates a job.
    pub fn admit(&self, source_filename: &str, settings: JobSettings) -> QuietcutResult<Job> {
        settings.validate()?;
        let extension = StorageContext::validate_extension(source_filename)?;

        // Only the sanitized stem survives; the client's path components do not.
        let stem = sanitize_stem(&file_stem(Path::new(source_filename)));
        let safe_name = format!("{stem}.{extension}");

        let job = Job::new(safe_name.clone(), PathBuf::new(), settings);
        let upload_dir = self
            .storage
            .create_job_upload_dir(&job.id)
            .map_err(|e| QuietcutError::Internal(e.to_string()))?;

        let mut job = job;
        job.source_path = upload_dir.join(&safe_name);

        log::info!(
            "[Jobs] Admitted job {}: file={}, fps={}, fillers={}",
            job.id,
            job.source_filename,
            job.settings.fps,
            job.settings.detect_fillers
        );
        self.store.insert(job.clone());
        Ok(job)
    }

    /// Marks the upload complete and schedules the analysis task.
    pub fn finalize_upload(self: &Arc<Self>, id: JobId) -> QuietcutResult<()> {
        let job = self
            .store
            .get(&id)
            .ok_or_else(|| QuietcutError::JobNotFound(id.to_string()))?;
        if job.status.is_terminal() {
            // Cancelled while uploading; nothing to schedule.
            return Ok(());
        }
        self.store.transition(&id, JobStatus::Uploaded);

        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            this.run_pipeline(id).await;
        });
        Ok(())
    }

    /// Discards a job whose upload never completed, as if it was never
    /// admitted (record and directories removed).
    pub fn discard_upload(&self, id: &JobId) {
        self.store.remove(id);
        self.storage.remove_job_dirs(id);
        log::info!("[Jobs] Discarded incomplete upload {}", id);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cancellation & Removal
    // ─────────────────────────────────────────────────────────────────────────

    /// Cancels a job. Idempotent; cancelling a terminal job is a no-op.
    ///
    /// Flips the cancellation flag, terminates any child decoder, and (when
    /// no analysis task is running) transitions the record directly.
    pub fn cancel(&self, id: &JobId) -> QuietcutResult<()> {
        let job = self
            .store
            .get(id)
            .ok_or_else(|| QuietcutError::JobNotFound(id.to_string()))?;
        if job.status.is_terminal() {
            return Ok(());
        }

        // Leave the flag where the pipeline task will find it, creating the
        // entry if the task has not started yet; then terminate any child.
        {
            let entry = self.active.entry(*id).or_default();
            entry.cancel.cancel();
            let guard = entry.decoder.lock();
            if let Some(handle) = guard.as_ref() {
                handle.kill();
            }
        }
        log::info!("[Jobs] Cancellation requested for job {}", id);

        if matches!(job.status, JobStatus::Uploading) {
            // No analysis task will ever observe the flag for a job whose
            // upload is still streaming; transition the record directly.
            self.active.remove(id);
            self.store.transition(id, JobStatus::Cancelled);
            self.emitter.emit_job(JobEvent::Cancelled {
                job_id: *id,
                timestamp: now_millis(),
            });
        }
        Ok(())
    }

    /// Removes a terminal job and deletes its directories.
    pub fn remove(&self, id: &JobId) -> QuietcutResult<Job> {
        let job = self
            .store
            .get(id)
            .ok_or_else(|| QuietcutError::JobNotFound(id.to_string()))?;
        if !job.status.is_terminal() {
            return Err(QuietcutError::Conflict(
                "job is still running; cancel it first".into(),
            ));
        }
        let removed = self
            .store
            .remove(id)
            .ok_or_else(|| QuietcutError::JobNotFound(id.to_string()))?;
        self.storage.remove_job_dirs(id);
        Ok(removed)
    }

    /// Cancels all running analyses (graceful shutdown path).
    pub fn shutdown(&self) {
        let ids: Vec<JobId> = self.active.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Err(e) = self.cancel(&id) {
                log::warn!("[Jobs] Shutdown cancel of {} failed: {}", id, e);
            }
        }
    }

    /// Number of jobs with a live analysis task.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline
    // ─────────────────────────────────────────────────────────────────────────

    async fn run_pipeline(self: Arc<Self>, id: JobId) {
        // FIFO queueing beyond the concurrency bound.
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return, // semaphore closed: process shutting down
        };

        // Entry first, then the status check: a cancellation landing in
        // between finds the flag slot and is observed at the first checkpoint.
        self.active.entry(id).or_default();

        let Some(job) = self.store.get(&id) else {
            self.active.remove(&id);
            return; // discarded while queued
        };
        if job.status.is_terminal() {
            self.active.remove(&id);
            return; // cancelled while queued
        }

        let outcome = self.execute(&job).await;
        match outcome {
            Ok(report) => {
                let summary = report.summary();
                self.store.transition(&id, JobStatus::Completed { report });
                self.emitter.emit_job(JobEvent::Completed {
                    job_id: id,
                    report: summary,
                    timestamp: now_millis(),
                });
                log::info!("[Jobs] Job {} completed", id);
            }
            Err(PipelineEnd::Cancelled) => {
                self.remove_partial_exports(&job);
                self.store.transition(&id, JobStatus::Cancelled);
                self.emitter.emit_job(JobEvent::Cancelled {
                    job_id: id,
                    timestamp: now_millis(),
                });
                log::info!("[Jobs] Job {} cancelled", id);
            }
            Err(PipelineEnd::Failed(reason)) => {
                log::warn!("[Jobs] Job {} failed: {}", id, reason.code());
                let phrase = reason.phrase().to_string();
                self.store.transition(&id, JobStatus::Failed { reason });
                self.emitter.emit_job(JobEvent::Failed {
                    job_id: id,
                    reason: phrase,
                    timestamp: now_millis(),
                });
            }
        }

        self.active.remove(&id);
        drop(permit);
    }

    async fn execute(self: &Arc<Self>, job: &Job) -> Result<AnalysisReport, PipelineEnd> {
        let id = job.id;
        let cancel = self
            .active
            .get(&id)
            .map(|e| e.cancel.clone())
            .unwrap_or_default();
        self.check_cancel(&cancel)?;

        // Stage 1: probe
        self.store.transition(
            &id,
            JobStatus::Analyzing {
                progress: 0.0,
                phase: AnalysisPhase::Probing,
            },
        );
        self.report_progress(&id, 0.0, "Probing container");

        let probe_started = Instant::now();
        let info = self.probe_source(job).await?;
        self.store.record_timing(&id, |t| {
            t.probe_ms = Some(probe_started.elapsed().as_millis() as u64)
        });
        self.check_cancel(&cancel)?;
        self.report_progress(&id, PROGRESS_AFTER_PROBE, "Analyzing audio");

        // Stage 2: decode + silence analysis on the worker pool
        let transcription_planned = job.settings.detect_fillers;
        let analyze_end = if transcription_planned {
            PROGRESS_AFTER_ANALYZE
        } else {
            PROGRESS_AFTER_ANALYZE_NO_TRANSCRIPT
        };
        self.store.transition(
            &id,
            JobStatus::Analyzing {
                progress: PROGRESS_AFTER_PROBE,
                phase: AnalysisPhase::Decoding,
            },
        );

        let analyze_started = Instant::now();
        let outcome = self
            .run_decode_and_silence(job, &info, cancel.clone(), analyze_end)
            .await?;
        self.store.record_timing(&id, |t| {
            t.analyze_ms = Some(analyze_started.elapsed().as_millis() as u64)
        });

        if (outcome.analyzed_duration_s - info.duration_s).abs() > 0.5 {
            let warning = format!(
                "decoded {:.2}s of audio but the container reports {:.2}s; using the decoded extent",
                outcome.analyzed_duration_s, info.duration_s
            );
            log::warn!("[Jobs] Job {}: {}", id, warning);
            self.store.add_warning(&id, &warning);
        }
        self.check_cancel(&cancel)?;
        self.report_progress(&id, analyze_end, "Audio analysis complete");

        // Stage 3: transcription + filler detection (optional)
        let (fillers, segments) = if transcription_planned {
            self.store.transition(
                &id,
                JobStatus::Analyzing {
                    progress: analyze_end,
                    phase: AnalysisPhase::Transcribing,
                },
            );
            self.report_progress(&id, analyze_end, "Transcribing");
            let transcribe_started = Instant::now();
            let result = self.run_transcription(job).await?;
            self.store.record_timing(&id, |t| {
                t.transcribe_ms = Some(transcribe_started.elapsed().as_millis() as u64)
            });
            self.check_cancel(&cancel)?;
            self.report_progress(&id, PROGRESS_AFTER_TRANSCRIBE, "Transcription complete");
            result
        } else {
            (Vec::new(), Vec::new())
        };

        // Stage 4: plan cuts
        self.store.transition(
            &id,
            JobStatus::Analyzing {
                progress: PROGRESS_AFTER_TRANSCRIBE,
                phase: AnalysisPhase::Planning,
            },
        );
        let cuts = planner::plan(
            info.duration_s,
            &outcome.silences,
            &fillers,
            job.settings.padding_ms,
            job.settings.fps,
        );
        let report = AnalysisReport {
            duration_s: info.duration_s,
            sample_rate_hz: info.sample_rate_hz,
            silences: outcome.silences,
            fillers,
            cuts,
            padding_ms: job.settings.padding_ms,
            fps: job.settings.fps,
        };
        report.check_invariants().map_err(|e| {
            PipelineEnd::Failed(FailureReason::AnalysisInternal {
                detail: e.to_string(),
            })
        })?;
        self.check_cancel(&cancel)?;
        self.report_progress(&id, PROGRESS_AFTER_PLAN, "Writing edit decision lists");

        // Stage 5: export
        self.store.transition(&id, JobStatus::Exporting);
        let export_started = Instant::now();
        let files = self
            .write_exports(job, &report.cuts, &segments, info.duration_s)
            .await?;
        self.store.record_timing(&id, |t| {
            t.export_ms = Some(export_started.elapsed().as_millis() as u64)
        });
        self.store.set_result_files(&id, files);
        self.check_cancel(&cancel)?;
        self.report_progress(&id, 1.0, "Completed");

        Ok(report)
    }

    async fn probe_source(&self, job: &Job) -> Result<MediaInfo, PipelineEnd> {
        let source = self
            .storage
            .validate_source(&job.source_path)
            .map_err(|e| {
                PipelineEnd::Failed(FailureReason::ProbeFailed {
                    detail: e.to_string(),
                })
            })?;

        let info = self.toolchain.probe(&source).await.map_err(|e| {
            PipelineEnd::Failed(FailureReason::ProbeFailed {
                detail: e.to_string(),
            })
        })?;

        if info.duration_s <= 0.0 {
            return Err(PipelineEnd::Failed(FailureReason::ProbeFailed {
                detail: "zero-duration container".into(),
            }));
        }

        log::info!(
            "[Jobs] Probe {}: duration={:.3}s, fps={:.3}, rate={}Hz, channels={}",
            job.id,
            info.duration_s,
            info.container_fps,
            info.sample_rate_hz,
            info.channels
        );
        Ok(info)
    }

    /// Runs decode + silence analysis on the worker pool.
    async fn run_decode_and_silence(
        self: &Arc<Self>,
        job: &Job,
        info: &MediaInfo,
        cancel: CancelFlag,
        progress_end: f64,
    ) -> Result<SilenceOutcome, PipelineEnd> {
        let id = job.id;
        let request = PcmRequest {
            input: job.source_path.clone(),
            sample_rate_hz: info.sample_rate_hz,
            channels: info.channels.clamp(1, 2),
        };
        let params = SilenceParams {
            sample_rate_hz: request.sample_rate_hz,
            channels: request.channels,
            threshold_db: job.settings.silence_threshold_db as f64,
            min_silence_ms: job.settings.min_silence_ms,
        };
        let expected_duration = info.duration_s;
        let toolchain = self.toolchain.clone();
        let kill_slot = self
            .active
            .get(&id)
            .map(|e| Arc::clone(&e.decoder))
            .unwrap_or_default();
        let log_path = self
            .storage
            .create_job_output_dir(&id)
            .map(|dir| dir.join(DECODER_LOG_FILE))
            .map_err(|e| {
                PipelineEnd::Failed(FailureReason::DecodeFailed {
                    detail: e.to_string(),
                })
            })?;

        let this = Arc::clone(self);
        let progress_span = progress_end - PROGRESS_AFTER_PROBE;
        let join = tokio::task::spawn_blocking(move || {
            let mut decoder = toolchain.spawn_decoder(&request).map_err(|e| match e {
                DecodeError::Launch(err) => PipelineEnd::Failed(FailureReason::DecodeFailed {
                    detail: format!("failed to launch decoder: {err}"),
                }),
                DecodeError::ToolchainFailed { stderr_tail } => {
                    PipelineEnd::Failed(FailureReason::DecodeFailed {
                        detail: stderr_tail,
                    })
                }
            })?;
            *kill_slot.lock() = Some(decoder.kill_handle());

            let mut sink = move |fraction: f64| {
                let overall = PROGRESS_AFTER_PROBE + fraction * progress_span;
                this.report_progress(&id, overall, "Analyzing audio");
            };

            let analyzed = silence::analyze(
                &mut decoder,
                &params,
                Some(expected_duration),
                &cancel,
                &mut sink,
            );

            // Reap the child before interpreting the analyzer result: a
            // failed decode explains an empty or short PCM stream.
            let finish = decoder.finish();
            match &finish {
                Ok(tail) | Err(DecodeError::ToolchainFailed { stderr_tail: tail }) => {
                    if !tail.is_empty() {
                        let _ = std::fs::write(&log_path, tail);
                    }
                }
                Err(DecodeError::Launch(_)) => {}
            }

            if cancel.is_cancelled() {
                return Err(PipelineEnd::Cancelled);
            }
            if let Err(DecodeError::ToolchainFailed { stderr_tail }) = finish {
                return Err(PipelineEnd::Failed(FailureReason::DecodeFailed {
                    detail: stderr_tail,
                }));
            }

            match analyzed {
                Ok(outcome) => Ok(outcome),
                Err(AnalysisError::Cancelled) => Err(PipelineEnd::Cancelled),
                Err(AnalysisError::Io(e)) => Err(PipelineEnd::Failed(
                    FailureReason::DecodeFailed {
                        detail: format!("PCM pipe error: {e}"),
                    },
                )),
                Err(AnalysisError::Internal(detail)) => {
                    Err(PipelineEnd::Failed(FailureReason::AnalysisInternal {
                        detail,
                    }))
                }
            }
        });

        join.await.map_err(|e| {
            PipelineEnd::Failed(FailureReason::AnalysisInternal {
                detail: format!("analysis task panicked: {e}"),
            })
        })?
    }

    /// Runs transcription and filler detection; downgrades to a warning when
    /// the collaborator is unavailable and not required.
    async fn run_transcription(
        &self,
        job: &Job,
    ) -> Result<(Vec<FillerHit>, Vec<TranscriptSegment>), PipelineEnd> {
        let id = job.id;

        let segments = match &self.transcriber {
            None => {
                return self.transcription_unavailable(&id, "no transcription endpoint configured".into())
            }
            Some(transcriber) => {
                match transcriber
                    .transcribe(&job.source_path, job.settings.transcription_model_size)
                    .await
                {
                    Ok(segments) => segments,
                    Err(e) => return self.transcription_unavailable(&id, e.to_string()),
                }
            }
        };

        let scan = fillers::detect(&segments, job.settings.filler_sensitivity);
        if scan.missing_word_timings {
            self.store.add_warning(
                &id,
                "transcript segments lacked word-level timings; some fillers were not located",
            );
        }
        log::info!(
            "[Jobs] Job {}: {} filler hit(s) across {} segment(s)",
            id,
            scan.hits.len(),
            segments.len()
        );
        Ok((scan.hits, segments))
    }

    /// Policy for an unavailable transcription collaborator: fail the job
    /// when transcription is mandatory, otherwise skip the stage with a
    /// warning and carry on with silences only.
    fn transcription_unavailable(
        &self,
        id: &JobId,
        detail: String,
    ) -> Result<(Vec<FillerHit>, Vec<TranscriptSegment>), PipelineEnd> {
        log::warn!("[Jobs] Job {}: transcription unavailable: {}", id, detail);
        if self.transcription_required {
            Err(PipelineEnd::Failed(
                FailureReason::TranscriptionUnavailable { detail },
            ))
        } else {
            self.store
                .add_warning(id, &format!("filler detection skipped: {detail}"));
            Ok((Vec::new(), Vec::new()))
        }
    }

    /// Renders and writes both EDLs (plus transcripts) on the worker pool.
    async fn write_exports(
        &self,
        job: &Job,
        cuts: &[Cut],
        segments: &[TranscriptSegment],
        duration_s: f64,
    ) -> Result<ResultFiles, PipelineEnd> {
        let id = job.id;
        let output_dir = self.storage.create_job_output_dir(&id).map_err(|e| {
            PipelineEnd::Failed(FailureReason::AnalysisInternal {
                detail: format!("cannot create output dir: {e}"),
            })
        })?;
        let stem = file_stem(&job.source_path);
        let source_path = job.source_path.clone();
        let fps = job.settings.fps;
        let cuts = cuts.to_vec();
        let segments = segments.to_vec();

        let join = tokio::task::spawn_blocking(move || -> Result<ResultFiles, PipelineEnd> {
            let input = EdlInput {
                source_path: &source_path,
                duration_s,
                fps,
                cuts: &cuts,
            };
            let internal = |detail: String| {
                PipelineEnd::Failed(FailureReason::AnalysisInternal { detail })
            };

            let legacy_xml = legacy::render(&input).map_err(|e| internal(e.to_string()))?;
            let structural_xml =
                structural::render(&input).map_err(|e| internal(e.to_string()))?;

            // The two documents must imply the same timeline; a divergence
            // here is a bug caught before anything reaches the editor.
            let agreement = verify::check_agreement(&legacy_xml, &structural_xml, fps)
                .map_err(|e| internal(e.to_string()))?;
            if !agreement.holds() {
                return Err(internal(format!(
                    "exporters disagree: {agreement:?}"
                )));
            }

            let legacy_path = output_dir.join(format!("{stem}_legacy.xml"));
            let structural_path = output_dir.join(format!("{stem}_structural.xml"));
            std::fs::write(&legacy_path, legacy_xml).map_err(|e| internal(e.to_string()))?;
            std::fs::write(&structural_path, structural_xml)
                .map_err(|e| internal(e.to_string()))?;

            let mut files = ResultFiles {
                legacy_xml: legacy_path,
                structural_xml: structural_path,
                srt: None,
                vtt: None,
                txt: None,
            };

            if !segments.is_empty() {
                let srt_path = output_dir.join(format!("{stem}.srt"));
                let vtt_path = output_dir.join(format!("{stem}.vtt"));
                let txt_path = output_dir.join(format!("{stem}.txt"));
                std::fs::write(&srt_path, subtitles::render_srt(&segments))
                    .map_err(|e| internal(e.to_string()))?;
                std::fs::write(&vtt_path, subtitles::render_vtt(&segments))
                    .map_err(|e| internal(e.to_string()))?;
                std::fs::write(&txt_path, subtitles::render_txt(&segments))
                    .map_err(|e| internal(e.to_string()))?;
                files.srt = Some(srt_path);
                files.vtt = Some(vtt_path);
                files.txt = Some(txt_path);
            }

            Ok(files)
        });

        join.await.map_err(|e| {
            PipelineEnd::Failed(FailureReason::AnalysisInternal {
                detail: format!("export task panicked: {e}"),
            })
        })?
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn check_cancel(&self, cancel: &CancelFlag) -> Result<(), PipelineEnd> {
        if cancel.is_cancelled() {
            Err(PipelineEnd::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Persists a progress update and pushes it to subscribers.
    fn report_progress(&self, id: &JobId, progress: f64, message: &str) {
        if let Some((progress, message)) = self.store.set_progress(id, progress, message) {
            self.emitter.emit_job(JobEvent::Progress {
                job_id: *id,
                progress,
                message,
                timestamp: now_millis(),
            });
        }
    }

    /// Deletes any EDL files written before a cancellation landed; a
    /// cancelled job leaves no partial exports on disk.
    fn remove_partial_exports(&self, job: &Job) {
        let stem = file_stem(&job.source_path);
        let dir = self.storage.job_output_dir(&job.id);
        for name in [
            format!("{stem}_legacy.xml"),
            format!("{stem}_structural.xml"),
            format!("{stem}.srt"),
            format!("{stem}.vtt"),
            format!("{stem}.txt"),
        ] {
            let path = dir.join(name);
            if path.exists() {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

/// Keeps only filesystem-safe characters of a client-supplied stem.
fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['_', '.']).is_empty() {
        "source".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_stem_keeps_safe_characters() {
        assert_eq!(sanitize_stem("my-talk_01"), "my-talk_01");
        assert_eq!(sanitize_stem("my talk/№1"), "my_talk__1");
        assert_eq!(sanitize_stem("../.."), "source");
        assert_eq!(sanitize_stem(""), "source");
    }
}
