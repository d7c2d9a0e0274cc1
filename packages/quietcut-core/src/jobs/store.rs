//! Typed job store: in-memory index plus durable JSON records.
//!
//! The store is the only shared-mutable structure in the system. Reads come
//! from anywhere; writes flow through the orchestrator task for a given job.
//! Every state transition and progress update is persisted with an atomic
//! write (temp file + rename) so records survive a process restart.

use std::path::{Path, PathBuf};

use dashmap::DashMap;

use super::{FailureReason, Job, JobId, JobStatus, ResultFiles};

const JOBS_DIR: &str = "jobs";

/// In-memory job index with optional on-disk persistence.
pub struct JobStore {
    jobs: DashMap<JobId, Job>,
    records_dir: Option<PathBuf>,
}

impl JobStore {
    /// Creates a store. With a data directory, records persist under
    /// `<data_dir>/jobs/<id>.json`; without one, jobs are process-local.
    pub fn new(data_dir: Option<&Path>) -> std::io::Result<Self> {
        let records_dir = match data_dir {
            Some(dir) => {
                let records = dir.join(JOBS_DIR);
                std::fs::create_dir_all(&records)?;
                Some(records)
            }
            None => None,
        };
        Ok(Self {
            jobs: DashMap::new(),
            records_dir,
        })
    }

    /// Reloads persisted records after a restart.
    ///
    /// Jobs found in a non-terminal state are marked `Failed { Interrupted }`
    /// — there is no resume. Returns `(restored, interrupted)` counts.
    pub fn restore(&self) -> (usize, usize) {
        let Some(dir) = &self.records_dir else {
            return (0, 0);
        };
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("[JobStore] Cannot read records dir: {}", e);
                return (0, 0);
            }
        };

        let mut restored = 0;
        let mut interrupted = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let mut job: Job = match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()))
            {
                Ok(job) => job,
                Err(e) => {
                    log::warn!("[JobStore] Skipping unreadable record {:?}: {}", path, e);
                    continue;
                }
            };

            if !job.status.is_terminal() {
                log::info!(
                    "[JobStore] Marking interrupted job {} (was {})",
                    job.id,
                    job.status.name()
                );
                job.status = JobStatus::Failed {
                    reason: FailureReason::Interrupted,
                };
                job.message = FailureReason::Interrupted.phrase().to_string();
                self.persist(&job);
                interrupted += 1;
            }

            self.jobs.insert(job.id, job);
            restored += 1;
        }
        (restored, interrupted)
    }

    /// Inserts a new job record and persists it.
    pub fn insert(&self, job: Job) {
        self.persist(&job);
        self.jobs.insert(job.id, job);
    }

    /// Snapshot of one job.
    #[must_use]
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.get(id).map(|r| r.value().clone())
    }

    /// Snapshot of all jobs, newest first.
    #[must_use]
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|r| r.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        jobs
    }

    /// Applies a status transition and persists the record.
    ///
    /// # Panics
    ///
    /// Panics on an illegal transition: the status DAG is enforced at the
    /// single write point, and a violation is a programmer error.
    pub fn transition(&self, id: &JobId, next: JobStatus) -> Option<Job> {
        let mut entry = self.jobs.get_mut(id)?;
        let job = entry.value_mut();
        assert!(
            job.status.can_transition_to(&next),
            "illegal job status transition: {} -> {} (job {})",
            job.status.name(),
            next.name(),
            job.id
        );

        job.status = match next {
            JobStatus::Analyzing { progress, phase } => {
                // Progress is monotonic even across re-entries of Analyzing.
                let effective = progress.clamp(0.0, 1.0).max(job.progress);
                job.progress = effective;
                JobStatus::Analyzing {
                    progress: effective,
                    phase,
                }
            }
            JobStatus::Completed { report } => {
                job.progress = 1.0;
                job.message = "Completed".into();
                JobStatus::Completed { report }
            }
            JobStatus::Failed { reason } => {
                job.message = reason.phrase().to_string();
                JobStatus::Failed { reason }
            }
            JobStatus::Cancelled => {
                job.message = "Cancelled".into();
                JobStatus::Cancelled
            }
            other => other,
        };

        log::debug!("[JobStore] {} -> {}", job.id, job.status.name());
        let snapshot = job.clone();
        drop(entry);
        self.persist(&snapshot);
        Some(snapshot)
    }

    /// Records a progress update, clamped to `[0, 1]` and monotonic.
    ///
    /// Returns the effective `(progress, message)` actually stored. Progress
    /// updates do not change the status variant.
    pub fn set_progress(&self, id: &JobId, progress: f64, message: &str) -> Option<(f64, String)> {
        let mut entry = self.jobs.get_mut(id)?;
        let job = entry.value_mut();
        let effective = progress.clamp(0.0, 1.0).max(job.progress);
        job.progress = effective;
        job.message = message.to_string();
        if let JobStatus::Analyzing { phase, .. } = job.status {
            job.status = JobStatus::Analyzing {
                progress: effective,
                phase,
            };
        }
        let snapshot = job.clone();
        drop(entry);
        self.persist(&snapshot);
        Some((effective, message.to_string()))
    }

    /// Appends a warning to the job record.
    pub fn add_warning(&self, id: &JobId, warning: &str) {
        if let Some(mut entry) = self.jobs.get_mut(id) {
            entry.value_mut().warnings.push(warning.to_string());
            let snapshot = entry.value().clone();
            drop(entry);
            self.persist(&snapshot);
        }
    }

    /// Records a completed stage duration.
    pub fn record_timing(&self, id: &JobId, update: impl FnOnce(&mut super::StageTimings)) {
        if let Some(mut entry) = self.jobs.get_mut(id) {
            update(&mut entry.value_mut().timings);
            let snapshot = entry.value().clone();
            drop(entry);
            self.persist(&snapshot);
        }
    }

    /// Attaches result file paths to the record.
    pub fn set_result_files(&self, id: &JobId, files: ResultFiles) {
        if let Some(mut entry) = self.jobs.get_mut(id) {
            entry.value_mut().result_files = Some(files);
            let snapshot = entry.value().clone();
            drop(entry);
            self.persist(&snapshot);
        }
    }

    /// Removes a job record (and its persisted file).
    pub fn remove(&self, id: &JobId) -> Option<Job> {
        let removed = self.jobs.remove(id).map(|(_, job)| job);
        if removed.is_some() {
            if let Some(path) = self.record_path(id) {
                if let Err(e) = std::fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        log::warn!("[JobStore] Failed to delete record {:?}: {}", path, e);
                    }
                }
            }
        }
        removed
    }

    fn record_path(&self, id: &JobId) -> Option<PathBuf> {
        self.records_dir
            .as_ref()
            .map(|dir| dir.join(format!("{id}.json")))
    }

    /// Atomic write (temp file + rename) to prevent corruption on crash.
    fn persist(&self, job: &Job) {
        let Some(path) = self.record_path(&job.id) else {
            return;
        };
        let temp = path.with_extension("json.tmp");
        let result = serde_json::to_string_pretty(job)
            .map_err(std::io::Error::other)
            .and_then(|contents| std::fs::write(&temp, contents))
            .and_then(|()| std::fs::rename(&temp, &path));
        if let Err(e) = result {
            log::warn!("[JobStore] Failed to persist {}: {}", job.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{AnalysisPhase, JobSettings};
    use std::path::PathBuf;

    fn make_job() -> Job {
        Job::new(
            "talk.mp4".into(),
            PathBuf::from("/uploads/x/talk.mp4"),
            JobSettings::default(),
        )
    }

    fn analyzing(progress: f64) -> JobStatus {
        JobStatus::Analyzing {
            progress,
            phase: AnalysisPhase::Decoding,
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let store = JobStore::new(None).unwrap();
        let job = make_job();
        let id = job.id;
        store.insert(job);
        assert_eq!(store.get(&id).unwrap().source_filename, "talk.mp4");
        assert!(store.get(&JobId::new()).is_none());
    }

    #[test]
    fn progress_is_clamped_and_monotonic() {
        let store = JobStore::new(None).unwrap();
        let job = make_job();
        let id = job.id;
        store.insert(job);
        store.transition(&id, JobStatus::Uploaded);
        store.transition(&id, analyzing(0.0));

        let (p, _) = store.set_progress(&id, 0.4, "analyzing").unwrap();
        assert_eq!(p, 0.4);
        // Regression attempt is ignored.
        let (p, _) = store.set_progress(&id, 0.2, "analyzing").unwrap();
        assert_eq!(p, 0.4);
        // Overflow is clamped.
        let (p, _) = store.set_progress(&id, 7.0, "analyzing").unwrap();
        assert_eq!(p, 1.0);
    }

    #[test]
    #[should_panic(expected = "illegal job status transition")]
    fn illegal_transition_panics() {
        let store = JobStore::new(None).unwrap();
        let job = make_job();
        let id = job.id;
        store.insert(job);
        // Uploading -> Exporting skips the DAG.
        store.transition(&id, JobStatus::Exporting);
    }

    #[test]
    #[should_panic(expected = "illegal job status transition")]
    fn terminal_states_accept_no_transition() {
        let store = JobStore::new(None).unwrap();
        let job = make_job();
        let id = job.id;
        store.insert(job);
        store.transition(&id, JobStatus::Cancelled);
        store.transition(&id, JobStatus::Cancelled);
    }

    #[test]
    fn records_persist_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let job = make_job();
        let id = job.id;
        {
            let store = JobStore::new(Some(dir.path())).unwrap();
            store.insert(job);
            store.transition(&id, JobStatus::Uploaded);
        }

        let store = JobStore::new(Some(dir.path())).unwrap();
        let (restored, interrupted) = store.restore();
        assert_eq!(restored, 1);
        assert_eq!(interrupted, 1);

        let job = store.get(&id).unwrap();
        assert!(matches!(
            job.status,
            JobStatus::Failed {
                reason: FailureReason::Interrupted
            }
        ));
    }

    #[test]
    fn terminal_records_restore_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let job = make_job();
        let id = job.id;
        {
            let store = JobStore::new(Some(dir.path())).unwrap();
            store.insert(job);
            store.transition(&id, JobStatus::Cancelled);
        }

        let store = JobStore::new(Some(dir.path())).unwrap();
        let (restored, interrupted) = store.restore();
        assert_eq!((restored, interrupted), (1, 0));
        assert!(matches!(
            store.get(&id).unwrap().status,
            JobStatus::Cancelled
        ));
    }

    #[test]
    fn remove_deletes_the_record_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(Some(dir.path())).unwrap();
        let job = make_job();
        let id = job.id;
        store.insert(job);

        let record = dir.path().join(JOBS_DIR).join(format!("{id}.json"));
        assert!(record.exists());
        assert!(store.remove(&id).is_some());
        assert!(!record.exists());
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn list_is_newest_first() {
        let store = JobStore::new(None).unwrap();
        let mut first = make_job();
        first.created_at_ms = 100;
        let mut second = make_job();
        second.created_at_ms = 200;
        store.insert(first);
        store.insert(second.clone());
        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
    }
}
