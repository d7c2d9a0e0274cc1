//! Storage layout and path containment.
//!
//! Every job owns a subdirectory under the upload root (raw media) and one
//! under the output root (exports, logs). Paths handed to the external
//! toolchain are validated here: they must resolve inside the upload root
//! and carry an allowed extension. Files outside a job's own directories are
//! never written, and deletion happens only on job removal.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::constants::ALLOWED_EXTENSIONS;
use crate::jobs::JobId;

/// Errors from path validation.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage roots could not be created or resolved.
    #[error("storage root error: {0}")]
    Root(#[from] std::io::Error),

    /// The file extension is not in the allow-list.
    #[error("unsupported media extension: {0:?}")]
    UnsupportedExtension(String),

    /// The path escapes the upload root.
    #[error("path escapes the upload directory")]
    OutsideUploadRoot,
}

/// Resolved storage roots for uploads and outputs.
#[derive(Debug, Clone)]
pub struct StorageContext {
    upload_root: PathBuf,
    output_root: PathBuf,
}

impl StorageContext {
    /// Creates both roots (if missing) and canonicalizes them.
    pub fn new(upload_root: &Path, output_root: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(upload_root)?;
        std::fs::create_dir_all(output_root)?;
        Ok(Self {
            upload_root: upload_root.canonicalize()?,
            output_root: output_root.canonicalize()?,
        })
    }

    /// The canonical upload root.
    #[must_use]
    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    /// The canonical output root.
    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Checks a client-supplied file name's extension against the allow-list
    /// and returns the lowercase extension.
    pub fn validate_extension(file_name: &str) -> Result<String, StorageError> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            Ok(ext)
        } else {
            Err(StorageError::UnsupportedExtension(ext))
        }
    }

    /// Creates and returns the job's upload directory.
    pub fn create_job_upload_dir(&self, id: &JobId) -> std::io::Result<PathBuf> {
        let dir = self.upload_root.join(id.to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Creates and returns the job's output directory.
    pub fn create_job_output_dir(&self, id: &JobId) -> std::io::Result<PathBuf> {
        let dir = self.output_root.join(id.to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// The job's output directory path (without creating it).
    #[must_use]
    pub fn job_output_dir(&self, id: &JobId) -> PathBuf {
        self.output_root.join(id.to_string())
    }

    /// The job's upload directory path (without creating it).
    #[must_use]
    pub fn job_upload_dir(&self, id: &JobId) -> PathBuf {
        self.upload_root.join(id.to_string())
    }

    /// Validates a source path before it reaches the toolchain: it must
    /// canonicalize to a location inside the upload root and carry an
    /// allowed extension. Returns the canonical path.
    pub fn validate_source(&self, path: &Path) -> Result<PathBuf, StorageError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        Self::validate_extension(file_name)?;

        let canonical = path.canonicalize()?;
        if !canonical.starts_with(&self.upload_root) {
            return Err(StorageError::OutsideUploadRoot);
        }
        Ok(canonical)
    }

    /// Deletes a job's upload and output directories. Only called on job
    /// removal, never during analysis.
    pub fn remove_job_dirs(&self, id: &JobId) {
        for dir in [self.job_upload_dir(id), self.job_output_dir(id)] {
            if dir.exists() {
                if let Err(e) = std::fs::remove_dir_all(&dir) {
                    log::warn!("[Storage] Failed to remove {:?}: {}", dir, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> (tempfile::TempDir, StorageContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = StorageContext::new(&dir.path().join("uploads"), &dir.path().join("out")).unwrap();
        (dir, ctx)
    }

    #[test]
    fn extension_allow_list_is_enforced() {
        assert_eq!(StorageContext::validate_extension("talk.MP4").unwrap(), "mp4");
        assert!(StorageContext::validate_extension("talk.exe").is_err());
        assert!(StorageContext::validate_extension("no_extension").is_err());
    }

    #[test]
    fn source_inside_upload_root_validates() {
        let (_guard, ctx) = context();
        let id = JobId::new();
        let dir = ctx.create_job_upload_dir(&id).unwrap();
        let media = dir.join("talk.mp4");
        std::fs::write(&media, b"stub").unwrap();

        let canonical = ctx.validate_source(&media).unwrap();
        assert!(canonical.starts_with(ctx.upload_root()));
    }

    #[test]
    fn source_outside_upload_root_is_rejected() {
        let (guard, ctx) = context();
        let outside = guard.path().join("elsewhere.mp4");
        std::fs::write(&outside, b"stub").unwrap();
        assert!(matches!(
            ctx.validate_source(&outside),
            Err(StorageError::OutsideUploadRoot)
        ));
    }

    #[test]
    fn traversal_cannot_escape_the_root() {
        let (guard, ctx) = context();
        let id = JobId::new();
        let dir = ctx.create_job_upload_dir(&id).unwrap();
        let secret = guard.path().join("secret.mp4");
        std::fs::write(&secret, b"stub").unwrap();

        let sneaky = dir.join("..").join("..").join("secret.mp4");
        assert!(ctx.validate_source(&sneaky).is_err());
    }

    #[test]
    fn job_dirs_are_removed_on_request() {
        let (_guard, ctx) = context();
        let id = JobId::new();
        let upload = ctx.create_job_upload_dir(&id).unwrap();
        let output = ctx.create_job_output_dir(&id).unwrap();
        std::fs::write(upload.join("talk.mp4"), b"stub").unwrap();
        std::fs::write(output.join("talk_legacy.xml"), b"<xmeml/>").unwrap();

        ctx.remove_job_dirs(&id);
        assert!(!upload.exists());
        assert!(!output.exists());
    }
}
