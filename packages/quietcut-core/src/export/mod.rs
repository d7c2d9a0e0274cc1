//! EDL synthesis: cut list -> editor-native XML documents.
//!
//! Two exporters share one input and must imply identical timelines:
//!
//! - [`legacy`]: the legacy editor XML (frame-integer clipitems, shared file
//!   element by id reference)
//! - [`structural`]: the structural editor XML (rational seconds throughout)
//!
//! [`verify`] re-reads both emitted documents and checks the agreement
//! contract (total durations within one frame, in-points within one frame).
//! [`subtitles`] renders the optional transcript outputs.

pub mod legacy;
pub mod rational;
pub mod structural;
pub mod subtitles;
pub mod verify;

use std::path::Path;

use thiserror::Error;

use crate::timeline::{total_frames, Cut, Fps};
use crate::utils::file_stem;

/// Errors from EDL rendering and verification.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The cut list was empty; the planner guarantees at least one cut, so
    /// this is a pipeline bug surfaced before writing anything.
    #[error("refusing to export an empty cut list")]
    EmptyCutList,

    /// Writing an output file failed.
    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An emitted document failed to re-parse during verification.
    #[error("malformed exported document: {0}")]
    MalformedDocument(String),
}

/// Shared input for both exporters.
#[derive(Debug, Clone, Copy)]
pub struct EdlInput<'a> {
    /// Source media path as it should appear in the documents.
    pub source_path: &'a Path,
    /// Source duration in seconds.
    pub duration_s: f64,
    /// Export frame grid.
    pub fps: Fps,
    /// Planned keep-cuts, in timeline order.
    pub cuts: &'a [Cut],
}

impl<'a> EdlInput<'a> {
    /// Display stem of the source file (sequence and clip naming).
    #[must_use]
    pub fn stem(&self) -> String {
        file_stem(self.source_path)
    }

    /// Full source length in frames on the export grid.
    #[must_use]
    pub fn source_frames(&self) -> i64 {
        self.fps.frame_index(self.duration_s)
    }

    /// Timeline length in frames: the sum of kept spans.
    #[must_use]
    pub fn timeline_frames(&self) -> i64 {
        total_frames(self.cuts)
    }

    pub(crate) fn ensure_cuts(&self) -> Result<(), ExportError> {
        if self.cuts.is_empty() {
            Err(ExportError::EmptyCutList)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;
    use crate::timeline::TimeInterval;
    use std::path::PathBuf;

    pub fn cut(start: f64, end: f64, fps: Fps) -> Cut {
        Cut {
            interval: TimeInterval::new(start, end).unwrap(),
            in_frame: fps.frame_index(start),
            out_frame: fps.frame_index(end),
        }
    }

    pub struct Fixture {
        pub path: PathBuf,
        pub cuts: Vec<Cut>,
        pub fps: Fps,
        pub duration_s: f64,
    }

    /// The short-clean-clip scenario: silence [4, 6) padded by 250 ms.
    pub fn short_clean_clip() -> Fixture {
        let fps = Fps::from_nominal(30.0).unwrap();
        Fixture {
            path: PathBuf::from("/uploads/job/talk.mp4"),
            cuts: vec![cut(0.0, 4.125, fps), cut(5.875, 10.0, fps)],
            fps,
            duration_s: 10.0,
        }
    }

    impl Fixture {
        pub fn input(&self) -> EdlInput<'_> {
            EdlInput {
                source_path: &self.path,
                duration_s: self.duration_s,
                fps: self.fps,
                cuts: &self.cuts,
            }
        }
    }
}
