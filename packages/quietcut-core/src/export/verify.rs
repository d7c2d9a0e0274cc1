//! Cross-exporter agreement checker.
//!
//! Both exporters must imply the same timeline: total kept durations equal to
//! within one frame, and per-clip source in-points within one frame. This
//! module re-parses the two emitted documents (rather than trusting the
//! writers) and measures the deltas.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::export::rational::parse_rational_seconds;
use crate::export::ExportError;
use crate::timeline::Fps;

/// Measured agreement between the two exported documents.
#[derive(Debug, Clone)]
pub struct TimelineAgreement {
    /// Sum of `out - in` across the legacy document's video clipitems.
    pub legacy_total_frames: i64,
    /// Structural spine duration, rounded onto the frame grid.
    pub structural_total_frames: i64,
    /// Whether both documents carry the same number of clips.
    pub clip_counts_match: bool,
    /// Largest per-clip source in-point difference, in frames.
    pub max_in_point_delta_frames: i64,
}

impl TimelineAgreement {
    /// The shared contract: equal totals and in-points to within one frame.
    #[must_use]
    pub fn holds(&self) -> bool {
        self.clip_counts_match
            && (self.legacy_total_frames - self.structural_total_frames).abs() <= 1
            && self.max_in_point_delta_frames <= 1
    }
}

/// Parses both documents and measures their implied timelines.
pub fn check_agreement(
    legacy_xml: &str,
    structural_xml: &str,
    fps: Fps,
) -> Result<TimelineAgreement, ExportError> {
    let legacy_clips = read_legacy_clips(legacy_xml)?;
    let structural_clips = read_structural_clips(structural_xml)?;

    let legacy_total_frames: i64 = legacy_clips.iter().map(|c| c.out_frame - c.in_frame).sum();
    let structural_total_seconds: f64 = structural_clips.iter().map(|c| c.duration_s).sum();
    let structural_total_frames = (structural_total_seconds * fps.as_f64()).round() as i64;

    let clip_counts_match = legacy_clips.len() == structural_clips.len();
    let max_in_point_delta_frames = legacy_clips
        .iter()
        .zip(structural_clips.iter())
        .map(|(l, s)| {
            let structural_in = (s.start_s * fps.as_f64()).round() as i64;
            (l.in_frame - structural_in).abs()
        })
        .max()
        .unwrap_or(0);

    Ok(TimelineAgreement {
        legacy_total_frames,
        structural_total_frames,
        clip_counts_match,
        max_in_point_delta_frames,
    })
}

struct LegacyClip {
    in_frame: i64,
    out_frame: i64,
}

struct StructuralClip {
    start_s: f64,
    duration_s: f64,
}

/// Extracts `(in, out)` frame pairs from the legacy document's video track.
fn read_legacy_clips(xml: &str) -> Result<Vec<LegacyClip>, ExportError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut clips = Vec::new();
    let mut current: Option<(Option<i64>, Option<i64>)> = None;
    let mut capture: Option<u8> = None; // 0 = in, 1 = out

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                let in_video = stack.iter().any(|n| n == b"video");
                match name.as_slice() {
                    b"clipitem" if in_video => current = Some((None, None)),
                    b"in" if current.is_some() => capture = Some(0),
                    b"out" if current.is_some() => capture = Some(1),
                    _ => {}
                }
                stack.push(name);
            }
            Ok(Event::Text(t)) => {
                if let (Some(which), Some(values)) = (capture, current.as_mut()) {
                    let decoded = t
                        .xml_content()
                        .map_err(|e| ExportError::MalformedDocument(e.to_string()))?;
                    let text = quick_xml::escape::unescape(&decoded)
                        .map_err(|e| ExportError::MalformedDocument(e.to_string()))?;
                    let parsed = text.trim().parse::<i64>().map_err(|_| {
                        ExportError::MalformedDocument(format!(
                            "non-integer frame value: {text:?}"
                        ))
                    })?;
                    if which == 0 {
                        values.0 = Some(parsed);
                    } else {
                        values.1 = Some(parsed);
                    }
                }
            }
            Ok(Event::End(e)) => {
                stack.pop();
                capture = None;
                if e.name().as_ref() == b"clipitem" {
                    if let Some((Some(in_frame), Some(out_frame))) = current.take() {
                        clips.push(LegacyClip {
                            in_frame,
                            out_frame,
                        });
                    } else {
                        current = None;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExportError::MalformedDocument(e.to_string())),
            _ => {}
        }
    }
    Ok(clips)
}

/// Extracts `(start, duration)` seconds from the structural document's spine.
fn read_structural_clips(xml: &str) -> Result<Vec<StructuralClip>, ExportError> {
    let mut reader = Reader::from_str(xml);
    let mut in_spine = false;
    let mut clips = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"spine" => in_spine = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"spine" => in_spine = false,
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if in_spine && e.name().as_ref() == b"asset-clip" =>
            {
                let mut start_s = None;
                let mut duration_s = None;
                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map_err(|err| ExportError::MalformedDocument(err.to_string()))?;
                    match attr.key.as_ref() {
                        b"start" => start_s = parse_rational_seconds(&value),
                        b"duration" => duration_s = parse_rational_seconds(&value),
                        _ => {}
                    }
                }
                match (start_s, duration_s) {
                    (Some(start_s), Some(duration_s)) => clips.push(StructuralClip {
                        start_s,
                        duration_s,
                    }),
                    _ => {
                        return Err(ExportError::MalformedDocument(
                            "asset-clip missing rational start/duration".into(),
                        ))
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExportError::MalformedDocument(e.to_string())),
            _ => {}
        }
    }
    Ok(clips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_fixtures::{cut, short_clean_clip};
    use crate::export::{legacy, structural, EdlInput};
    use std::path::PathBuf;

    #[test]
    fn exporters_agree_on_the_clean_clip() {
        let fixture = short_clean_clip();
        let input = fixture.input();
        let legacy_xml = legacy::render(&input).unwrap();
        let structural_xml = structural::render(&input).unwrap();

        let agreement = check_agreement(&legacy_xml, &structural_xml, fixture.fps).unwrap();
        assert!(agreement.holds(), "disagreement: {agreement:?}");
        assert_eq!(agreement.legacy_total_frames, 248);
        assert_eq!(agreement.structural_total_frames, 248);
        assert_eq!(agreement.max_in_point_delta_frames, 0);
    }

    #[test]
    fn exporters_agree_on_ntsc_grids() {
        let fps = Fps::from_nominal(29.97).unwrap();
        let path = PathBuf::from("/uploads/job/interview.mov");
        let cuts = vec![
            cut(0.0, 12.345, fps),
            cut(15.0, 42.5, fps),
            cut(50.01, 61.2, fps),
        ];
        let input = EdlInput {
            source_path: &path,
            duration_s: 61.2,
            fps,
            cuts: &cuts,
        };
        let legacy_xml = legacy::render(&input).unwrap();
        let structural_xml = structural::render(&input).unwrap();

        let agreement = check_agreement(&legacy_xml, &structural_xml, fps).unwrap();
        assert!(agreement.holds(), "disagreement: {agreement:?}");
    }

    #[test]
    fn tampered_structural_duration_breaks_agreement() {
        let fixture = short_clean_clip();
        let input = fixture.input();
        let legacy_xml = legacy::render(&input).unwrap();
        let structural_xml = structural::render(&input)
            .unwrap()
            .replace("duration=\"62/15s\"", "duration=\"31/15s\"");

        let agreement = check_agreement(&legacy_xml, &structural_xml, fixture.fps).unwrap();
        assert!(!agreement.holds());
    }

    #[test]
    fn single_cut_timeline_round_trips() {
        let fps = Fps::from_nominal(30.0).unwrap();
        let path = PathBuf::from("/uploads/job/short.mp4");
        let cuts = vec![cut(0.0, 2.0, fps)];
        let input = EdlInput {
            source_path: &path,
            duration_s: 2.0,
            fps,
            cuts: &cuts,
        };
        let agreement = check_agreement(
            &legacy::render(&input).unwrap(),
            &structural::render(&input).unwrap(),
            fps,
        )
        .unwrap();
        assert!(agreement.holds());
        assert_eq!(agreement.legacy_total_frames, 60);
    }

    #[test]
    fn malformed_document_is_reported() {
        // Non-integer frame value inside a video clipitem.
        let bad = "<xmeml><video><track><clipitem><in>abc</in></clipitem></track></video></xmeml>";
        assert!(read_legacy_clips(bad).is_err());

        // Asset-clip with a decimal (non-rational) duration is rejected too.
        let bad_spine = "<spine><asset-clip start=\"0s\" duration=\"4.125\"/></spine>";
        assert!(read_structural_clips(bad_spine).is_err());
    }
}
