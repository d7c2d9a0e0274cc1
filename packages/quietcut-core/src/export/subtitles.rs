//! Transcript outputs: SRT, WebVTT and plain text.
//!
//! Rendered only when the transcription stage ran. Cue text is the segment
//! text verbatim; the plain-text form is one segment per line without
//! timecodes.

use crate::transcript::TranscriptSegment;

/// Renders standard sequence-numbered SRT blocks.
#[must_use]
pub fn render_srt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            srt_timestamp(segment.start_s),
            srt_timestamp(segment.end_s),
            segment.text.trim()
        ));
    }
    out
}

/// Renders a WebVTT document with one cue per segment.
#[must_use]
pub fn render_vtt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for segment in segments {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            vtt_timestamp(segment.start_s),
            vtt_timestamp(segment.end_s),
            segment.text.trim()
        ));
    }
    out
}

/// Renders plain text, one segment per line, no timecodes.
#[must_use]
pub fn render_txt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        let text = segment.text.trim();
        if !text.is_empty() {
            out.push_str(text);
            out.push('\n');
        }
    }
    out
}

fn split_timestamp(seconds: f64) -> (u64, u64, u64, u64) {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    (total_s / 3600, (total_s / 60) % 60, total_s % 60, ms)
}

fn srt_timestamp(seconds: f64) -> String {
    let (h, m, s, ms) = split_timestamp(seconds);
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

fn vtt_timestamp(seconds: f64) -> String {
    let (h, m, s, ms) = split_timestamp(seconds);
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments() -> Vec<TranscriptSegment> {
        vec![
            TranscriptSegment {
                start_s: 0.0,
                end_s: 2.5,
                text: "Bonjour tout le monde.".into(),
                words: None,
            },
            TranscriptSegment {
                start_s: 3661.25,
                end_s: 3662.0,
                text: "On continue.".into(),
                words: None,
            },
        ]
    }

    #[test]
    fn srt_blocks_are_numbered_with_comma_millis() {
        let srt = render_srt(&segments());
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,500\nBonjour tout le monde.\n"));
        assert!(srt.contains("2\n01:01:01,250 --> 01:01:02,000\nOn continue.\n"));
    }

    #[test]
    fn vtt_has_header_and_dot_millis() {
        let vtt = render_vtt(&segments());
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:00.000 --> 00:00:02.500"));
        assert!(vtt.contains("01:01:01.250"));
        assert!(!vtt.contains(','));
    }

    #[test]
    fn txt_is_one_segment_per_line() {
        let txt = render_txt(&segments());
        assert_eq!(txt, "Bonjour tout le monde.\nOn continue.\n");
    }

    #[test]
    fn empty_transcript_renders_empty_documents() {
        assert_eq!(render_srt(&[]), "");
        assert_eq!(render_vtt(&[]), "WEBVTT\n\n");
        assert_eq!(render_txt(&[]), "");
    }
}
