//! Legacy editor XML (xmeml) exporter.
//!
//! Emits a single sequence with one video track and one stereo audio track,
//! one clipitem per kept cut. Times are integer frames on the sequence
//! timebase. The first clipitem defines the `<file>` element; every later
//! clipitem references it by id — importers that require id-sharing fail
//! otherwise.

use crate::export::{EdlInput, ExportError};
use crate::utils::{escape_xml, file_uri};

/// Renders the legacy editor XML document.
pub fn render(input: &EdlInput) -> Result<String, ExportError> {
    input.ensure_cuts()?;

    let stem = input.stem();
    let file_name = input
        .source_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(&stem)
        .to_string();
    let pathurl = file_uri(input.source_path);
    let timebase = input.fps.timebase();
    let ntsc = if input.fps.is_ntsc() { "TRUE" } else { "FALSE" };
    let source_frames = input.source_frames();
    let sequence_frames = input.timeline_frames();

    let mut xml = String::with_capacity(4096);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<!DOCTYPE xmeml>\n");
    xml.push_str("<xmeml version=\"4\">\n");
    xml.push_str(&format!(
        " <sequence id=\"sequence-{}\">\n",
        escape_xml(&stem)
    ));
    xml.push_str(&format!("  <name>{}</name>\n", escape_xml(&stem)));
    xml.push_str(&format!("  <duration>{sequence_frames}</duration>\n"));
    push_rate(&mut xml, "  ", timebase, ntsc);
    xml.push_str("  <media>\n");

    // Video track
    xml.push_str("   <video>\n");
    xml.push_str("    <track>\n");
    let mut timeline_cursor = 0i64;
    for (i, cut) in input.cuts.iter().enumerate() {
        let start = timeline_cursor;
        let end = start + cut.frames();
        timeline_cursor = end;
        push_clipitem(
            &mut xml,
            &ClipItem {
                id: format!("clip-v1-{i}"),
                name: &stem,
                start,
                end,
                in_frame: cut.in_frame,
                out_frame: cut.out_frame,
                file_frames: source_frames,
                timebase,
                ntsc,
                audio: false,
            },
            // First clipitem in the document defines the shared file element.
            if i == 0 {
                FileRef::Define {
                    file_name: &file_name,
                    pathurl: &pathurl,
                }
            } else {
                FileRef::Reference
            },
        );
    }
    xml.push_str("    </track>\n");
    xml.push_str("   </video>\n");

    // Audio track (stereo: two channels on one track)
    xml.push_str("   <audio>\n");
    xml.push_str("    <track>\n");
    let mut timeline_cursor = 0i64;
    for (i, cut) in input.cuts.iter().enumerate() {
        let start = timeline_cursor;
        let end = start + cut.frames();
        timeline_cursor = end;
        push_clipitem(
            &mut xml,
            &ClipItem {
                id: format!("clip-a1-{i}"),
                name: &stem,
                start,
                end,
                in_frame: cut.in_frame,
                out_frame: cut.out_frame,
                file_frames: source_frames,
                timebase,
                ntsc,
                audio: true,
            },
            FileRef::Reference,
        );
    }
    xml.push_str("    </track>\n");
    xml.push_str("   </audio>\n");

    xml.push_str("  </media>\n");
    xml.push_str(" </sequence>\n");
    xml.push_str("</xmeml>\n");
    Ok(xml)
}

struct ClipItem<'a> {
    id: String,
    name: &'a str,
    start: i64,
    end: i64,
    in_frame: i64,
    out_frame: i64,
    file_frames: i64,
    timebase: u32,
    ntsc: &'a str,
    audio: bool,
}

enum FileRef<'a> {
    /// Full file element carrying name, pathurl and duration.
    Define {
        file_name: &'a str,
        pathurl: &'a str,
    },
    /// Id-only reference to the already-defined file element.
    Reference,
}

fn push_rate(xml: &mut String, indent: &str, timebase: u32, ntsc: &str) {
    xml.push_str(&format!(
        "{indent}<rate>\n{indent} <timebase>{timebase}</timebase>\n{indent} <ntsc>{ntsc}</ntsc>\n{indent}</rate>\n"
    ));
}

fn push_clipitem(xml: &mut String, clip: &ClipItem, file_ref: FileRef) {
    xml.push_str(&format!("     <clipitem id=\"{}\">\n", clip.id));
    xml.push_str(&format!("      <name>{}</name>\n", escape_xml(clip.name)));
    xml.push_str("      <enabled>TRUE</enabled>\n");
    xml.push_str(&format!(
        "      <duration>{}</duration>\n",
        clip.file_frames
    ));
    push_rate(xml, "      ", clip.timebase, clip.ntsc);
    xml.push_str(&format!("      <start>{}</start>\n", clip.start));
    xml.push_str(&format!("      <end>{}</end>\n", clip.end));
    xml.push_str(&format!("      <in>{}</in>\n", clip.in_frame));
    xml.push_str(&format!("      <out>{}</out>\n", clip.out_frame));

    match file_ref {
        FileRef::Define {
            file_name,
            pathurl,
        } => {
            xml.push_str("      <file id=\"file-1\">\n");
            xml.push_str(&format!(
                "       <name>{}</name>\n",
                escape_xml(file_name)
            ));
            xml.push_str(&format!(
                "       <pathurl>{}</pathurl>\n",
                escape_xml(pathurl)
            ));
            push_rate(xml, "       ", clip.timebase, clip.ntsc);
            xml.push_str(&format!(
                "       <duration>{}</duration>\n",
                clip.file_frames
            ));
            xml.push_str("       <media>\n");
            xml.push_str("        <video/>\n");
            xml.push_str("        <audio>\n");
            xml.push_str("         <channelcount>2</channelcount>\n");
            xml.push_str("        </audio>\n");
            xml.push_str("       </media>\n");
            xml.push_str("      </file>\n");
        }
        FileRef::Reference => {
            xml.push_str("      <file id=\"file-1\"/>\n");
        }
    }

    if clip.audio {
        xml.push_str("      <sourcetrack>\n");
        xml.push_str("       <mediatype>audio</mediatype>\n");
        xml.push_str("       <trackindex>1</trackindex>\n");
        xml.push_str("      </sourcetrack>\n");
    }
    xml.push_str("     </clipitem>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_fixtures::short_clean_clip;

    #[test]
    fn sequence_duration_is_sum_of_kept_frames() {
        let fixture = short_clean_clip();
        let xml = render(&fixture.input()).unwrap();
        // 124 + 124 frames kept.
        assert!(xml.contains("<duration>248</duration>"));
        assert!(xml.contains("<timebase>30</timebase>"));
        assert!(xml.contains("<ntsc>FALSE</ntsc>"));
    }

    #[test]
    fn clipitems_are_positioned_back_to_back() {
        let fixture = short_clean_clip();
        let xml = render(&fixture.input()).unwrap();
        assert!(xml.contains("<start>0</start>"));
        assert!(xml.contains("<end>124</end>"));
        assert!(xml.contains("<start>124</start>"));
        assert!(xml.contains("<end>248</end>"));
        // Source in-points
        assert!(xml.contains("<in>0</in>"));
        assert!(xml.contains("<in>176</in>")); // round(5.875 * 30)
        assert!(xml.contains("<out>300</out>"));
    }

    #[test]
    fn file_element_is_defined_once_then_referenced() {
        let fixture = short_clean_clip();
        let xml = render(&fixture.input()).unwrap();
        assert_eq!(xml.matches("<file id=\"file-1\">").count(), 1);
        // 1 more video clipitem + 2 audio clipitems reference it.
        assert_eq!(xml.matches("<file id=\"file-1\"/>").count(), 3);
        assert_eq!(xml.matches("<pathurl>").count(), 1);
        assert!(xml.contains("<pathurl>file:///uploads/job/talk.mp4</pathurl>"));
    }

    #[test]
    fn audio_clipitems_mirror_video() {
        let fixture = short_clean_clip();
        let xml = render(&fixture.input()).unwrap();
        assert!(xml.contains("clip-v1-0"));
        assert!(xml.contains("clip-v1-1"));
        assert!(xml.contains("clip-a1-0"));
        assert!(xml.contains("clip-a1-1"));
        assert_eq!(xml.matches("<mediatype>audio</mediatype>").count(), 2);
        assert!(xml.contains("<channelcount>2</channelcount>"));
    }

    #[test]
    fn ntsc_rates_use_rounded_timebase() {
        let mut fixture = short_clean_clip();
        fixture.fps = crate::timeline::Fps::from_nominal(29.97).unwrap();
        for cut in &mut fixture.cuts {
            cut.in_frame = fixture.fps.frame_index(cut.interval.start_s);
            cut.out_frame = fixture.fps.frame_index(cut.interval.end_s);
        }
        let xml = render(&fixture.input()).unwrap();
        assert!(xml.contains("<timebase>30</timebase>"));
        assert!(xml.contains("<ntsc>TRUE</ntsc>"));
    }

    #[test]
    fn empty_cut_list_is_rejected() {
        let fixture = short_clean_clip();
        let input = EdlInput {
            cuts: &[],
            ..fixture.input()
        };
        assert!(matches!(render(&input), Err(ExportError::EmptyCutList)));
    }
}
