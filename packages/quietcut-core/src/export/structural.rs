//! Structural editor XML exporter.
//!
//! Emits a resources block plus a library/event/project/sequence hierarchy
//! whose spine holds one asset-clip per kept cut. Every time value is a
//! reduced rational in seconds (`NUM/DENs`); decimal seconds are never
//! emitted.

use crate::export::rational::{frame_duration_string, Rational};
use crate::export::{EdlInput, ExportError};
use crate::utils::{escape_xml, file_uri};

/// Placeholder picture geometry for the format resource.
const FORMAT_WIDTH: u32 = 1920;
const FORMAT_HEIGHT: u32 = 1080;

/// Renders the structural editor XML document.
pub fn render(input: &EdlInput) -> Result<String, ExportError> {
    input.ensure_cuts()?;

    let stem = input.stem();
    let src = file_uri(input.source_path);
    let fps = input.fps;
    let source_duration = Rational::from_frames(input.source_frames(), fps);
    let sequence_duration = Rational::from_frames(input.timeline_frames(), fps);

    let mut xml = String::with_capacity(2048);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<!DOCTYPE fcpxml>\n");
    xml.push_str("<fcpxml version=\"1.11\">\n");

    xml.push_str("  <resources>\n");
    xml.push_str(&format!(
        "    <format id=\"r1\" name=\"FFVideoFormat{}p\" frameDuration=\"{}\" width=\"{}\" height=\"{}\"/>\n",
        FORMAT_HEIGHT,
        frame_duration_string(fps),
        FORMAT_WIDTH,
        FORMAT_HEIGHT
    ));
    xml.push_str(&format!(
        "    <asset id=\"r2\" name=\"{}\" src=\"{}\" start=\"0s\" duration=\"{}\" hasVideo=\"1\" hasAudio=\"1\" format=\"r1\"/>\n",
        escape_xml(&stem),
        escape_xml(&src),
        source_duration
    ));
    xml.push_str("  </resources>\n");

    xml.push_str("  <library>\n");
    xml.push_str(&format!("    <event name=\"{}\">\n", escape_xml(&stem)));
    xml.push_str(&format!(
        "      <project name=\"{}\">\n",
        escape_xml(&stem)
    ));
    xml.push_str(&format!(
        "        <sequence format=\"r1\" duration=\"{}\" tcStart=\"0s\" tcFormat=\"NDF\">\n",
        sequence_duration
    ));
    xml.push_str("          <spine>\n");

    let mut timeline_frames = 0i64;
    for cut in input.cuts {
        let offset = Rational::from_frames(timeline_frames, fps);
        let duration = Rational::from_frames(cut.frames(), fps);
        let start = Rational::from_frames(cut.in_frame, fps);
        timeline_frames += cut.frames();
        xml.push_str(&format!(
            "            <asset-clip ref=\"r2\" name=\"{}\" offset=\"{}\" duration=\"{}\" start=\"{}\"/>\n",
            escape_xml(&stem),
            offset,
            duration,
            start
        ));
    }

    xml.push_str("          </spine>\n");
    xml.push_str("        </sequence>\n");
    xml.push_str("      </project>\n");
    xml.push_str("    </event>\n");
    xml.push_str("  </library>\n");
    xml.push_str("</fcpxml>\n");
    Ok(xml)
}
