//! General utilities shared across the application.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Path Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the file stem of a path, or `"source"` when the path has none.
///
/// Used to derive export file names (`<stem>_legacy.xml`, `<stem>.srt`, ...).
#[must_use]
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("source")
        .to_string()
}

/// Builds a `file://` URI for a path, percent-encoding the characters that
/// editors reject in `pathurl`/`src` attributes.
///
/// Only the small set that actually occurs in media file names is escaped;
/// alphanumerics, `/`, `.`, `-` and `_` pass through untouched.
#[must_use]
pub fn file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut uri = String::with_capacity(raw.len() + 8);
    uri.push_str("file://");
    if !raw.starts_with('/') {
        uri.push('/');
    }
    for byte in raw.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'/' | b'.' | b'-' | b'_' | b'~' => {
                uri.push(byte as char)
            }
            _ => {
                uri.push('%');
                uri.push_str(&format!("{:02X}", byte));
            }
        }
    }
    uri
}

/// Escapes the five XML-reserved characters for element text and attributes.
#[must_use]
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn file_stem_falls_back_for_bare_dot_files() {
        assert_eq!(file_stem(Path::new("/tmp/talk.mp4")), "talk");
        assert_eq!(file_stem(Path::new("/tmp/.hidden")), ".hidden");
        assert_eq!(file_stem(Path::new("")), "source");
    }

    #[test]
    fn file_uri_escapes_spaces_and_keeps_slashes() {
        let uri = file_uri(&PathBuf::from("/media/my talk.mp4"));
        assert_eq!(uri, "file:///media/my%20talk.mp4");
    }

    #[test]
    fn file_uri_prefixes_relative_paths() {
        let uri = file_uri(&PathBuf::from("uploads/talk.mp4"));
        assert_eq!(uri, "file:///uploads/talk.mp4");
    }

    #[test]
    fn escape_xml_covers_reserved_chars() {
        assert_eq!(escape_xml("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}
