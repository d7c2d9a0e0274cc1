//! Media probing and PCM decoding via an external toolchain.
//!
//! The decoder is a collaborator specified by its interface, not its
//! identity: any tool that reads a media file, writes raw PCM on stdout,
//! reports `key=value` progress lines on stderr, and exits with a status
//! satisfies the contract. In production this is an `ffmpeg`/`ffprobe` pair.

pub mod decode;
pub mod probe;

use std::path::{Path, PathBuf};

pub use decode::{DecodeError, DecoderKillHandle, PcmDecoder, PcmRequest};
pub use probe::{MediaInfo, ProbeError};

/// Paths to the external decode and probe binaries.
#[derive(Debug, Clone)]
pub struct MediaToolchain {
    decoder_binary: PathBuf,
    probe_binary: PathBuf,
}

impl MediaToolchain {
    /// Creates a toolchain from the configured decoder binary.
    ///
    /// When no probe binary is given it is derived from the decoder path by
    /// substituting the conventional stem (`ffmpeg` -> `ffprobe`), falling
    /// back to `ffprobe` on the search path.
    #[must_use]
    pub fn new(decoder_binary: PathBuf, probe_binary: Option<PathBuf>) -> Self {
        let probe_binary =
            probe_binary.unwrap_or_else(|| derive_probe_binary(&decoder_binary));
        Self {
            decoder_binary,
            probe_binary,
        }
    }

    /// Reports container duration, frame rate and audio parameters.
    pub async fn probe(&self, input: &Path) -> Result<MediaInfo, ProbeError> {
        probe::probe(&self.probe_binary, input).await
    }

    /// Spawns a decoder child streaming PCM for `request`.
    ///
    /// Blocking: intended to be called from the worker pool, never from the
    /// I/O scheduler.
    pub fn spawn_decoder(&self, request: &PcmRequest) -> Result<PcmDecoder, DecodeError> {
        PcmDecoder::spawn(&self.decoder_binary, request)
    }

    /// The configured decoder binary path.
    #[must_use]
    pub fn decoder_binary(&self) -> &Path {
        &self.decoder_binary
    }

    /// The resolved probe binary path.
    #[must_use]
    pub fn probe_binary(&self) -> &Path {
        &self.probe_binary
    }
}

fn derive_probe_binary(decoder: &Path) -> PathBuf {
    let stem = decoder
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    if stem == "ffmpeg" {
        let mut probe = decoder.to_path_buf();
        let file_name = decoder
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("ffmpeg")
            .replacen("ffmpeg", "ffprobe", 1);
        probe.set_file_name(file_name);
        probe
    } else {
        PathBuf::from("ffprobe")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_binary_derives_from_sibling_ffmpeg() {
        let tc = MediaToolchain::new(PathBuf::from("/opt/media/bin/ffmpeg"), None);
        assert_eq!(tc.probe_binary(), Path::new("/opt/media/bin/ffprobe"));
    }

    #[test]
    fn probe_binary_falls_back_for_custom_decoders() {
        let tc = MediaToolchain::new(PathBuf::from("/usr/local/bin/transcodectl"), None);
        assert_eq!(tc.probe_binary(), Path::new("ffprobe"));
    }

    #[test]
    fn explicit_probe_binary_wins() {
        let tc = MediaToolchain::new(
            PathBuf::from("ffmpeg"),
            Some(PathBuf::from("/custom/probe")),
        );
        assert_eq!(tc.probe_binary(), Path::new("/custom/probe"));
    }
}
