//! PCM decoding through an external decoder subprocess.
//!
//! The decoder child is spawned with stdin closed, stdout as a raw PCM byte
//! pipe, and stderr carrying line-delimited `key=value` progress reports.
//! The orchestrator owns the child through [`PcmDecoder`]; cancellation kills
//! the child via a [`DecoderKillHandle`] and then waits, never orphaning it.
//!
//! All of this is blocking by design: decoding runs on the worker pool,
//! feeding the silence analyzer through the [`std::io::Read`] impl.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::constants::DECODER_STDERR_TAIL_BYTES;

/// Errors from the decode stage.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The decoder binary could not be started.
    #[error("failed to launch decoder: {0}")]
    Launch(std::io::Error),

    /// The decoder exited with a non-zero status.
    #[error("decoder failed: {stderr_tail}")]
    ToolchainFailed {
        /// Tail of the decoder's stderr output (last ~4 KB).
        stderr_tail: String,
    },
}

/// Parameters for one decode run.
#[derive(Debug, Clone)]
pub struct PcmRequest {
    /// Validated source path (inside the upload directory).
    pub input: PathBuf,
    /// Target sample rate for the PCM output.
    pub sample_rate_hz: u32,
    /// Target channel count for the PCM output.
    pub channels: u16,
}

/// Shared stderr state fed by the collector thread.
struct StderrState {
    tail: VecDeque<u8>,
    out_time_us: AtomicU64,
}

impl StderrState {
    fn new() -> Self {
        Self {
            tail: VecDeque::with_capacity(DECODER_STDERR_TAIL_BYTES),
            out_time_us: AtomicU64::new(0),
        }
    }

    fn push_line(&mut self, line: &str) {
        if let Some(value) = line
            .strip_prefix("out_time_us=")
            .or_else(|| line.strip_prefix("out_time_ms="))
        {
            if let Ok(us) = value.trim().parse::<u64>() {
                self.out_time_us.store(us, Ordering::Relaxed);
            }
            return; // progress lines don't belong in the error tail
        }
        for byte in line.as_bytes() {
            if self.tail.len() == DECODER_STDERR_TAIL_BYTES {
                self.tail.pop_front();
            }
            self.tail.push_back(*byte);
        }
        if self.tail.len() == DECODER_STDERR_TAIL_BYTES {
            self.tail.pop_front();
        }
        self.tail.push_back(b'\n');
    }

    fn tail_string(&self) -> String {
        let bytes: Vec<u8> = self.tail.iter().copied().collect();
        String::from_utf8_lossy(&bytes).trim().to_string()
    }
}

/// Handle for terminating a running decoder from another task.
///
/// Killing is idempotent; the owning [`PcmDecoder`] treats a killed child's
/// exit status as cancellation rather than toolchain failure.
#[derive(Clone)]
pub struct DecoderKillHandle {
    child: Arc<Mutex<Child>>,
    killed: Arc<AtomicBool>,
}

impl DecoderKillHandle {
    /// Sends termination to the child. Safe to call repeatedly.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
        let mut child = self.child.lock();
        if let Err(e) = child.kill() {
            // Already exited is the common benign case.
            log::debug!("[Decode] Kill signal not delivered: {}", e);
        }
    }
}

/// A running decoder child streaming interleaved s16le PCM.
pub struct PcmDecoder {
    child: Arc<Mutex<Child>>,
    stdout: ChildStdout,
    stderr_state: Arc<Mutex<StderrState>>,
    stderr_thread: Option<std::thread::JoinHandle<()>>,
    killed: Arc<AtomicBool>,
    finished: bool,
}

impl PcmDecoder {
    /// Spawns the decoder child for `request`.
    ///
    /// The input path is passed as a distinct argument vector element.
    pub fn spawn(binary: &Path, request: &PcmRequest) -> Result<Self, DecodeError> {
        let mut child = Command::new(binary)
            .args(decode_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(DecodeError::Launch)?;

        // Both pipes exist because we just configured them.
        let stdout = child.stdout.take().expect("decoder stdout pipe");
        let stderr = child.stderr.take().expect("decoder stderr pipe");

        let stderr_state = Arc::new(Mutex::new(StderrState::new()));
        let collector_state = Arc::clone(&stderr_state);
        let stderr_thread = std::thread::spawn(move || {
            let reader = BufReader::new(stderr);
            for line in reader.lines() {
                match line {
                    Ok(line) => collector_state.lock().push_line(&line),
                    Err(_) => break,
                }
            }
        });

        log::debug!(
            "[Decode] Spawned decoder: input={}, rate={}, channels={}",
            request.input.display(),
            request.sample_rate_hz,
            request.channels
        );

        Ok(Self {
            child: Arc::new(Mutex::new(child)),
            stdout,
            stderr_state,
            stderr_thread: Some(stderr_thread),
            killed: Arc::new(AtomicBool::new(false)),
            finished: false,
        })
    }

    /// Returns a handle that can terminate this child from another task.
    #[must_use]
    pub fn kill_handle(&self) -> DecoderKillHandle {
        DecoderKillHandle {
            child: Arc::clone(&self.child),
            killed: Arc::clone(&self.killed),
        }
    }

    /// Latest decode position reported on stderr (microseconds).
    #[must_use]
    pub fn progress_us(&self) -> u64 {
        self.stderr_state.lock().out_time_us.load(Ordering::Relaxed)
    }

    /// Waits for the child and checks its exit status.
    ///
    /// Returns the stderr tail on success so callers can log it. A child that
    /// was killed through the handle is not a toolchain failure; the caller is
    /// already on the cancellation path.
    pub fn finish(mut self) -> Result<String, DecodeError> {
        self.finished = true;

        let status = self.child.lock().wait();
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
        let tail = self.stderr_state.lock().tail_string();

        match status {
            Ok(status) if status.success() => Ok(tail),
            _ if self.killed.load(Ordering::SeqCst) => Ok(tail),
            Ok(status) => {
                log::warn!("[Decode] Decoder exited with {}: {}", status, tail);
                Err(DecodeError::ToolchainFailed { stderr_tail: tail })
            }
            Err(e) => Err(DecodeError::ToolchainFailed {
                stderr_tail: format!("wait failed: {e}; {tail}"),
            }),
        }
    }
}

impl Read for PcmDecoder {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stdout.read(buf)
    }
}

impl Drop for PcmDecoder {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Dropped without finish(): kill and reap so nothing is orphaned.
        {
            let mut child = self.child.lock();
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Builds the decoder argument vector for `request`.
fn decode_args(request: &PcmRequest) -> Vec<std::ffi::OsString> {
    let mut args: Vec<std::ffi::OsString> = vec![
        "-hide_banner".into(),
        "-nostats".into(),
        "-loglevel".into(),
        "error".into(),
        "-progress".into(),
        "pipe:2".into(),
        "-i".into(),
    ];
    args.push(request.input.as_os_str().to_os_string());
    args.extend::<[std::ffi::OsString; 12]>([
        "-vn".into(),
        "-sn".into(),
        "-dn".into(),
        "-f".into(),
        "s16le".into(),
        "-acodec".into(),
        "pcm_s16le".into(),
        "-ac".into(),
        request.channels.to_string().into(),
        "-ar".into(),
        request.sample_rate_hz.to_string().into(),
        "pipe:1".into(),
    ]);
    args
}
