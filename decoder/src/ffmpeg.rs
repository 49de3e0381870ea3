use std::collections::VecDeque;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use slide_deck_common::config::SourceConfig;
use slide_deck_common::frame::{timestamp_for, FrameSample};
use tracing::{debug, info, warn};

use crate::probe::{probe, StreamInfo};
use crate::source::{FrameSource, SourceError};

/// Lines of ffmpeg stderr kept for the error raised on a failed exit.
const STDERR_TAIL_LINES: usize = 20;

/// Arguments for decoding `path` to packed RGB24 on stdout. Autorotation is
/// off so frames keep the coded size reported by ffprobe.
fn decode_command(ffmpeg: &str, path: &Path) -> Command {
    let mut command = Command::new(ffmpeg);
    command
        .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
        .arg(path)
        .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]);
    command
}

/// Read ffmpeg's stderr until it closes, logging every line and returning the
/// last [`STDERR_TAIL_LINES`] of them.
fn drain_stderr(pipe: ChildStderr) -> String {
    let mut reader = BufReader::new(pipe);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                if line.is_empty() {
                    continue;
                }
                debug!(target: "ffmpeg", "{line}");
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "failed to read ffmpeg stderr");
                break;
            }
        }
    }
    Vec::from(tail).join("\n")
}

/// Decodes a video file by piping packed RGB24 frames out of an `ffmpeg`
/// subprocess.
pub struct FfmpegSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    info: StreamInfo,
    frame_len: usize,
    next_index: u64,
    scratch: Vec<u8>,
    finished: bool,
}

impl FfmpegSource {
    /// Probe `path` and start decoding it.
    pub fn open(config: &SourceConfig, path: &Path) -> Result<Self, SourceError> {
        let info = probe(&config.ffprobe, path)?;
        Self::spawn(&config.ffmpeg, path, info)
    }

    fn spawn(ffmpeg: &str, path: &Path, info: StreamInfo) -> Result<Self, SourceError> {
        let mut child = decode_command(ffmpeg, path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SourceError::Spawn {
                program: ffmpeg.to_string(),
                source: e,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            SourceError::Decode("could not get ffmpeg stdout handle".into())
        })?;
        // Drained concurrently so a chatty ffmpeg never blocks on a full pipe.
        let stderr = match child.stderr.take() {
            Some(pipe) => {
                let reader = std::thread::Builder::new()
                    .name("ffmpeg-stderr".into())
                    .spawn(move || drain_stderr(pipe));
                match reader {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(SourceError::Decode(format!(
                            "failed to start ffmpeg stderr reader: {e}"
                        )));
                    }
                }
            }
            None => None,
        };

        let frame_len = info.rgb_frame_len();
        debug!(
            path = %path.display(),
            frame_len,
            "ffmpeg decoder started"
        );

        Ok(Self {
            child,
            stdout: BufReader::with_capacity(frame_len.max(8 * 1024), stdout),
            stderr,
            info,
            frame_len,
            next_index: 0,
            scratch: vec![0; frame_len],
            finished: false,
        })
    }

    /// Read one frame worth of bytes into `scratch`. Returns how many bytes
    /// arrived before EOF.
    fn fill_scratch(&mut self) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < self.frame_len {
            match self.stdout.read(&mut self.scratch[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Wait for ffmpeg after EOF and turn a failed exit into a decode error.
    fn finish(&mut self) -> Option<Result<(), SourceError>> {
        self.finished = true;

        let status = self.child.wait();
        let stderr = match self.stderr.take().map(JoinHandle::join) {
            Some(Ok(tail)) => tail,
            Some(Err(_)) => {
                warn!("ffmpeg stderr reader panicked");
                String::new()
            }
            None => String::new(),
        };

        match status {
            Ok(status) if status.success() => {
                info!(frames = self.next_index, "ffmpeg decode finished");
                None
            }
            Ok(status) => Some(Err(SourceError::Decode(format!(
                "ffmpeg exited with {status}: {}",
                stderr.trim()
            )))),
            Err(e) => Some(Err(SourceError::Decode(format!(
                "failed to wait for ffmpeg: {e}"
            )))),
        }
    }

    /// Pull the next frame's bytes into `scratch`. `Some(Ok(index))` means a
    /// complete frame is ready.
    fn advance(&mut self) -> Option<Result<u64, SourceError>> {
        if self.finished {
            return None;
        }

        let filled = match self.fill_scratch() {
            Ok(n) => n,
            Err(e) => {
                self.finished = true;
                return Some(Err(SourceError::Decode(format!(
                    "failed to read ffmpeg output: {e}"
                ))));
            }
        };

        if filled == 0 {
            return match self.finish() {
                Some(Err(e)) => Some(Err(e)),
                _ => None,
            };
        }

        let index = self.next_index;
        self.next_index += 1;

        if filled < self.frame_len {
            warn!(
                index,
                got = filled,
                expected = self.frame_len,
                "truncated frame at end of ffmpeg output"
            );
            return Some(Err(SourceError::Decode(format!(
                "frame {index} truncated: got {filled} of {} bytes",
                self.frame_len
            ))));
        }

        Some(Ok(index))
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Option<Result<FrameSample, SourceError>> {
        let index = match self.advance()? {
            Ok(index) => index,
            Err(e) => return Some(Err(e)),
        };

        let sample = FrameSample::from_raw(
            index,
            timestamp_for(index, self.info.fps),
            self.info.width,
            self.info.height,
            self.scratch.clone(),
        );
        Some(sample.map_err(SourceError::from))
    }

    fn skip_frame(&mut self) -> Option<Result<(), SourceError>> {
        self.advance().map(|r| r.map(|_| ()))
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            // Stopped early (cancelled or failed): don't leave ffmpeg running.
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
