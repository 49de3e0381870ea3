use std::collections::VecDeque;

use slide_deck_common::frame::{FrameError, FrameSample};
use tracing::debug;

use crate::probe::StreamInfo;

/// A decoded video stream, read strictly in frame order.
pub trait FrameSource: Send {
    fn info(&self) -> &StreamInfo;

    /// Next decoded frame, `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Option<Result<FrameSample, SourceError>>;

    /// Advance past one frame without materialising it. Sources that can skip
    /// cheaply (no pixel conversion) override this.
    fn skip_frame(&mut self) -> Option<Result<(), SourceError>> {
        self.next_frame().map(|frame| frame.map(|_| ()))
    }

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn info(&self) -> &StreamInfo {
        (**self).info()
    }

    fn next_frame(&mut self) -> Option<Result<FrameSample, SourceError>> {
        (**self).next_frame()
    }

    fn skip_frame(&mut self) -> Option<Result<(), SourceError>> {
        (**self).skip_frame()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("failed to probe {path}: {reason}")]
    Probe { path: String, reason: String },
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),
}

impl SourceError {
    /// Malformed single frames are skipped; everything else ends the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SourceError::MalformedFrame(_))
    }
}

/// Yields every `stride`-th decoded frame, starting with frame 0.
pub struct Sampled<S> {
    source: S,
    stride: u64,
    position: u64,
    decoded: u64,
}

impl<S: FrameSource> Sampled<S> {
    pub fn new(source: S, stride: u32) -> Self {
        Self {
            source,
            stride: u64::from(stride.max(1)),
            position: 0,
            decoded: 0,
        }
    }

    /// Decoded frames consumed so far, sampled or not.
    pub fn decoded(&self) -> u64 {
        self.decoded
    }
}

impl<S: FrameSource> Iterator for Sampled<S> {
    type Item = Result<FrameSample, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.position % self.stride != 0 {
            match self.source.skip_frame()? {
                Ok(()) => {
                    self.position += 1;
                    self.decoded += 1;
                }
                Err(e) if e.is_fatal() => return Some(Err(e)),
                Err(e) => {
                    debug!(error = %e, "malformed frame between samples, ignoring");
                    self.position += 1;
                    self.decoded += 1;
                }
            }
        }

        let frame = self.source.next_frame()?;
        self.position += 1;
        self.decoded += 1;
        Some(frame)
    }
}

/// Frames that were decoded elsewhere, replayed in order.
pub struct MemorySource {
    info: StreamInfo,
    frames: VecDeque<Result<FrameSample, SourceError>>,
}

impl MemorySource {
    pub fn new(fps: f64, frames: Vec<FrameSample>) -> Self {
        Self::from_results(fps, frames.into_iter().map(Ok).collect())
    }

    /// Like [`MemorySource::new`] but lets individual entries be errors, the
    /// way a real decoder can hand back a broken frame mid-stream.
    pub fn from_results(fps: f64, frames: Vec<Result<FrameSample, SourceError>>) -> Self {
        let (width, height) = frames
            .iter()
            .find_map(|f| f.as_ref().ok())
            .map(|f| (f.width(), f.height()))
            .unwrap_or((0, 0));
        let info = StreamInfo {
            width,
            height,
            fps,
            frame_count: Some(frames.len() as u64),
        };
        Self {
            info,
            frames: frames.into(),
        }
    }
}

impl FrameSource for MemorySource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Option<Result<FrameSample, SourceError>> {
        self.frames.pop_front()
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn frames(n: u64) -> Vec<FrameSample> {
        (0..n)
            .map(|i| FrameSample::new(i, i as f64 / 10.0, RgbImage::new(4, 2)))
            .collect()
    }

    #[test]
    fn memory_source_reports_geometry() {
        let source = MemorySource::new(10.0, frames(3));
        assert_eq!(source.info().width, 4);
        assert_eq!(source.info().height, 2);
        assert_eq!(source.info().frame_count, Some(3));
    }

    #[test]
    fn stride_one_yields_everything() {
        let sampled = Sampled::new(MemorySource::new(10.0, frames(5)), 1);
        let indices: Vec<u64> = sampled.map(|f| f.unwrap().index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn stride_picks_every_nth_from_zero() {
        let mut sampled = Sampled::new(MemorySource::new(10.0, frames(10)), 3);
        let mut indices = Vec::new();
        for frame in sampled.by_ref() {
            indices.push(frame.unwrap().index);
        }
        assert_eq!(indices, vec![0, 3, 6, 9]);
        assert_eq!(sampled.decoded(), 10);
    }

    #[test]
    fn malformed_frames_surface_only_when_sampled() {
        let broken = || -> Result<FrameSample, SourceError> {
            Err(SourceError::MalformedFrame(FrameError::EmptyFrame { index: 0 }))
        };
        let mut entries: Vec<Result<FrameSample, SourceError>> =
            frames(4).into_iter().map(Ok).collect();
        entries[1] = broken();
        entries[2] = broken();

        let sampled = Sampled::new(MemorySource::from_results(10.0, entries), 2);
        let results: Vec<_> = sampled.collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(SourceError::MalformedFrame(_))));
    }

    #[test]
    fn fatal_errors_stop_skipping() {
        let mut entries: Vec<Result<FrameSample, SourceError>> =
            frames(4).into_iter().map(Ok).collect();
        entries[1] = Err(SourceError::Decode("corrupt stream".into()));

        let mut sampled = Sampled::new(MemorySource::from_results(10.0, entries), 3);
        assert!(sampled.next().unwrap().is_ok());
        let err = sampled.next().unwrap().unwrap_err();
        assert!(err.is_fatal());
    }
}
