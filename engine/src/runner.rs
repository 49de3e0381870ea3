use serde::Serialize;
use slide_deck_common::config::SelectionConfig;
use slide_deck_common::frame::{FrameSample, SlideRecord};
use slide_deck_decoder::{FrameSource, Sampled, SourceError};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::detector::SelectError;
use crate::selector::SlideSelector;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("source failed: {0}")]
    Source(#[from] SourceError),
    #[error("selection failed: {0}")]
    Select(#[from] SelectError),
    #[error("decode task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// The source ran to the end.
    Finished,
    /// Stopped early by the cancel token; the deck holds what was committed.
    Cancelled,
}

/// How a caller should read a [`SelectionRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Slides,
    /// Ran to completion without producing a slide.
    Empty,
    /// Cancelled; slides so far are valid but the video was not fully scanned.
    Partial,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub fps: f64,
    pub decoded_frames: u64,
    pub samples: u64,
    pub skipped_frames: u64,
}

#[derive(Debug)]
pub struct SelectionRun {
    pub slides: Vec<SlideRecord>,
    pub stats: RunStats,
    pub completion: Completion,
}

impl SelectionRun {
    pub fn outcome(&self) -> Outcome {
        match self.completion {
            Completion::Cancelled => Outcome::Partial,
            Completion::Finished if self.slides.is_empty() => Outcome::Empty,
            Completion::Finished => Outcome::Slides,
        }
    }
}

/// Owns the selector for one run and accumulates its slides.
struct Collector {
    selector: SlideSelector,
    slides: Vec<SlideRecord>,
    skipped: u64,
    fps: f64,
}

impl Collector {
    fn new(selection: &SelectionConfig, fps: f64) -> Self {
        Self {
            selector: SlideSelector::from_config(selection, fps),
            slides: Vec::new(),
            skipped: 0,
            fps,
        }
    }

    fn accept(&mut self, item: Result<FrameSample, SourceError>) -> Result<(), RunError> {
        match item {
            Ok(sample) => {
                self.slides.extend(self.selector.push(sample)?);
                Ok(())
            }
            Err(e) if !e.is_fatal() => {
                warn!(error = %e, "skipping malformed frame");
                self.skipped += 1;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn finish(mut self, decoded_frames: u64, completion: Completion) -> Result<SelectionRun, RunError> {
        self.slides.extend(self.selector.finish()?);
        let run = SelectionRun {
            slides: self.slides,
            stats: RunStats {
                fps: self.fps,
                decoded_frames,
                samples: self.selector.samples_seen(),
                skipped_frames: self.skipped,
            },
            completion,
        };
        info!(
            slides = run.slides.len(),
            decoded = run.stats.decoded_frames,
            samples = run.stats.samples,
            skipped = run.stats.skipped_frames,
            completion = ?run.completion,
            "selection run finished"
        );
        Ok(run)
    }
}

fn log_start(source: &dyn FrameSource, selection: &SelectionConfig, pipelined: bool) {
    let info = source.info();
    info!(
        source = source.name(),
        width = info.width,
        height = info.height,
        fps = format!("{:.3}", info.fps),
        frame_count = ?info.frame_count,
        stride = selection.sample_stride,
        pipelined,
        "selection run started"
    );
    if !info.has_fps() {
        warn!("stream has no usable frame rate, spacing slides by frame count only");
    }
}

/// Decode and select on the calling thread.
pub fn run<S: FrameSource>(
    source: S,
    selection: &SelectionConfig,
    cancel: &CancelToken,
) -> Result<SelectionRun, RunError> {
    log_start(&source, selection, false);
    let mut collector = Collector::new(selection, source.info().fps);
    let mut sampled = Sampled::new(source, selection.sample_stride);
    let mut completion = Completion::Finished;

    loop {
        if cancel.is_cancelled() {
            warn!(samples = collector.selector.samples_seen(), "run cancelled");
            completion = Completion::Cancelled;
            break;
        }
        let Some(item) = sampled.next() else {
            break;
        };
        collector.accept(item)?;
    }

    collector.finish(sampled.decoded(), completion)
}

/// Decode on a blocking task while the caller scores, one sample in flight.
///
/// Samples cross a channel of capacity 1, so decoding frame i+1 overlaps
/// scoring frame i and memory stays bounded. Scoring order is the decode
/// order.
pub async fn run_pipelined<S: FrameSource + 'static>(
    source: S,
    selection: &SelectionConfig,
    cancel: &CancelToken,
) -> Result<SelectionRun, RunError> {
    log_start(&source, selection, true);
    let mut collector = Collector::new(selection, source.info().fps);

    let (tx, mut rx) = mpsc::channel::<Result<FrameSample, SourceError>>(1);
    let decode_cancel = cancel.clone();
    let stride = selection.sample_stride;
    let decoder = tokio::task::spawn_blocking(move || {
        let mut sampled = Sampled::new(source, stride);
        let mut stopped_early = false;
        loop {
            if decode_cancel.is_cancelled() {
                stopped_early = true;
                break;
            }
            let Some(item) = sampled.next() else {
                break;
            };
            let fatal = matches!(&item, Err(e) if e.is_fatal());
            if tx.blocking_send(item).is_err() {
                // Consumer gave up.
                stopped_early = true;
                break;
            }
            if fatal {
                break;
            }
        }
        (sampled.decoded(), stopped_early)
    });

    let mut completion = Completion::Finished;
    loop {
        if cancel.is_cancelled() {
            completion = Completion::Cancelled;
            break;
        }
        let Some(item) = rx.recv().await else {
            break;
        };
        collector.accept(item)?;
    }
    drop(rx);

    let (decoded, stopped_early) = decoder.await?;
    if stopped_early {
        completion = Completion::Cancelled;
    }
    if completion == Completion::Cancelled {
        warn!(samples = collector.selector.samples_seen(), "run cancelled");
    }
    collector.finish(decoded, completion)
}
