mod state;

pub use state::Phase;

use slide_deck_common::config::{ReferenceMode, SelectionConfig};
use slide_deck_common::frame::{FrameSample, SlideRecord};
use tracing::{debug, info};

use crate::debounce;
use crate::detector::{ChangeDetector, Evaluation, SelectError};
use crate::reduce::ReducedFrame;
use state::{Pending, SelectorState};

/// Selection parameters resolved against a concrete stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorSettings {
    pub threshold: f64,
    pub settle_threshold: f64,
    pub settle_samples: u32,
    pub min_separation_frames: u64,
    pub reference_mode: ReferenceMode,
}

impl SelectorSettings {
    pub fn from_config(selection: &SelectionConfig, fps: f64) -> Self {
        Self {
            threshold: selection.similarity_threshold,
            settle_threshold: selection.settle_threshold,
            settle_samples: selection.settle_samples.max(1),
            min_separation_frames: debounce::min_separation_frames(
                selection.min_separation_secs,
                fps,
                selection.fallback_min_separation_frames,
            ),
            reference_mode: selection.reference_mode,
        }
    }
}

/// Walks sampled frames in order and decides which of them become slides.
///
/// The first frame is always a slide. After that a slide is committed when
/// the scene has left the reference frame and then held still for
/// `settle_samples` samples, provided the debounce gate allows it. The frame
/// committed is the first one of the settled content, so animated
/// transitions yield their final state rather than an intermediate one.
pub struct SlideSelector {
    detector: ChangeDetector,
    settings: SelectorSettings,
    state: SelectorState,
    last_captured: Option<u64>,
    last_index: Option<u64>,
    next_sequence: u32,
    samples_seen: u64,
}

impl SlideSelector {
    pub fn new(detector: ChangeDetector, settings: SelectorSettings) -> Self {
        Self {
            detector,
            settings,
            state: SelectorState::AwaitingFirstFrame,
            last_captured: None,
            last_index: None,
            next_sequence: 0,
            samples_seen: 0,
        }
    }

    pub fn from_config(selection: &SelectionConfig, fps: f64) -> Self {
        let settings = SelectorSettings::from_config(selection, fps);
        info!(
            metric = ?selection.metric,
            threshold = settings.threshold,
            settle_threshold = settings.settle_threshold,
            settle_samples = settings.settle_samples,
            min_separation_frames = settings.min_separation_frames,
            reference_mode = ?settings.reference_mode,
            "slide selector configured"
        );
        Self::new(ChangeDetector::from_config(selection), settings)
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    pub fn slides_committed(&self) -> u32 {
        self.next_sequence
    }

    /// Feed the next sampled frame. Returns the slide it committed, if any.
    ///
    /// Indices must strictly increase across calls. Frames pushed after
    /// [`SlideSelector::finish`] are ignored.
    pub fn push(&mut self, sample: FrameSample) -> Result<Option<SlideRecord>, SelectError> {
        if matches!(self.state, SelectorState::Done) {
            debug!(index = sample.index, "selector finished, ignoring frame");
            return Ok(None);
        }
        if let Some(previous) = self.last_index {
            if sample.index <= previous {
                return Err(SelectError::OutOfOrder {
                    previous,
                    got: sample.index,
                });
            }
        }
        self.last_index = Some(sample.index);
        self.samples_seen += 1;

        let reduced = self.detector.reduce(&sample);

        // Done is only a placeholder while the handlers own the old state.
        let (next, slide) = match std::mem::replace(&mut self.state, SelectorState::Done) {
            SelectorState::AwaitingFirstFrame => self.handle_first(sample, reduced)?,
            SelectorState::Stable => self.handle_stable(sample, reduced)?,
            SelectorState::Changing(pending) => self.handle_changing(pending, sample, reduced)?,
            SelectorState::Done => (SelectorState::Done, None),
        };
        self.state = next;
        Ok(slide)
    }

    /// End the stream. A candidate still pending is committed as the final
    /// slide without consulting the debounce gate, unless it matches the
    /// reference frame.
    pub fn finish(&mut self) -> Result<Option<SlideRecord>, SelectError> {
        match std::mem::replace(&mut self.state, SelectorState::Done) {
            SelectorState::Changing(pending) => {
                let score = self.reference_score(&pending.reduced)?;
                if score < self.settings.threshold {
                    debug!(
                        index = pending.sample.index,
                        score = format!("{:.4}", score),
                        "CHANGING→DONE: pending frame matches reference, nothing to flush"
                    );
                    return Ok(None);
                }
                info!(
                    index = pending.sample.index,
                    score = format!("{:.4}", score),
                    "CHANGING→DONE: flushing pending frame as final slide"
                );
                Ok(Some(self.commit(pending.sample)))
            }
            previous => {
                debug!(phase = ?previous.phase(), "selector done");
                Ok(None)
            }
        }
    }

    fn handle_first(
        &mut self,
        sample: FrameSample,
        reduced: ReducedFrame,
    ) -> Result<(SelectorState, Option<SlideRecord>), SelectError> {
        self.detector.evaluate(&reduced)?;
        info!(
            index = sample.index,
            ts = sample.timestamp_secs,
            "first frame, capturing as opening slide"
        );
        Ok((SelectorState::Stable, Some(self.commit(sample))))
    }

    fn handle_stable(
        &mut self,
        sample: FrameSample,
        reduced: ReducedFrame,
    ) -> Result<(SelectorState, Option<SlideRecord>), SelectError> {
        let score = self.reference_score(&reduced)?;
        if score < self.settings.threshold {
            debug!(
                index = sample.index,
                score = format!("{:.4}", score),
                "STABLE: frame similar to reference"
            );
            if self.settings.reference_mode == ReferenceMode::Follow {
                self.detector.rebase(reduced)?;
            }
            return Ok((SelectorState::Stable, None));
        }

        info!(
            index = sample.index,
            score = format!("{:.4}", score),
            threshold = self.settings.threshold,
            "STABLE→CHANGING: scene left reference"
        );
        Ok((SelectorState::Changing(Pending::new(sample, reduced)), None))
    }

    fn handle_changing(
        &mut self,
        mut pending: Pending,
        sample: FrameSample,
        reduced: ReducedFrame,
    ) -> Result<(SelectorState, Option<SlideRecord>), SelectError> {
        let motion = self.detector.compare(&pending.reduced, &reduced)?;
        if motion >= self.settings.settle_threshold {
            debug!(
                index = sample.index,
                motion = format!("{:.4}", motion),
                "CHANGING: still moving, new candidate"
            );
            return Ok((SelectorState::Changing(Pending::new(sample, reduced)), None));
        }

        pending.settled += 1;
        if pending.settled < self.settings.settle_samples {
            debug!(
                index = sample.index,
                settled = pending.settled,
                needed = self.settings.settle_samples,
                "CHANGING: settling"
            );
            return Ok((SelectorState::Changing(pending), None));
        }

        let score = self.reference_score(&pending.reduced)?;
        if score < self.settings.threshold {
            info!(
                index = sample.index,
                score = format!("{:.4}", score),
                "CHANGING→STABLE: scene returned to reference, no capture"
            );
            if self.settings.reference_mode == ReferenceMode::Follow {
                self.detector.rebase(reduced)?;
            }
            return Ok((SelectorState::Stable, None));
        }

        let candidate = pending.sample.index;
        if !debounce::allow(candidate, self.last_captured, self.settings.min_separation_frames) {
            debug!(
                candidate,
                last_captured = ?self.last_captured,
                min_separation_frames = self.settings.min_separation_frames,
                "CHANGING: settled but too close to previous slide, holding"
            );
            // Same content, later index: the gate is asked again next sample.
            let settled = pending.settled;
            return Ok((
                SelectorState::Changing(Pending {
                    sample,
                    reduced,
                    settled,
                }),
                None,
            ));
        }

        info!(
            index = candidate,
            ts = pending.sample.timestamp_secs,
            score = format!("{:.4}", score),
            settled = pending.settled,
            "CHANGING→STABLE: scene settled, capturing slide"
        );
        self.detector.rebase(pending.reduced)?;
        Ok((SelectorState::Stable, Some(self.commit(pending.sample))))
    }

    /// Dissimilarity to the reference. Without a reference the frame is
    /// adopted and counts as similar.
    fn reference_score(&mut self, reduced: &ReducedFrame) -> Result<f64, SelectError> {
        match self.detector.evaluate(reduced)? {
            Evaluation::First => Ok(0.0),
            Evaluation::Scored(score) => Ok(score),
        }
    }

    fn commit(&mut self, sample: FrameSample) -> SlideRecord {
        let slide = SlideRecord::from_sample(self.next_sequence, sample);
        self.next_sequence += 1;
        self.last_captured = Some(slide.frame_index);
        info!(
            sequence = slide.sequence,
            index = slide.frame_index,
            timecode = %slide.timecode(),
            "slide committed"
        );
        slide
    }
}
