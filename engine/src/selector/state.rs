use slide_deck_common::frame::FrameSample;

use crate::reduce::ReducedFrame;

/// A frame that may become the next slide once the scene stops moving.
pub(crate) struct Pending {
    pub sample: FrameSample,
    pub reduced: ReducedFrame,
    /// Consecutive samples that matched `sample` after it was taken.
    pub settled: u32,
}

impl Pending {
    pub fn new(sample: FrameSample, reduced: ReducedFrame) -> Self {
        Self {
            sample,
            reduced,
            settled: 0,
        }
    }
}

pub(crate) enum SelectorState {
    /// Nothing seen yet. The next frame is captured unconditionally.
    AwaitingFirstFrame,
    /// The scene matches the reference frame.
    Stable,
    /// The scene left the reference and has not settled yet.
    Changing(Pending),
    /// Stream ended or the run was cancelled. Further frames are ignored.
    Done,
}

/// Observable phase of a [`super::SlideSelector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingFirstFrame,
    Stable,
    Changing,
    Done,
}

impl SelectorState {
    pub fn phase(&self) -> Phase {
        match self {
            SelectorState::AwaitingFirstFrame => Phase::AwaitingFirstFrame,
            SelectorState::Stable => Phase::Stable,
            SelectorState::Changing(_) => Phase::Changing,
            SelectorState::Done => Phase::Done,
        }
    }
}
