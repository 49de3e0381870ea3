//! Slide selection engine: turns a decoded frame stream into an ordered,
//! non-redundant deck of slides.

pub mod cancel;
pub mod debounce;
pub mod deck;
pub mod detector;
pub mod metric;
pub mod reduce;
pub mod runner;
pub mod selector;

#[cfg(test)]
pub(crate) mod testutil;

pub use cancel::CancelToken;
pub use deck::{DirectorySink, SinkError, SlideSink};
pub use detector::{ChangeDetector, Evaluation, SelectError};
pub use reduce::ReducedFrame;
pub use runner::{Completion, Outcome, RunError, RunStats, SelectionRun};
pub use selector::{Phase, SelectorSettings, SlideSelector};
