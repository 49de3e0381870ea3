use slide_deck_common::config::SelectionConfig;
use slide_deck_common::frame::FrameSample;
use tracing::debug;

use crate::metric::{self, SimilarityMetric};
use crate::reduce::ReducedFrame;

/// Result of scoring a frame against the reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// There was no reference yet; the frame became the reference.
    First,
    /// Dissimilarity to the reference, lower is more similar.
    Scored(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("reduced frame is {got:?}, detector expects {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        got: (u32, u32),
    },
    #[error("frame {got} arrived after frame {previous}")]
    OutOfOrder { previous: u64, got: u64 },
}

/// Reduces frames and scores them against a single reference frame.
///
/// The detector does not decide which frame is the reference; callers move it
/// with [`ChangeDetector::rebase`].
pub struct ChangeDetector {
    metric: Box<dyn SimilarityMetric>,
    size: (u32, u32),
    reference: Option<ReducedFrame>,
}

impl ChangeDetector {
    pub fn new(metric: Box<dyn SimilarityMetric>, size: (u32, u32)) -> Self {
        Self {
            metric,
            size,
            reference: None,
        }
    }

    pub fn from_config(selection: &SelectionConfig) -> Self {
        Self::new(metric::from_config(selection), selection.downsample_size())
    }

    pub fn reduce(&self, sample: &FrameSample) -> ReducedFrame {
        ReducedFrame::from_sample(sample, self.size)
    }

    pub fn evaluate(&mut self, reduced: &ReducedFrame) -> Result<Evaluation, SelectError> {
        self.check(reduced)?;
        match &self.reference {
            None => {
                debug!(metric = self.metric.name(), "no reference yet, adopting frame");
                self.reference = Some(reduced.clone());
                Ok(Evaluation::First)
            }
            Some(reference) => Ok(Evaluation::Scored(self.metric.score(reference, reduced))),
        }
    }

    /// Score two arbitrary frames with the configured metric.
    pub fn compare(&self, a: &ReducedFrame, b: &ReducedFrame) -> Result<f64, SelectError> {
        self.check(a)?;
        self.check(b)?;
        Ok(self.metric.score(a, b))
    }

    pub fn rebase(&mut self, reduced: ReducedFrame) -> Result<(), SelectError> {
        self.check(&reduced)?;
        self.reference = Some(reduced);
        Ok(())
    }

    pub fn reference(&self) -> Option<&ReducedFrame> {
        self.reference.as_ref()
    }

    pub fn reset(&mut self) {
        self.reference = None;
    }

    pub fn metric_name(&self) -> &str {
        self.metric.name()
    }

    fn check(&self, reduced: &ReducedFrame) -> Result<(), SelectError> {
        if reduced.dimensions() == self.size {
            Ok(())
        } else {
            Err(SelectError::DimensionMismatch {
                expected: self.size,
                got: reduced.dimensions(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Ssim;
    use crate::testutil::{gray, horizontal_stripes, reduced_from, sample, vertical_stripes, Look};

    fn detector() -> ChangeDetector {
        ChangeDetector::new(Box::new(Ssim), (128, 72))
    }

    #[test]
    fn first_frame_is_signalled() {
        let mut d = detector();
        assert!(d.reference().is_none());
        assert_eq!(d.evaluate(&gray(10)).unwrap(), Evaluation::First);
        assert!(d.reference().is_some());
        assert_eq!(d.evaluate(&gray(10)).unwrap(), Evaluation::Scored(0.0));
    }

    #[test]
    fn scores_against_reference_not_previous_frame() {
        let mut d = detector();
        d.evaluate(&horizontal_stripes()).unwrap();
        let Evaluation::Scored(first) = d.evaluate(&vertical_stripes()).unwrap() else {
            panic!("expected a score");
        };
        let Evaluation::Scored(second) = d.evaluate(&vertical_stripes()).unwrap() else {
            panic!("expected a score");
        };
        assert!(first > 0.5);
        assert_eq!(first, second);
    }

    #[test]
    fn rebase_and_reset() {
        let mut d = detector();
        d.evaluate(&horizontal_stripes()).unwrap();
        d.rebase(vertical_stripes()).unwrap();
        assert_eq!(d.evaluate(&vertical_stripes()).unwrap(), Evaluation::Scored(0.0));
        d.reset();
        assert_eq!(d.evaluate(&gray(0)).unwrap(), Evaluation::First);
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let mut d = detector();
        let small = reduced_from(64, 36, |_, _| 0);
        let err = d.evaluate(&small).unwrap_err();
        assert!(matches!(
            err,
            SelectError::DimensionMismatch {
                expected: (128, 72),
                got: (64, 36)
            }
        ));
        assert!(d.compare(&gray(0), &small).is_err());
        assert!(d.rebase(small).is_err());
    }

    #[test]
    fn reduce_uses_configured_size() {
        let mut selection = SelectionConfig::default();
        selection.downsample_width = 32;
        selection.downsample_height = 18;
        let d = ChangeDetector::from_config(&selection);
        let reduced = d.reduce(&sample(0, 30.0, Look::Dark));
        assert_eq!(reduced.dimensions(), (32, 18));
        assert_eq!(d.metric_name(), "ssim");
    }
}
