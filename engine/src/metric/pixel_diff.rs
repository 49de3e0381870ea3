use super::traits::{assert_same_shape, SimilarityMetric};
use crate::reduce::ReducedFrame;

/// Fraction of pixels whose intensity moved by more than `pixel_delta`.
///
/// Cheaper than SSIM and blind to structure, but small localised changes
/// (a cursor, a blinking caret) stay small instead of dominating the score.
pub struct PixelDiff {
    pixel_delta: u8,
}

impl PixelDiff {
    pub fn new(pixel_delta: u8) -> Self {
        Self { pixel_delta }
    }
}

impl SimilarityMetric for PixelDiff {
    fn score(&self, prev: &ReducedFrame, curr: &ReducedFrame) -> f64 {
        assert_same_shape(prev, curr);
        let total = prev.pixels().len();
        if total == 0 {
            return 0.0;
        }
        let changed = prev
            .pixels()
            .iter()
            .zip(curr.pixels())
            .filter(|(a, b)| a.abs_diff(**b) > self.pixel_delta)
            .count();
        changed as f64 / total as f64
    }

    fn name(&self) -> &str {
        "pixel_diff"
    }
}
