use super::traits::{assert_same_shape, SimilarityMetric};
use crate::reduce::ReducedFrame;

const NUM_BINS: usize = 64;

/// Histogram-based dissimilarity.
///
/// Builds a normalised 64-bin intensity histogram per frame and compares them
/// via chi-squared distance. The raw distance lies in `[0, 2]` and is halved.
/// Insensitive to layout: two frames with the same tones in different places
/// score as identical.
pub struct HistogramDistance;

impl HistogramDistance {
    fn histogram(frame: &ReducedFrame) -> [f64; NUM_BINS] {
        let mut bins = [0u64; NUM_BINS];
        let pixels = frame.pixels();
        for &p in pixels {
            let bin = (p as usize * NUM_BINS) / 256;
            bins[bin.min(NUM_BINS - 1)] += 1;
        }

        let mut hist = [0.0f64; NUM_BINS];
        if pixels.is_empty() {
            return hist;
        }
        let total = pixels.len() as f64;
        for (i, &count) in bins.iter().enumerate() {
            hist[i] = count as f64 / total;
        }
        hist
    }

    /// Chi-squared distance between two histograms.
    fn chi_squared(a: &[f64; NUM_BINS], b: &[f64; NUM_BINS]) -> f64 {
        let mut sum = 0.0;
        for i in 0..NUM_BINS {
            let denom = a[i] + b[i];
            if denom > 1e-10 {
                let diff = a[i] - b[i];
                sum += (diff * diff) / denom;
            }
        }
        sum
    }
}

impl SimilarityMetric for HistogramDistance {
    fn score(&self, prev: &ReducedFrame, curr: &ReducedFrame) -> f64 {
        assert_same_shape(prev, curr);
        let distance = Self::chi_squared(&Self::histogram(prev), &Self::histogram(curr));
        (distance / 2.0).clamp(0.0, 1.0)
    }

    fn name(&self) -> &str {
        "histogram"
    }
}
