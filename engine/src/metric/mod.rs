pub mod histogram;
pub mod pixel_diff;
pub mod ssim;
pub mod traits;

use slide_deck_common::config::{MetricKind, SelectionConfig};

pub use histogram::HistogramDistance;
pub use pixel_diff::PixelDiff;
pub use ssim::Ssim;
pub use traits::SimilarityMetric;

/// Build the metric named by the `selection.metric` key.
pub fn from_config(selection: &SelectionConfig) -> Box<dyn SimilarityMetric> {
    match selection.metric {
        MetricKind::Ssim => Box::new(Ssim),
        MetricKind::PixelDiff => Box::new(PixelDiff::new(selection.pixel_delta)),
        MetricKind::Histogram => Box::new(HistogramDistance),
    }
}
