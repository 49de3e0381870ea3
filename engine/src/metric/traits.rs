use crate::reduce::ReducedFrame;

/// Scores how different two reduced frames are.
///
/// Implementations are pure: the same pair always yields the same score, and
/// swapping the arguments does not change it beyond rounding. Every shipped
/// metric returns a value in `[0, 1]`, 0 meaning identical.
pub trait SimilarityMetric: Send + Sync {
    fn score(&self, prev: &ReducedFrame, curr: &ReducedFrame) -> f64;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Metrics only compare frames reduced to the same size.
pub(crate) fn assert_same_shape(prev: &ReducedFrame, curr: &ReducedFrame) {
    assert_eq!(
        prev.dimensions(),
        curr.dimensions(),
        "compared reduced frames must share dimensions"
    );
}
