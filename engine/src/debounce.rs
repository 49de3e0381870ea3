//! Minimum spacing between captured slides.

/// Whether a capture at `candidate` is far enough from the last one.
///
/// Nothing captured yet always allows. A candidate at or before the last
/// capture never does.
pub fn allow(candidate: u64, last_captured: Option<u64>, min_separation_frames: u64) -> bool {
    match last_captured {
        None => true,
        Some(last) => candidate
            .checked_sub(last)
            .is_some_and(|gap| gap > 0 && gap >= min_separation_frames),
    }
}

/// Convert a separation in seconds to decoded frames.
///
/// Streams without a usable frame rate fall back to `fallback` frames.
pub fn min_separation_frames(min_separation_secs: f64, fps: f64, fallback: u64) -> u64 {
    if !fps.is_finite() || fps <= 0.0 {
        return fallback;
    }
    let frames = min_separation_secs * fps;
    if !frames.is_finite() || frames <= 0.0 {
        return 0;
    }
    // Absorb float noise such as 5.0 * 10.0 landing a hair above 50.
    (frames - 1e-9).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_capture_always_allowed() {
        assert!(allow(0, None, 1_000));
        assert!(allow(42, None, u64::MAX));
    }

    #[test]
    fn gap_must_reach_minimum() {
        assert!(!allow(129, Some(100), 30));
        assert!(allow(130, Some(100), 30));
        assert!(allow(500, Some(100), 30));
    }

    #[test]
    fn never_allows_going_backwards_or_repeating() {
        assert!(!allow(99, Some(100), 0));
        assert!(!allow(100, Some(100), 0));
        assert!(allow(101, Some(100), 0));
    }

    #[test]
    fn seconds_to_frames() {
        assert_eq!(min_separation_frames(1.0, 30.0, 7), 30);
        assert_eq!(min_separation_frames(5.0, 10.0, 7), 50);
        assert_eq!(min_separation_frames(1.0, 29.97, 7), 30);
        assert_eq!(min_separation_frames(0.5, 25.0, 7), 13);
        assert_eq!(min_separation_frames(0.0, 30.0, 7), 0);
    }

    #[test]
    fn unknown_fps_uses_fallback() {
        assert_eq!(min_separation_frames(1.0, 0.0, 30), 30);
        assert_eq!(min_separation_frames(1.0, f64::NAN, 30), 30);
        assert_eq!(min_separation_frames(1.0, -24.0, 12), 12);
    }
}
