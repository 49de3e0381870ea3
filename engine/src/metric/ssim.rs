use super::traits::{assert_same_shape, SimilarityMetric};
use crate::reduce::ReducedFrame;

const WIN: usize = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Structural dissimilarity, `1 − SSIM`.
///
/// Matches scikit-image's `structural_similarity` for 8-bit grayscale input:
/// 7×7 uniform window, sample covariance, mean over the windows that fit
/// entirely inside the frame. Frames smaller than one window are treated as a
/// single window. The index is clamped to `[0, 1]` before inverting, so
/// anti-correlated frames score 1.
pub struct Ssim;

impl Ssim {
    /// Mean SSIM index of two equally sized frames.
    pub fn index(prev: &ReducedFrame, curr: &ReducedFrame) -> f64 {
        assert_same_shape(prev, curr);
        let (w, h) = (prev.width() as usize, prev.height() as usize);
        if w == 0 || h == 0 {
            return 1.0;
        }
        if w < WIN || h < WIN {
            return global_index(prev.pixels(), curr.pixels());
        }

        let sums = WindowSums::new(prev.pixels(), curr.pixels(), w, h);
        let n = (WIN * WIN) as f64;
        let cov_norm = n / (n - 1.0);

        let mut total = 0.0;
        let mut count = 0usize;
        for y in 0..=(h - WIN) {
            for x in 0..=(w - WIN) {
                let [sa, sb, saa, sbb, sab] = sums.window(x, y);
                total += ssim_term(sa / n, sb / n, saa / n, sbb / n, sab / n, cov_norm);
                count += 1;
            }
        }
        total / count as f64
    }
}

impl SimilarityMetric for Ssim {
    fn score(&self, prev: &ReducedFrame, curr: &ReducedFrame) -> f64 {
        1.0 - Self::index(prev, curr).clamp(0.0, 1.0)
    }

    fn name(&self) -> &str {
        "ssim"
    }
}

fn ssim_term(ux: f64, uy: f64, uxx: f64, uyy: f64, uxy: f64, cov_norm: f64) -> f64 {
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);
    let vx = cov_norm * (uxx - ux * ux);
    let vy = cov_norm * (uyy - uy * uy);
    let vxy = cov_norm * (uxy - ux * uy);
    ((2.0 * ux * uy + c1) * (2.0 * vxy + c2)) / ((ux * ux + uy * uy + c1) * (vx + vy + c2))
}

fn global_index(a: &[u8], b: &[u8]) -> f64 {
    let mut acc = [0u64; 5];
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (u64::from(x), u64::from(y));
        acc[0] += x;
        acc[1] += y;
        acc[2] += x * x;
        acc[3] += y * y;
        acc[4] += x * y;
    }
    let n = a.len() as f64;
    let cov_norm = if a.len() > 1 { n / (n - 1.0) } else { 1.0 };
    let [sa, sb, saa, sbb, sab] = acc.map(|v| v as f64 / n);
    ssim_term(sa, sb, saa, sbb, sab, cov_norm)
}

/// Summed-area tables for x, y, x², y² and xy. Integer sums keep every window
/// exact, so the score does not depend on traversal order.
struct WindowSums {
    stride: usize,
    tables: [Vec<u64>; 5],
}

impl WindowSums {
    fn new(a: &[u8], b: &[u8], w: usize, h: usize) -> Self {
        let stride = w + 1;
        let mut tables: [Vec<u64>; 5] = std::array::from_fn(|_| vec![0u64; stride * (h + 1)]);
        for y in 0..h {
            let mut row = [0u64; 5];
            for x in 0..w {
                let (p, q) = (u64::from(a[y * w + x]), u64::from(b[y * w + x]));
                row[0] += p;
                row[1] += q;
                row[2] += p * p;
                row[3] += q * q;
                row[4] += p * q;
                let at = (y + 1) * stride + x + 1;
                let above = y * stride + x + 1;
                for (table, r) in tables.iter_mut().zip(row) {
                    table[at] = table[above] + r;
                }
            }
        }
        Self { stride, tables }
    }

    /// Sums over the `WIN`×`WIN` window whose top-left corner is `(x, y)`.
    fn window(&self, x: usize, y: usize) -> [f64; 5] {
        let s = self.stride;
        let (x1, y1) = (x + WIN, y + WIN);
        std::array::from_fn(|i| {
            let t = &self.tables[i];
            (t[y1 * s + x1] + t[y * s + x] - t[y * s + x1] - t[y1 * s + x]) as f64
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{gray, horizontal_stripes, reduced_from, row_fill, vertical_stripes};

    #[test]
    fn identical_frames_score_zero() {
        let a = horizontal_stripes();
        assert!(Ssim.score(&a, &a).abs() < 1e-12);
        let flat = gray(90);
        assert!(Ssim.score(&flat, &flat).abs() < 1e-12);
    }

    #[test]
    fn black_and_white_are_maximally_different() {
        let score = Ssim.score(&gray(0), &gray(255));
        assert!(score > 0.99, "score {score}");
    }

    #[test]
    fn structure_change_is_large() {
        let score = Ssim.score(&horizontal_stripes(), &vertical_stripes());
        assert!(score > 0.5, "score {score}");
    }

    #[test]
    fn symmetric() {
        let a = row_fill(0.25);
        let b = horizontal_stripes();
        assert!((Ssim.score(&a, &b) - Ssim.score(&b, &a)).abs() < 1e-12);
    }

    #[test]
    fn bigger_change_scores_higher() {
        let base = row_fill(0.0);
        let small = Ssim.score(&base, &row_fill(0.1));
        let large = Ssim.score(&base, &row_fill(0.6));
        assert!(small < large, "small {small} large {large}");
    }

    #[test]
    fn tiny_frames_use_one_window() {
        let a = reduced_from(4, 4, |x, _| (x * 60) as u8);
        assert!(Ssim.score(&a, &a).abs() < 1e-12);
        let b = reduced_from(4, 4, |x, _| (255 - x * 60) as u8);
        assert!(Ssim.score(&a, &b) > 0.9);
    }

    #[test]
    fn window_sums_match_direct_sum() {
        let a = reduced_from(10, 9, |x, y| (x * 17 + y * 5) as u8);
        let b = reduced_from(10, 9, |x, y| (x * 3 + y * 23) as u8);
        let sums = WindowSums::new(a.pixels(), b.pixels(), 10, 9);
        let [sa, _, _, _, sab] = sums.window(2, 1);
        let mut direct_a = 0u64;
        let mut direct_ab = 0u64;
        for y in 1..8 {
            for x in 2..9 {
                let p = u64::from(a.pixels()[y * 10 + x]);
                let q = u64::from(b.pixels()[y * 10 + x]);
                direct_a += p;
                direct_ab += p * q;
            }
        }
        assert_eq!(sa, direct_a as f64);
        assert_eq!(sab, direct_ab as f64);
    }
}
