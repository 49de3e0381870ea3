//! Synthetic frames shared by the engine's unit tests. Everything is built at
//! the default reduction size so reducing a sample does not resample it.

use image::{GrayImage, Luma, Rgb, RgbImage};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use slide_deck_common::frame::FrameSample;

use crate::reduce::ReducedFrame;

pub const W: u32 = 128;
pub const H: u32 = 72;

pub fn reduced_from(w: u32, h: u32, f: impl Fn(usize, usize) -> u8) -> ReducedFrame {
    let image = GrayImage::from_fn(w, h, |x, y| Luma([f(x as usize, y as usize)]));
    ReducedFrame::from_gray(image, (w, h))
}

pub fn gray(value: u8) -> ReducedFrame {
    reduced_from(W, H, |_, _| value)
}

/// Bands four rows tall, alternating black and white.
pub fn horizontal_stripes() -> ReducedFrame {
    reduced_from(W, H, |_, y| if (y / 4) % 2 == 0 { 0 } else { 255 })
}

/// Bands four columns wide, alternating black and white.
pub fn vertical_stripes() -> ReducedFrame {
    reduced_from(W, H, |x, _| if (x / 4) % 2 == 0 { 0 } else { 255 })
}

/// Top `fraction` of the rows white, the rest black.
pub fn row_fill(fraction: f64) -> ReducedFrame {
    let rows = (fraction * H as f64).round() as usize;
    reduced_from(W, H, |_, y| if y < rows { 255 } else { 0 })
}

/// Visually distinct slide contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Look {
    Horizontal,
    Vertical,
    Dark,
    Light,
}

impl Look {
    fn value(self, x: u32, y: u32) -> u8 {
        match self {
            Look::Horizontal => {
                if (y / 4) % 2 == 0 {
                    0
                } else {
                    255
                }
            }
            Look::Vertical => {
                if (x / 4) % 2 == 0 {
                    0
                } else {
                    255
                }
            }
            Look::Dark => 20,
            Look::Light => 235,
        }
    }

    pub fn image(self) -> RgbImage {
        RgbImage::from_fn(W, H, |x, y| {
            let v = self.value(x, y);
            Rgb([v, v, v])
        })
    }
}

pub fn sample(index: u64, fps: f64, look: Look) -> FrameSample {
    let ts = if fps > 0.0 { index as f64 / fps } else { 0.0 };
    FrameSample::new(index, ts, look.image())
}

/// Frames `0..looks.len()` with consecutive indices.
pub fn clip(fps: f64, looks: &[Look]) -> Vec<FrameSample> {
    looks
        .iter()
        .enumerate()
        .map(|(i, &look)| sample(i as u64, fps, look))
        .collect()
}

/// A white band 77 columns wide on black, shifted right by `step` columns per
/// sample and wrapping around the frame edge.
pub fn scrolling_band(index: u64, fps: f64, step: u32) -> FrameSample {
    let offset = (index as u32 * step) % W;
    let image = RgbImage::from_fn(W, H, |x, _| {
        let v = if (x + W - offset) % W < 77 { 255 } else { 0 };
        Rgb([v, v, v])
    });
    let ts = if fps > 0.0 { index as f64 / fps } else { 0.0 };
    FrameSample::new(index, ts, image)
}

/// A random clip built from runs of the same look, each between `min_run` and
/// `min_run + 11` samples long. With `min_run == 1` some changes settle and
/// some flicker.
pub fn random_clip(seed: u64, len: usize, fps: f64, min_run: usize) -> Vec<FrameSample> {
    const LOOKS: [Look; 4] = [Look::Horizontal, Look::Vertical, Look::Dark, Look::Light];
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut looks = Vec::with_capacity(len);
    while looks.len() < len {
        let look = LOOKS[rng.random_range(0..LOOKS.len())];
        let run = min_run + rng.random_range(0..12);
        looks.extend(std::iter::repeat(look).take(run));
    }
    looks.truncate(len);
    clip(fps, &looks)
}
