use image::imageops::{self, FilterType};
use image::GrayImage;
use slide_deck_common::frame::FrameSample;

/// Small single-channel copy of a frame, used only for comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedFrame {
    image: GrayImage,
}

impl ReducedFrame {
    /// Luma conversion followed by a bilinear resize to `size`.
    pub fn from_sample(sample: &FrameSample, size: (u32, u32)) -> Self {
        let gray = imageops::grayscale(&sample.image);
        Self::from_gray(gray, size)
    }

    pub fn from_gray(gray: GrayImage, (width, height): (u32, u32)) -> Self {
        let image = if gray.dimensions() == (width, height) {
            gray
        } else {
            imageops::resize(&gray, width, height, FilterType::Triangle)
        };
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Row-major intensities.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn reduces_to_requested_size() {
        let sample = FrameSample::new(0, 0.0, RgbImage::from_pixel(640, 360, Rgb([255, 0, 0])));
        let reduced = ReducedFrame::from_sample(&sample, (128, 72));
        assert_eq!(reduced.dimensions(), (128, 72));
        assert_eq!(reduced.pixels().len(), 128 * 72);
        // Rec.709 luma of pure red
        let luma = reduced.pixels()[0];
        assert!((52..=56).contains(&luma), "luma {luma}");
    }

    #[test]
    fn matching_size_is_not_resampled() {
        let mut gray = GrayImage::new(4, 2);
        gray.put_pixel(3, 1, image::Luma([200]));
        let reduced = ReducedFrame::from_gray(gray.clone(), (4, 2));
        assert_eq!(reduced.pixels(), gray.as_raw().as_slice());
    }

    #[test]
    fn upsamples_tiny_frames() {
        let sample = FrameSample::new(0, 0.0, RgbImage::from_pixel(8, 8, Rgb([10, 10, 10])));
        let reduced = ReducedFrame::from_sample(&sample, (128, 72));
        assert_eq!(reduced.dimensions(), (128, 72));
        assert!(reduced.pixels().iter().all(|&p| p == 10));
    }
}
