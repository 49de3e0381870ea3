use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use tracing::debug;

/// A decoded video frame picked by the sampling stride.
///
/// `index` is the position of the frame in the decoded stream (not the
/// sample number), so spacing between two samples is measured in decoded
/// frames regardless of the stride.
#[derive(Debug, Clone)]
pub struct FrameSample {
    pub index: u64,
    pub timestamp_secs: f64,
    pub image: RgbImage,
}

impl FrameSample {
    pub fn new(index: u64, timestamp_secs: f64, image: RgbImage) -> Self {
        Self {
            index,
            timestamp_secs,
            image,
        }
    }

    /// Build a sample from an interleaved pixel buffer.
    ///
    /// Decoders normally hand over packed RGB24. Gray8 and RGBA buffers of the
    /// right geometry are coerced to RGB instead of being rejected; any other
    /// byte count is a malformed frame.
    pub fn from_raw(
        index: u64,
        timestamp_secs: f64,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyFrame { index });
        }

        let pixels = width as usize * height as usize;
        let got = data.len();

        let image = if got == pixels * 3 {
            RgbImage::from_raw(width, height, data)
        } else if got == pixels * 4 {
            debug!(index, "coercing RGBA frame to RGB");
            RgbaImage::from_raw(width, height, data)
                .map(|rgba| DynamicImage::ImageRgba8(rgba).to_rgb8())
        } else if got == pixels {
            debug!(index, "coercing Gray8 frame to RGB");
            GrayImage::from_raw(width, height, data)
                .map(|gray| DynamicImage::ImageLuma8(gray).to_rgb8())
        } else {
            None
        };

        image
            .map(|image| Self::new(index, timestamp_secs, image))
            .ok_or(FrameError::BufferSize {
                index,
                width,
                height,
                got,
            })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Presentation time of a decoded frame. Unknown or zero fps maps every frame
/// to 0.0.
pub fn timestamp_for(index: u64, fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        index as f64 / fps
    } else {
        0.0
    }
}

/// A committed slide. Ownership passes to whoever consumes the deck.
#[derive(Debug, Clone)]
pub struct SlideRecord {
    pub sequence: u32,
    pub frame_index: u64,
    pub timestamp_secs: f64,
    pub image: RgbImage,
}

impl SlideRecord {
    pub fn from_sample(sequence: u32, sample: FrameSample) -> Self {
        Self {
            sequence,
            frame_index: sample.index,
            timestamp_secs: sample.timestamp_secs,
            image: sample.image,
        }
    }

    /// `HH:MM:SS.mmm` rendering of the timestamp.
    pub fn timecode(&self) -> String {
        let total_ms = (self.timestamp_secs.max(0.0) * 1000.0).round() as u64;
        let ms = total_ms % 1000;
        let secs = (total_ms / 1000) % 60;
        let mins = (total_ms / 60_000) % 60;
        let hours = total_ms / 3_600_000;
        format!("{hours:02}:{mins:02}:{secs:02}.{ms:03}")
    }

    /// File name used when the slide is written to disk. Padded to the full
    /// width of `u32`, so a plain name sort always matches deck order.
    pub fn file_name(&self) -> String {
        format!("slide{:010}.png", self.sequence)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame {index} has zero width or height")]
    EmptyFrame { index: u64 },
    #[error("frame {index}: {got} bytes do not fit {width}x{height} at 1, 3 or 4 channels")]
    BufferSize {
        index: u64,
        width: u32,
        height: u32,
        got: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_rgb() {
        let sample = FrameSample::from_raw(4, 0.5, 2, 2, vec![10; 12]).unwrap();
        assert_eq!(sample.index, 4);
        assert_eq!(sample.width(), 2);
        assert_eq!(sample.height(), 2);
        assert_eq!(sample.image.get_pixel(1, 1).0, [10, 10, 10]);
    }

    #[test]
    fn from_raw_coerces_rgba() {
        let data = [200u8, 100, 50, 255].repeat(6);
        let sample = FrameSample::from_raw(0, 0.0, 3, 2, data).unwrap();
        assert_eq!(sample.image.get_pixel(2, 1).0, [200, 100, 50]);
    }

    #[test]
    fn from_raw_coerces_gray() {
        let sample = FrameSample::from_raw(0, 0.0, 3, 2, vec![77; 6]).unwrap();
        assert_eq!(sample.image.get_pixel(0, 0).0, [77, 77, 77]);
    }

    #[test]
    fn from_raw_rejects_odd_sizes() {
        let err = FrameSample::from_raw(9, 0.0, 4, 4, vec![0; 20]).unwrap_err();
        assert!(matches!(err, FrameError::BufferSize { index: 9, got: 20, .. }));

        let err = FrameSample::from_raw(1, 0.0, 0, 4, vec![]).unwrap_err();
        assert!(matches!(err, FrameError::EmptyFrame { index: 1 }));
    }

    #[test]
    fn timestamps_from_fps() {
        assert_eq!(timestamp_for(0, 30.0), 0.0);
        assert!((timestamp_for(45, 30.0) - 1.5).abs() < 1e-9);
        assert_eq!(timestamp_for(45, 0.0), 0.0);
        assert_eq!(timestamp_for(45, f64::NAN), 0.0);
    }

    #[test]
    fn timecode_and_file_name() {
        let slide = SlideRecord {
            sequence: 3,
            frame_index: 112_233,
            timestamp_secs: 3_723.25,
            image: RgbImage::new(1, 1),
        };
        assert_eq!(slide.timecode(), "01:02:03.250");
        assert_eq!(slide.file_name(), "slide0000000003.png");
    }

    #[test]
    fn file_names_sort_in_deck_order() {
        let name = |sequence: u32| {
            SlideRecord {
                sequence,
                frame_index: u64::from(sequence) * 1_000_000,
                timestamp_secs: 0.0,
                image: RgbImage::new(1, 1),
            }
            .file_name()
        };
        let mut names: Vec<String> = [9, 10, 999_999, 1_000_000, u32::MAX]
            .into_iter()
            .map(name)
            .collect();
        let in_order = names.clone();
        names.sort();
        assert_eq!(names, in_order);
    }
}
