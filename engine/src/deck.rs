use std::path::{Path, PathBuf};

use image::ImageFormat;
use slide_deck_common::frame::SlideRecord;
use tracing::{debug, info};

use crate::runner::SelectionRun;

pub const MANIFEST_FILE: &str = "slides.json";

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write slide {path}: {source}")]
    Image {
        path: String,
        source: image::ImageError,
    },
    #[error("failed to encode manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Receives the finished deck, slide by slide, in sequence order.
///
/// Whatever composes the final document (PDF, HTML, a slideshow) sits behind
/// this trait.
pub trait SlideSink {
    fn accept(&mut self, slide: &SlideRecord) -> Result<(), SinkError>;

    /// Called once after the last slide.
    fn finish(&mut self, run: &SelectionRun) -> Result<(), SinkError>;
}

/// Hand every slide of `run` to `sink`. Returns the number of slides written.
pub fn write_deck(sink: &mut dyn SlideSink, run: &SelectionRun) -> Result<usize, SinkError> {
    for slide in &run.slides {
        sink.accept(slide)?;
    }
    sink.finish(run)?;
    Ok(run.slides.len())
}

/// Writes `slideNNNNNNNNNN.png` per slide plus an optional `slides.json` manifest.
pub struct DirectorySink {
    dir: PathBuf,
    manifest: bool,
    source: Option<String>,
    entries: Vec<serde_json::Value>,
}

impl DirectorySink {
    pub fn create(dir: &Path, manifest: bool) -> Result<Self, SinkError> {
        std::fs::create_dir_all(dir).map_err(|e| SinkError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        debug!(dir = %dir.display(), "output directory ready");
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
            source: None,
            entries: Vec::new(),
        })
    }

    /// Record the input video in the manifest.
    pub fn with_source(mut self, source: &Path) -> Self {
        self.source = Some(source.display().to_string());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SlideSink for DirectorySink {
    fn accept(&mut self, slide: &SlideRecord) -> Result<(), SinkError> {
        let file = slide.file_name();
        let path = self.dir.join(&file);
        slide
            .image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| SinkError::Image {
                path: path.display().to_string(),
                source: e,
            })?;
        debug!(sequence = slide.sequence, path = %path.display(), "slide written");

        self.entries.push(serde_json::json!({
            "sequence": slide.sequence,
            "frame_index": slide.frame_index,
            "timestamp_secs": slide.timestamp_secs,
            "timecode": slide.timecode(),
            "file": file,
        }));
        Ok(())
    }

    fn finish(&mut self, run: &SelectionRun) -> Result<(), SinkError> {
        if !self.manifest {
            return Ok(());
        }
        let json = serde_json::json!({
            "source": self.source,
            "generated_at": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "completion": run.completion,
            "stats": run.stats,
            "slides": self.entries,
        });
        let path = self.dir.join(MANIFEST_FILE);
        std::fs::write(&path, serde_json::to_vec_pretty(&json)?).map_err(|e| SinkError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        info!(path = %path.display(), slides = self.entries.len(), "manifest written");
        Ok(())
    }
}
