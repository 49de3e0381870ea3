use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// External decoder executables.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    /// Evaluate every Nth decoded frame.
    #[serde(default = "default_sample_stride")]
    pub sample_stride: u32,
    /// Dissimilarity at or above which a scene counts as changing.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_min_separation_secs")]
    pub min_separation_secs: f64,
    #[serde(default = "default_downsample_width")]
    pub downsample_width: u32,
    #[serde(default = "default_downsample_height")]
    pub downsample_height: u32,
    #[serde(default)]
    pub metric: MetricKind,
    /// Per-pixel intensity delta counted by the `pixel_diff` metric.
    #[serde(default = "default_pixel_delta")]
    pub pixel_delta: u8,
    #[serde(default)]
    pub reference_mode: ReferenceMode,
    /// Dissimilarity between consecutive samples below which a transition
    /// counts as settled. Independent of `similarity_threshold`, so raising
    /// that threshold never changes which samples settle.
    #[serde(default = "default_settle_threshold")]
    pub settle_threshold: f64,
    /// Consecutive settled samples required before a candidate is committed.
    #[serde(default = "default_settle_samples")]
    pub settle_samples: u32,
    /// Minimum spacing in decoded frames when the stream has no usable fps.
    #[serde(default = "default_fallback_min_separation_frames")]
    pub fallback_min_separation_frames: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[default]
    Ssim,
    PixelDiff,
    Histogram,
}

/// What happens to the reference frame while the scene is stable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMode {
    /// Keep the frame that opened the stable period, so slow drift still
    /// accumulates into a change.
    #[default]
    Anchored,
    /// Advance the reference to every frame that scored as similar.
    Follow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Overlap decoding of frame i+1 with scoring of frame i.
    #[serde(default = "default_prefetch")]
    pub prefetch: bool,
    /// Wall-clock budget for a run; committed slides are kept when it expires.
    #[serde(default)]
    pub deadline_secs: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_manifest")]
    pub manifest: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            sample_stride: default_sample_stride(),
            similarity_threshold: default_similarity_threshold(),
            min_separation_secs: default_min_separation_secs(),
            downsample_width: default_downsample_width(),
            downsample_height: default_downsample_height(),
            metric: MetricKind::default(),
            pixel_delta: default_pixel_delta(),
            reference_mode: ReferenceMode::default(),
            settle_threshold: default_settle_threshold(),
            settle_samples: default_settle_samples(),
            fallback_min_separation_frames: default_fallback_min_separation_frames(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prefetch: default_prefetch(),
            deadline_secs: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            manifest: default_manifest(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SelectionConfig {
    pub fn downsample_size(&self) -> (u32, u32) {
        (self.downsample_width, self.downsample_height)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_stride == 0 {
            return Err(ConfigError::Invalid("selection.sample_stride must be >= 1".into()));
        }
        check_unit("selection.similarity_threshold", self.similarity_threshold)?;
        check_unit("selection.settle_threshold", self.settle_threshold)?;
        if !self.min_separation_secs.is_finite() || self.min_separation_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "selection.min_separation_secs must be a non-negative number, got {}",
                self.min_separation_secs
            )));
        }
        if self.downsample_width == 0 || self.downsample_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "selection.downsample size must be non-zero, got {}x{}",
                self.downsample_width, self.downsample_height
            )));
        }
        if self.settle_samples == 0 {
            return Err(ConfigError::Invalid("selection.settle_samples must be >= 1".into()));
        }
        Ok(())
    }
}

fn check_unit(key: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{key} must be within [0, 1], got {value}")))
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.selection.validate()?;
        if let Some(deadline) = self.pipeline.deadline_secs {
            if !deadline.is_finite() || deadline <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "pipeline.deadline_secs must be positive, got {deadline}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_ffmpeg() -> String {
    "ffmpeg".into()
}
fn default_ffprobe() -> String {
    "ffprobe".into()
}
fn default_sample_stride() -> u32 {
    3
}
fn default_similarity_threshold() -> f64 {
    0.20
}
fn default_min_separation_secs() -> f64 {
    1.0
}
fn default_downsample_width() -> u32 {
    128
}
fn default_downsample_height() -> u32 {
    72
}
fn default_pixel_delta() -> u8 {
    30
}
fn default_settle_threshold() -> f64 {
    0.10
}
fn default_settle_samples() -> u32 {
    1
}
fn default_fallback_min_separation_frames() -> u64 {
    30
}
fn default_prefetch() -> bool {
    true
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("slides")
}
fn default_manifest() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}
