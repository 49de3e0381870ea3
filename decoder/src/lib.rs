//! Frame sources feeding the slide selector.
//!
//! The selector only sees [`FrameSource`]; decoding itself is delegated to
//! the `ffmpeg`/`ffprobe` executables or done by the caller ([`MemorySource`]).

pub mod ffmpeg;
pub mod probe;
pub mod source;

pub use ffmpeg::FfmpegSource;
pub use probe::StreamInfo;
pub use source::{FrameSource, MemorySource, Sampled, SourceError};
