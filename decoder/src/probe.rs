use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use crate::source::SourceError;

/// Stream-level metadata for the first video stream of a file.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Frames per second; 0.0 when the container does not say.
    pub fps: f64,
    pub frame_count: Option<u64>,
}

impl StreamInfo {
    pub fn has_fps(&self) -> bool {
        self.fps.is_finite() && self.fps > 0.0
    }

    /// Bytes of one packed RGB24 frame.
    pub fn rgb_frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Run `ffprobe` against `path` and read the first video stream.
pub fn probe(ffprobe: &str, path: &Path) -> Result<StreamInfo, SourceError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames",
            "-print_format",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| SourceError::Spawn {
            program: ffprobe.to_string(),
            source: e,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SourceError::Probe {
            path: path.display().to_string(),
            reason: stderr.trim().to_string(),
        });
    }

    let info = parse_probe_output(&output.stdout).map_err(|reason| SourceError::Probe {
        path: path.display().to_string(),
        reason,
    })?;

    info!(
        path = %path.display(),
        width = info.width,
        height = info.height,
        fps = format!("{:.3}", info.fps),
        frame_count = ?info.frame_count,
        "probed video stream"
    );
    Ok(info)
}

pub fn parse_probe_output(json: &[u8]) -> Result<StreamInfo, String> {
    let report: ProbeReport =
        serde_json::from_slice(json).map_err(|e| format!("unreadable ffprobe report: {e}"))?;

    let stream = report
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        other => return Err(format!("video stream has no usable size: {other:?}")),
    };

    // avg_frame_rate is "0/0" for some containers; r_frame_rate is the fallback.
    let fps = [stream.avg_frame_rate, stream.r_frame_rate]
        .iter()
        .flatten()
        .map(|rate| parse_rate(rate))
        .find(|fps| *fps > 0.0)
        .unwrap_or(0.0);
    if fps == 0.0 {
        debug!("stream reports no frame rate");
    }

    let frame_count = stream.nb_frames.and_then(|n| n.parse::<u64>().ok());

    Ok(StreamInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

/// Parse an ffprobe rational such as `30000/1001` or a plain number.
/// Anything unusable yields 0.0.
pub fn parse_rate(rate: &str) -> f64 {
    let value = match rate.split_once('/') {
        Some((num, den)) => match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
            (Ok(n), Ok(d)) if d != 0.0 => n / d,
            _ => 0.0,
        },
        None => rate.trim().parse::<f64>().unwrap_or(0.0),
    };
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates() {
        assert!((parse_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("25/1"), 25.0);
        assert_eq!(parse_rate("24"), 24.0);
        assert_eq!(parse_rate("0/0"), 0.0);
        assert_eq!(parse_rate("abc"), 0.0);
        assert_eq!(parse_rate("-5/1"), 0.0);
    }

    #[test]
    fn parses_report() {
        let json = br#"{
            "programs": [],
            "streams": [
                {
                    "width": 1280,
                    "height": 720,
                    "r_frame_rate": "30/1",
                    "avg_frame_rate": "30/1",
                    "nb_frames": "9000"
                }
            ]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(
            info,
            StreamInfo {
                width: 1280,
                height: 720,
                fps: 30.0,
                frame_count: Some(9000),
            }
        );
        assert_eq!(info.rgb_frame_len(), 1280 * 720 * 3);
    }

    #[test]
    fn falls_back_to_r_frame_rate() {
        let json = br#"{"streams":[{"width":640,"height":360,"avg_frame_rate":"0/0","r_frame_rate":"15/1"}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.fps, 15.0);
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn unknown_rate_is_zero() {
        let json = br#"{"streams":[{"width":640,"height":360,"avg_frame_rate":"0/0","r_frame_rate":"0/0"}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert!(!info.has_fps());
    }

    #[test]
    fn no_video_stream() {
        let err = parse_probe_output(br#"{"streams":[]}"#).unwrap_err();
        assert!(err.contains("no video stream"));
        assert!(parse_probe_output(b"not json").is_err());
    }

    #[test]
    fn missing_ffprobe_binary() {
        let err = probe("/nonexistent/ffprobe-binary", Path::new("video.mp4")).unwrap_err();
        assert!(matches!(err, SourceError::Spawn { .. }));
        assert!(err.is_fatal());
    }
}
