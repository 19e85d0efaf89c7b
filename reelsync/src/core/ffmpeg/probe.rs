//! FFprobe Media Probe
//!
//! Reads frame rate, frame count and dimensions of the first video stream.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use super::{FFmpegError, FFmpegInfo, FFmpegResult};
use crate::core::inventory::MediaProber;
use crate::core::{CoreResult, VideoProbe};

// =============================================================================
// FFprobe JSON Structures
// =============================================================================

#[derive(Debug, Deserialize)]
struct FFprobeOutput {
    streams: Option<Vec<FFprobeStream>>,
    format: Option<FFprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FFprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    side_data_list: Vec<FFprobeSideData>,
    tags: Option<FFprobeTags>,
}

#[derive(Debug, Deserialize)]
struct FFprobeSideData {
    rotation: Option<f64>,
}

/// Older muxers record rotation as a `rotate` tag instead of side data
#[derive(Debug, Deserialize)]
struct FFprobeTags {
    rotate: Option<String>,
}

impl FFprobeStream {
    /// Display rotation in degrees, normalized to [0, 360)
    fn rotation(&self) -> i64 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse::<f64>().ok())
            })
            .filter(|r| r.is_finite())
            .unwrap_or(0.0);

        (degrees.round() as i64).rem_euclid(360)
    }
}

#[derive(Debug, Deserialize)]
struct FFprobeFormat {
    duration: Option<String>,
}

// =============================================================================
// Prober
// =============================================================================

/// [`MediaProber`] backed by the `ffprobe` binary
#[derive(Debug, Clone, Default)]
pub struct FfprobeProber {
    info: FFmpegInfo,
}

impl FfprobeProber {
    pub fn new(info: FFmpegInfo) -> Self {
        Self { info }
    }

    /// Runs ffprobe, keeping the FFmpeg-level error
    pub(crate) fn run(&self, path: &Path) -> FFmpegResult<VideoProbe> {
        if !path.is_file() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                path.display()
            )));
        }

        let output = Command::new(&self.info.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => FFmpegError::NotFound,
                _ => FFmpegError::ProcessError(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ProbeError(format!("FFprobe failed: {}", stderr)));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }
}

impl MediaProber for FfprobeProber {
    fn probe(&self, path: &Path) -> CoreResult<VideoProbe> {
        self.run(path).map_err(Into::into)
    }
}

/// Parse FFprobe JSON output into a [`VideoProbe`]
///
/// The frame count comes from `nb_frames` when the container records it and
/// is estimated from duration × fps otherwise.
pub fn parse_probe_output(json_str: &str) -> FFmpegResult<VideoProbe> {
    let output: FFprobeOutput = serde_json::from_str(json_str)
        .map_err(|e| FFmpegError::ParseError(format!("Failed to parse FFprobe output: {}", e)))?;

    let stream = output
        .streams
        .unwrap_or_default()
        .into_iter()
        .find(|s| s.codec_type.as_deref().unwrap_or("video") == "video")
        .ok_or_else(|| FFmpegError::ProbeError("No video stream found".to_string()))?;

    let fps = [&stream.r_frame_rate, &stream.avg_frame_rate]
        .into_iter()
        .filter_map(|rate| rate.as_deref().and_then(parse_frame_rate))
        .find(|fps| *fps > 0.0)
        .unwrap_or(0.0);

    let total_frames = match stream.nb_frames.as_deref().and_then(|n| n.parse::<u64>().ok()) {
        Some(n) if n > 0 => n,
        _ => {
            let duration = stream
                .duration
                .as_deref()
                .or(output.format.as_ref().and_then(|f| f.duration.as_deref()))
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0);
            if duration.is_finite() && duration > 0.0 {
                (duration * fps).round() as u64
            } else {
                0
            }
        }
    };

    // ffmpeg applies the display rotation when decoding, so quarter turns swap the frame size
    let (width, height) = (stream.width.unwrap_or(0), stream.height.unwrap_or(0));
    let (width, height) = match stream.rotation() {
        90 | 270 => (height, width),
        _ => (width, height),
    };

    Ok(VideoProbe::new(fps, total_frames, width, height))
}

/// Parse a frame rate such as `"30/1"`, `"30000/1001"` or `"25"`
///
/// Returns `None` for malformed input or a zero denominator.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_parse_probe_with_frame_count() {
        let json = r#"{
            "streams": [{
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "30/1",
                "avg_frame_rate": "30/1",
                "nb_frames": "300"
            }],
            "format": {"duration": "10.000000"}
        }"#;

        let probe = parse_probe_output(json).unwrap();
        assert_eq!(probe.fps, 30.0);
        assert_eq!(probe.total_frames, 300);
        assert_eq!(probe.duration_sec, 10.0);
        assert_eq!((probe.width, probe.height), (1920, 1080));
    }

    #[test]
    fn test_parse_probe_swaps_size_for_quarter_turns() {
        let portrait = r#"{
            "streams": [{
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "30/1",
                "nb_frames": "300",
                "side_data_list": [
                    {"side_data_type": "Display Matrix", "displaymatrix": "...", "rotation": -90}
                ]
            }]
        }"#;
        let probe = parse_probe_output(portrait).unwrap();
        assert_eq!((probe.width, probe.height), (1080, 1920));

        let tagged = r#"{"streams": [{"width": 1280, "height": 720, "r_frame_rate": "25/1",
            "nb_frames": "10", "tags": {"rotate": "90"}}]}"#;
        let probe = parse_probe_output(tagged).unwrap();
        assert_eq!((probe.width, probe.height), (720, 1280));

        let upside_down = r#"{"streams": [{"width": 1280, "height": 720, "r_frame_rate": "25/1",
            "nb_frames": "10", "side_data_list": [{"rotation": 180}]}]}"#;
        let probe = parse_probe_output(upside_down).unwrap();
        assert_eq!((probe.width, probe.height), (1280, 720));
    }

    #[test]
    fn test_parse_probe_estimates_frame_count() {
        // webm/mkv streams usually lack nb_frames
        let json = r#"{
            "streams": [{
                "codec_type": "video",
                "width": 640,
                "height": 360,
                "r_frame_rate": "0/0",
                "avg_frame_rate": "25/1"
            }],
            "format": {"duration": "4.0"}
        }"#;

        let probe = parse_probe_output(json).unwrap();
        assert_eq!(probe.fps, 25.0);
        assert_eq!(probe.total_frames, 100);
    }

    #[test]
    fn test_parse_probe_without_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(FFmpegError::ProbeError(_))
        ));
    }

    #[test]
    fn test_parse_probe_invalid_json() {
        assert!(matches!(
            parse_probe_output("not json"),
            Err(FFmpegError::ParseError(_))
        ));
    }

    #[test]
    fn test_probe_missing_file() {
        let prober = FfprobeProber::default();
        let err = prober.run(Path::new("/nonexistent/video.mp4")).unwrap_err();
        assert!(matches!(err, FFmpegError::InvalidInput(_)));
        assert!(prober.probe(Path::new("/nonexistent/video.mp4")).is_err());
    }
}
