//! ReelSync Core Type Definitions
//!
//! Fundamental types shared across components.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Identifier assigned to a video by the remote catalog
pub type RemoteId = String;

/// Filesystem-safe name of a video inside the upload directory
pub type LocalName = String;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

// =============================================================================
// Indexing Status
// =============================================================================

/// Remote processing state meaning the video is ready for selection
pub const INDEXED_STATUS: &str = "indexed";

/// Status reported when the remote catalog omits one
pub const UNKNOWN_STATUS: &str = "unknown";

/// Status recorded right after a successful upload
pub const INDEXING_STATUS: &str = "indexing";

/// Returns true if the given indexing status is `indexed`
pub fn is_indexed(status: Option<&str>) -> bool {
    status == Some(INDEXED_STATUS)
}

// =============================================================================
// Video Files
// =============================================================================

/// File extensions recognized as videos in the upload directory
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv"];

/// Returns true if the file name carries a recognized video extension
pub fn is_video_file(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

// =============================================================================
// Video Probe
// =============================================================================

/// Basic properties of a video file as reported by a probe
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoProbe {
    /// Frames per second (0 when unreadable)
    pub fps: f64,
    /// Total number of frames
    pub total_frames: u64,
    /// Duration in seconds, derived from frame count and frame rate
    pub duration_sec: TimeSec,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl VideoProbe {
    /// Creates a probe result, deriving the duration
    pub fn new(fps: f64, total_frames: u64, width: u32, height: u32) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 0.0 };
        Self {
            fps,
            total_frames,
            duration_sec: Self::duration_for(total_frames, fps),
            width,
            height,
        }
    }

    /// Duration of `total_frames` at `fps`; zero when the frame rate is unusable
    pub fn duration_for(total_frames: u64, fps: f64) -> TimeSec {
        if fps.is_finite() && fps > 0.0 {
            total_frames as f64 / fps
        } else {
            0.0
        }
    }

    /// Timestamp of a frame index; zero when the frame rate is unusable
    pub fn timestamp_of(&self, frame_index: u64) -> TimeSec {
        Self::duration_for(frame_index, self.fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_indexed() {
        assert!(is_indexed(Some("indexed")));
        assert!(!is_indexed(Some("indexing")));
        assert!(!is_indexed(None));
    }

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file("clip.mp4"));
        assert!(is_video_file("CLIP.MOV"));
        assert!(is_video_file("a.b.webm"));
        assert!(!is_video_file("notes.txt"));
        assert!(!is_video_file("mp4"));
        assert!(!is_video_file(".mp4"));
    }

    #[test]
    fn test_probe_duration() {
        let probe = VideoProbe::new(30.0, 300, 640, 360);
        assert_eq!(probe.duration_sec, 10.0);
        assert_eq!(probe.timestamp_of(15), 0.5);
    }

    #[test]
    fn test_probe_zero_fps_is_sentinel() {
        let probe = VideoProbe::new(0.0, 300, 640, 360);
        assert_eq!(probe.fps, 0.0);
        assert_eq!(probe.duration_sec, 0.0);
        assert_eq!(probe.timestamp_of(150), 0.0);

        let probe = VideoProbe::new(f64::NAN, 10, 1, 1);
        assert_eq!(probe.duration_sec, 0.0);
    }
}
