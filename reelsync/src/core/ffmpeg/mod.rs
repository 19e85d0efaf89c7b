//! FFmpeg Integration Module
//!
//! Wraps the `ffmpeg` and `ffprobe` binaries:
//! - Binary discovery and validation
//! - Media probing (frame rate, frame count, dimensions)
//! - Raw RGB frame decoding for keyframe extraction
//!
//! Binaries are taken from settings when configured, otherwise discovered
//! in common install locations and finally on `PATH`.

mod decoder;
mod detection;
mod probe;

pub use decoder::{FfmpegDecoder, FfmpegVideo};
pub use detection::*;
pub use probe::{parse_frame_rate, parse_probe_output, FfprobeProber};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg or set its path in settings.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_error_display() {
        let err = FFmpegError::NotFound;
        assert!(err.to_string().contains("FFmpeg not found"));

        let err = FFmpegError::ProbeError("no video stream".to_string());
        assert!(err.to_string().contains("no video stream"));
    }
}
