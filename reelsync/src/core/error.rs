//! ReelSync Error Definitions
//!
//! Defines the error type shared by every core component.

use thiserror::Error;

use super::ffmpeg::FFmpegError;
use super::remote::RemoteError;
use super::sync::{DuplicateConflict, SyncError};

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Input Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(String),

    // =========================================================================
    // Resource Errors
    // =========================================================================
    #[error("Video file not found: {0}")]
    VideoNotFound(String),

    #[error("Remote video not found: {0}")]
    RemoteVideoNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Frame not found: {0}")]
    FrameNotFound(String),

    // =========================================================================
    // Decode Errors
    // =========================================================================
    #[error("Unable to open video file: {0}")]
    VideoOpen(String),

    #[error("FFmpeg error: {0}")]
    FFmpeg(#[from] FFmpegError),

    // =========================================================================
    // External Dependency Errors
    // =========================================================================
    #[error("Remote catalog error: {0}")]
    Remote(#[from] RemoteError),

    // =========================================================================
    // Conflict and Storage Errors
    // =========================================================================
    #[error("{}", .0.message())]
    Conflict(DuplicateConflict),

    #[error("Sync store error: {0}")]
    Storage(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl From<SyncError> for CoreError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::Duplicate(conflict) => CoreError::Conflict(conflict),
            SyncError::Storage(message) => CoreError::Storage(message),
        }
    }
}

impl CoreError {
    /// True for input that was rejected before any I/O happened
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }

    /// True when a named resource (file, job, frame, remote video) is missing
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::VideoNotFound(_)
                | CoreError::RemoteVideoNotFound(_)
                | CoreError::JobNotFound(_)
                | CoreError::FrameNotFound(_)
                | CoreError::Remote(RemoteError::NotFound(_))
        )
    }

    /// True for duplicate-key conflicts against the sync store
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }
}
