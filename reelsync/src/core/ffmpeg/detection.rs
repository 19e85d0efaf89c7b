//! FFmpeg Detection Module
//!
//! Resolves and validates the FFmpeg/FFprobe binaries.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use super::{FFmpegError, FFmpegResult};
use crate::core::settings::FFmpegSettings;

#[cfg(target_os = "windows")]
const FFMPEG_BINARY: &str = "ffmpeg.exe";
#[cfg(not(target_os = "windows"))]
const FFMPEG_BINARY: &str = "ffmpeg";

#[cfg(target_os = "windows")]
const FFPROBE_BINARY: &str = "ffprobe.exe";
#[cfg(not(target_os = "windows"))]
const FFPROBE_BINARY: &str = "ffprobe";

/// Resolved FFmpeg installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_path: PathBuf,
}

impl Default for FFmpegInfo {
    /// Bare binary names, resolved through `PATH` at spawn time
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from(FFMPEG_BINARY),
            ffprobe_path: PathBuf::from(FFPROBE_BINARY),
        }
    }
}

impl FFmpegInfo {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Resolves binaries, preferring explicitly configured paths
    ///
    /// Unconfigured binaries are looked up in common install directories and
    /// fall back to the bare name.
    pub fn resolve(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Self {
        Self {
            ffmpeg_path: ffmpeg
                .map(Path::to_path_buf)
                .unwrap_or_else(|| find_in_common_paths(FFMPEG_BINARY)),
            ffprobe_path: ffprobe
                .map(Path::to_path_buf)
                .unwrap_or_else(|| find_in_common_paths(FFPROBE_BINARY)),
        }
    }

    /// Resolves binaries from the `ffmpeg` settings section
    pub fn from_settings(settings: &FFmpegSettings) -> Self {
        Self::resolve(
            settings.ffmpeg_path.as_deref(),
            settings.ffprobe_path.as_deref(),
        )
    }

    /// Returns the FFmpeg version string, failing if the binary cannot run
    pub fn version(&self) -> FFmpegResult<String> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => FFmpegError::NotFound,
                _ => FFmpegError::ProcessError(e),
            })?;

        if !output.status.success() {
            return Err(FFmpegError::ExecutionFailed(
                "Failed to get FFmpeg version".to_string(),
            ));
        }

        parse_version(&String::from_utf8_lossy(&output.stdout))
    }

    /// Validate that both binaries are functional
    pub fn validate(&self) -> FFmpegResult<()> {
        for (name, path) in [("FFmpeg", &self.ffmpeg_path), ("FFprobe", &self.ffprobe_path)] {
            let output = Command::new(path)
                .arg("-version")
                .output()
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => FFmpegError::NotFound,
                    _ => FFmpegError::ProcessError(e),
                })?;

            if !output.status.success() {
                return Err(FFmpegError::ExecutionFailed(format!(
                    "{} binary is not functional",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Whether the resolved binaries can run, as reported by `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FFmpegStatus {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub available: bool,
    pub version: Option<String>,
    pub error: Option<String>,
}

impl FFmpegInfo {
    /// Runs both binaries and reports the FFmpeg version or the failure
    pub fn status(&self) -> FFmpegStatus {
        let result = self.validate().and_then(|()| self.version());
        if let Err(e) = &result {
            tracing::warn!(ffmpeg = %self.ffmpeg_path.display(), error = %e, "FFmpeg unavailable");
        }

        FFmpegStatus {
            ffmpeg_path: self.ffmpeg_path.clone(),
            ffprobe_path: self.ffprobe_path.clone(),
            available: result.is_ok(),
            version: result.as_ref().ok().cloned(),
            error: result.err().map(|e| e.to_string()),
        }
    }
}

fn find_in_common_paths(binary: &str) -> PathBuf {
    get_common_ffmpeg_paths()
        .into_iter()
        .map(|dir| dir.join(binary))
        .find(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from(binary))
}

/// Get common FFmpeg installation paths for the current platform
fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));
        if let Ok(programdata) = std::env::var("ProgramData") {
            paths.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
    }

    paths
}

/// Parses the first line of `ffmpeg -version`: "ffmpeg version X.X.X ..."
fn parse_version(output: &str) -> FFmpegResult<String> {
    let first_line = output
        .lines()
        .next()
        .ok_or_else(|| FFmpegError::ParseError("Could not parse FFmpeg version".to_string()))?;

    Ok(first_line
        .strip_prefix("ffmpeg version ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or(first_line)
        .to_string())
}
