//! FFmpeg Frame Decoder
//!
//! Decodes video frames to raw RGB24 through an `ffmpeg` child process.
//! Sequential reads share one long-lived process; random access spawns a
//! short seek-and-grab process per frame.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use image::RgbImage;

use super::{FFmpegError, FFmpegInfo, FfprobeProber};
use crate::core::frames::{DecodedVideo, VideoDecoder};
use crate::core::{CoreError, CoreResult, VideoProbe};

// =============================================================================
// Decoder
// =============================================================================

/// [`VideoDecoder`] backed by the FFmpeg binaries
#[derive(Debug, Clone, Default)]
pub struct FfmpegDecoder {
    info: FFmpegInfo,
}

impl FfmpegDecoder {
    pub fn new(info: FFmpegInfo) -> Self {
        Self { info }
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn open(&self, path: &Path) -> CoreResult<Box<dyn DecodedVideo>> {
        let probe = FfprobeProber::new(self.info.clone())
            .run(path)
            .map_err(|e| match e {
                FFmpegError::NotFound => CoreError::FFmpeg(e),
                other => CoreError::VideoOpen(format!("{}: {}", path.display(), other)),
            })?;

        if probe.width == 0 || probe.height == 0 {
            return Err(CoreError::VideoOpen(format!(
                "{}: stream has no decodable frames",
                path.display()
            )));
        }

        Ok(Box::new(FfmpegVideo {
            ffmpeg_path: self.info.ffmpeg_path.clone(),
            path: path.to_path_buf(),
            probe,
            stream: None,
            exhausted: false,
        }))
    }
}

// =============================================================================
// Open Video
// =============================================================================

/// An opened video; owns the sequential decode process, if started
pub struct FfmpegVideo {
    ffmpeg_path: PathBuf,
    path: PathBuf,
    probe: VideoProbe,
    stream: Option<FrameStream>,
    exhausted: bool,
}

struct FrameStream {
    child: Child,
    stdout: ChildStdout,
    /// Drains stderr so ffmpeg never blocks on it
    stderr: Option<JoinHandle<String>>,
}

impl FrameStream {
    /// Reaps ffmpeg after its output ended; a non-zero exit means the decode was cut short
    fn finish(mut self) -> CoreResult<()> {
        let status = self.child.wait().map_err(FFmpegError::ProcessError)?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            return Ok(());
        }
        Err(FFmpegError::ExecutionFailed(format!(
            "Decoding stopped early ({}): {}",
            status,
            stderr.trim()
        ))
        .into())
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        // Early stop leaves ffmpeg blocked on a full pipe
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl FfmpegVideo {
    fn frame_len(&self) -> usize {
        self.probe.width as usize * self.probe.height as usize * 3
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(["-v", "error", "-nostdin"]);
        cmd
    }

    fn spawn_stream(&self) -> CoreResult<FrameStream> {
        let mut child = self
            .base_command()
            .arg("-i")
            .arg(&self.path)
            .args([
                "-an",
                "-sn",
                "-vsync",
                "passthrough",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(FFmpegError::ProcessError)?;

        let stdout = child.stdout.take().ok_or_else(|| {
            CoreError::Internal("FFmpeg decode process has no stdout".to_string())
        })?;

        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        Ok(FrameStream {
            child,
            stdout,
            stderr,
        })
    }

    fn to_image(&self, buf: Vec<u8>) -> CoreResult<RgbImage> {
        RgbImage::from_raw(self.probe.width, self.probe.height, buf).ok_or_else(|| {
            CoreError::Internal("Decoded frame does not match stream dimensions".to_string())
        })
    }
}

impl DecodedVideo for FfmpegVideo {
    fn info(&self) -> &VideoProbe {
        &self.probe
    }

    fn next_frame(&mut self) -> CoreResult<Option<RgbImage>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.stream.is_none() {
            self.stream = Some(self.spawn_stream()?);
        }

        let mut buf = vec![0u8; self.frame_len()];
        let read = match self.stream.as_mut() {
            Some(stream) => stream.stdout.read_exact(&mut buf),
            None => return Ok(None),
        };

        match read {
            Ok(()) => self.to_image(buf).map(Some),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.exhausted = true;
                if let Some(stream) = self.stream.take() {
                    stream.finish()?;
                }
                Ok(None)
            }
            Err(e) => Err(CoreError::IoError(e)),
        }
    }

    fn frame_at(&mut self, index: u64) -> CoreResult<Option<RgbImage>> {
        if index >= self.probe.total_frames || self.probe.fps <= 0.0 {
            return Ok(None);
        }

        let seek = format!("{:.6}", index as f64 / self.probe.fps);
        let output = self
            .base_command()
            .args(["-ss", &seek, "-i"])
            .arg(&self.path)
            .args([
                "-an",
                "-sn",
                "-frames:v",
                "1",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-",
            ])
            .stdin(Stdio::null())
            .output()
            .map_err(FFmpegError::ProcessError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ExecutionFailed(format!(
                "Frame {} grab failed: {}",
                index,
                stderr.trim()
            ))
            .into());
        }

        let frame_len = self.frame_len();
        if output.stdout.len() < frame_len {
            return Ok(None);
        }

        let mut buf = output.stdout;
        buf.truncate(frame_len);
        self.to_image(buf).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_is_video_open_error() {
        let decoder = FfmpegDecoder::default();
        let err = decoder
            .open(Path::new("/nonexistent/clip.mp4"))
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::VideoOpen(_)));
    }

    #[test]
    fn test_frame_at_out_of_range_without_spawning() {
        let mut video = FfmpegVideo {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            path: PathBuf::from("clip.mp4"),
            probe: VideoProbe::new(30.0, 10, 4, 4),
            stream: None,
            exhausted: false,
        };
        assert!(video.frame_at(10).unwrap().is_none());
        assert!(video.frame_at(u64::MAX).unwrap().is_none());
        assert_eq!(video.frame_len(), 48);
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// ffmpeg stand-in that emits `frames` black 4x4 frames and exits with `code`
    #[cfg(unix)]
    fn scripted_video(dir: &Path, frames: usize, code: i32) -> FfmpegVideo {
        let ffmpeg = write_script(
            dir,
            "ffmpeg",
            &format!(
                "head -c {} /dev/zero\necho 'Invalid data found when processing input' >&2\nexit {}",
                frames * 48,
                code
            ),
        );
        FfmpegVideo {
            ffmpeg_path: ffmpeg,
            path: dir.join("clip.mp4"),
            probe: VideoProbe::new(30.0, 300, 4, 4),
            stream: None,
            exhausted: false,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_next_frame_clean_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut video = scripted_video(dir.path(), 3, 0);

        for _ in 0..3 {
            let frame = video.next_frame().unwrap().unwrap();
            assert_eq!(frame.dimensions(), (4, 4));
        }
        assert!(video.next_frame().unwrap().is_none());
        assert!(video.next_frame().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_next_frame_reports_decoder_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut video = scripted_video(dir.path(), 3, 1);

        for _ in 0..3 {
            assert!(video.next_frame().unwrap().is_some());
        }
        let err = video.next_frame().unwrap_err();
        match err {
            CoreError::FFmpeg(FFmpegError::ExecutionFailed(message)) => {
                assert!(message.contains("Invalid data found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_scene_extraction_fails_when_decoder_dies() {
        use crate::core::frames::{SceneExtractor, SceneOptions, KEYFRAMES_MANIFEST};

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"stub").unwrap();
        let ffprobe = write_script(
            dir.path(),
            "ffprobe",
            r#"echo '{"streams": [{"codec_type": "video", "width": 4, "height": 4, "r_frame_rate": "30/1", "nb_frames": "300"}]}'"#,
        );
        let ffmpeg = scripted_video(dir.path(), 40, 1).ffmpeg_path;
        let decoder = FfmpegDecoder::new(FFmpegInfo::new(ffmpeg, ffprobe));
        let out = dir.path().join("frames");

        let err = SceneExtractor::new(&decoder)
            .extract(&video, &out, &SceneOptions::default())
            .unwrap_err();

        assert!(matches!(err, CoreError::FFmpeg(FFmpegError::ExecutionFailed(_))));
        assert!(!out.join(KEYFRAMES_MANIFEST).exists());
    }
}
