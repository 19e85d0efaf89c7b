//! Scene-Change Extraction
//!
//! Decodes frames in order, samples every [`SAMPLE_STRIDE`]th one and keeps
//! it as a keyframe when its luma histogram diverges from the previous
//! sample by more than the threshold.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{
    ensure_video_exists, save_jpeg, validate_quality, write_manifest, LumaHistogram, VideoDecoder,
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_FRAMES, DEFAULT_THRESHOLD, KEYFRAMES_MANIFEST,
    SAMPLE_STRIDE,
};
use crate::core::{CoreError, CoreResult};

/// Tuning for a scene-change run
#[derive(Clone, Debug, PartialEq)]
pub struct SceneOptions {
    /// Minimum histogram divergence (1 - correlation) for a cut, in [0, 1]
    pub threshold: f64,
    /// Keyframe cap; decoding stops once reached
    pub max_frames: usize,
    pub jpeg_quality: u8,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_frames: DEFAULT_MAX_FRAMES,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl SceneOptions {
    fn validate(&self) -> CoreResult<()> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(CoreError::Validation(format!(
                "Threshold must be between 0 and 1, got {}",
                self.threshold
            )));
        }
        validate_quality(self.jpeg_quality)
    }
}

/// One saved keyframe
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyframeRecord {
    /// 1-based position in decode order
    pub frame: u64,
    pub timestamp: f64,
    pub filename: String,
}

/// Contents of `keyframes_metadata.json`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyframeManifest {
    pub video_path: String,
    pub total_frames: u64,
    pub duration: f64,
    pub fps: f64,
    pub keyframes_extracted: usize,
    pub threshold: f64,
    pub keyframes: Vec<KeyframeRecord>,
}

pub struct SceneExtractor<'a> {
    decoder: &'a dyn VideoDecoder,
}

impl<'a> SceneExtractor<'a> {
    pub fn new(decoder: &'a dyn VideoDecoder) -> Self {
        Self { decoder }
    }

    /// Runs detection and writes stills plus the manifest into `output_dir`
    pub fn extract(
        &self,
        video_path: &Path,
        output_dir: &Path,
        options: &SceneOptions,
    ) -> CoreResult<KeyframeManifest> {
        options.validate()?;
        ensure_video_exists(video_path)?;

        let mut video = self.decoder.open(video_path)?;
        let info = video.info().clone();
        std::fs::create_dir_all(output_dir)?;

        tracing::info!(
            video = %video_path.display(),
            fps = info.fps,
            total_frames = info.total_frames,
            threshold = options.threshold,
            max_frames = options.max_frames,
            "Starting scene-change extraction"
        );

        let mut keyframes = Vec::new();
        let mut previous: Option<LumaHistogram> = None;
        let mut frame_number: u64 = 0;

        while keyframes.len() < options.max_frames {
            let frame = match video.next_frame()? {
                Some(frame) => frame,
                None => break,
            };
            frame_number += 1;

            if frame_number % SAMPLE_STRIDE != 0 {
                continue;
            }

            let histogram = LumaHistogram::from_frame(&frame);
            if let Some(prev) = &previous {
                let correlation = histogram.correlation(prev);
                if correlation < 1.0 - options.threshold {
                    let timestamp = info.timestamp_of(frame_number);
                    let filename = format!("keyframe_{:04}_t{:.2}s.jpg", keyframes.len(), timestamp);
                    save_jpeg(&frame, &output_dir.join(&filename), options.jpeg_quality)?;

                    tracing::debug!(
                        frame = frame_number,
                        timestamp,
                        correlation,
                        "Scene change detected"
                    );
                    keyframes.push(KeyframeRecord {
                        frame: frame_number,
                        timestamp,
                        filename,
                    });
                }
            }
            previous = Some(histogram);
        }

        let manifest = KeyframeManifest {
            video_path: video_path.display().to_string(),
            total_frames: info.total_frames,
            duration: info.duration_sec,
            fps: info.fps,
            keyframes_extracted: keyframes.len(),
            threshold: options.threshold,
            keyframes,
        };
        write_manifest(output_dir, KEYFRAMES_MANIFEST, &manifest)?;

        tracing::info!(
            video = %video_path.display(),
            keyframes = manifest.keyframes_extracted,
            output = %output_dir.display(),
            "Scene-change extraction complete"
        );

        Ok(manifest)
    }
}
