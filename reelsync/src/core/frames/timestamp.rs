//! Timestamp Extraction
//!
//! Pulls a small window of frames centred on each requested timestamp.
//! Every timestamp is checked against the video duration before any file
//! is written.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{
    ensure_video_exists, save_jpeg, validate_quality, write_manifest, VideoDecoder,
    DEFAULT_FRAMES_PER_TIMESTAMP, DEFAULT_JPEG_QUALITY, TIMESTAMP_MANIFEST,
};
use crate::core::{CoreError, CoreResult};

#[derive(Clone, Debug, PartialEq)]
pub struct TimestampOptions {
    /// Frames captured around each timestamp, at least 1
    pub frames_per_timestamp: usize,
    pub jpeg_quality: u8,
}

impl Default for TimestampOptions {
    fn default() -> Self {
        Self {
            frames_per_timestamp: DEFAULT_FRAMES_PER_TIMESTAMP,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// One saved frame
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimestampFrameRecord {
    /// Position of the timestamp in the request list
    pub timestamp_index: usize,
    pub target_timestamp: f64,
    pub actual_timestamp: f64,
    /// Zero-based frame index
    pub frame_number: u64,
    pub offset_from_target: i64,
    pub filename: String,
}

/// Contents of `timestamp_frames_metadata.json`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimestampManifest {
    pub video_path: String,
    pub total_frames: u64,
    pub duration: f64,
    pub fps: f64,
    pub requested_timestamps: Vec<f64>,
    pub frames_per_timestamp: usize,
    pub total_frames_extracted: usize,
    pub frames: Vec<TimestampFrameRecord>,
}

/// Offsets around the centre frame for a window of `count` frames
///
/// Odd counts are symmetric; even counts lean forward, e.g. 4 → -1..=2.
pub fn frame_offsets(count: usize) -> std::ops::Range<i64> {
    let count = count as i64;
    let before = (count - 1) / 2;
    -before..count - before
}

fn offset_label(offset: i64) -> String {
    if offset == 0 {
        "exact".to_string()
    } else {
        format!("{:+}", offset)
    }
}

pub struct TimestampExtractor<'a> {
    decoder: &'a dyn VideoDecoder,
}

impl<'a> TimestampExtractor<'a> {
    pub fn new(decoder: &'a dyn VideoDecoder) -> Self {
        Self { decoder }
    }

    pub fn extract(
        &self,
        video_path: &Path,
        output_dir: &Path,
        timestamps: &[f64],
        options: &TimestampOptions,
    ) -> CoreResult<TimestampManifest> {
        if options.frames_per_timestamp == 0 {
            return Err(CoreError::Validation(
                "frames_per_timestamp must be at least 1".to_string(),
            ));
        }
        validate_quality(options.jpeg_quality)?;
        if timestamps.is_empty() {
            return Err(CoreError::Validation(
                "At least one timestamp is required".to_string(),
            ));
        }
        if let Some(bad) = timestamps.iter().find(|ts| !ts.is_finite()) {
            return Err(CoreError::Validation(format!("Invalid timestamp {}", bad)));
        }
        ensure_video_exists(video_path)?;

        let mut video = self.decoder.open(video_path)?;
        let info = video.info().clone();

        let out_of_range: Vec<String> = timestamps
            .iter()
            .filter(|&&ts| ts < 0.0 || ts > info.duration_sec)
            .map(|ts| format!("{:.2}s", ts))
            .collect();
        if !out_of_range.is_empty() {
            return Err(CoreError::Validation(format!(
                "Timestamps outside video duration of {:.2}s: {}",
                info.duration_sec,
                out_of_range.join(", ")
            )));
        }

        std::fs::create_dir_all(output_dir)?;

        tracing::info!(
            video = %video_path.display(),
            timestamps = timestamps.len(),
            frames_per_timestamp = options.frames_per_timestamp,
            "Starting timestamp extraction"
        );

        let mut frames = Vec::new();
        for (timestamp_index, &target_timestamp) in timestamps.iter().enumerate() {
            let center = (target_timestamp * info.fps).floor() as i64;

            for offset in frame_offsets(options.frames_per_timestamp) {
                let target = center + offset;
                if target < 0 || target as u64 >= info.total_frames {
                    tracing::warn!(
                        timestamp = target_timestamp,
                        frame = target,
                        "Frame outside video bounds, skipping"
                    );
                    continue;
                }
                let frame_number = target as u64;

                let frame = match video.frame_at(frame_number) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        tracing::warn!(frame = frame_number, "Could not read frame, skipping");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(frame = frame_number, error = %e, "Frame decode failed, skipping");
                        continue;
                    }
                };

                let filename = format!(
                    "frame_ts{:03}_{:.2}s_{}_f{:06}.jpg",
                    timestamp_index,
                    target_timestamp,
                    offset_label(offset),
                    frame_number
                );
                save_jpeg(&frame, &output_dir.join(&filename), options.jpeg_quality)?;

                frames.push(TimestampFrameRecord {
                    timestamp_index,
                    target_timestamp,
                    actual_timestamp: info.timestamp_of(frame_number),
                    frame_number,
                    offset_from_target: offset,
                    filename,
                });
            }
        }

        let manifest = TimestampManifest {
            video_path: video_path.display().to_string(),
            total_frames: info.total_frames,
            duration: info.duration_sec,
            fps: info.fps,
            requested_timestamps: timestamps.to_vec(),
            frames_per_timestamp: options.frames_per_timestamp,
            total_frames_extracted: frames.len(),
            frames,
        };
        write_manifest(output_dir, TIMESTAMP_MANIFEST, &manifest)?;

        tracing::info!(
            video = %video_path.display(),
            frames = manifest.total_frames_extracted,
            output = %output_dir.display(),
            "Timestamp extraction complete"
        );

        Ok(manifest)
    }
}
