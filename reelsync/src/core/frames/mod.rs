//! Frame Extraction Module
//!
//! Two strategies for pulling still frames out of a video:
//! - Scene-change detection over sampled luma histograms ([`SceneExtractor`])
//! - Frames around requested timestamps ([`TimestampExtractor`])
//!
//! Each run writes JPEG stills and one JSON manifest into its job directory.
//! Manifest file names are fixed; downstream tooling finds them by name.
//!
//! Runs either complete (manifest written) or fail before the first frame
//! is read. Per-frame problems are logged and skipped.

mod histogram;
mod jobs;
mod scene;
mod timestamp;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::Serialize;

use crate::core::{CoreError, CoreResult, VideoProbe};

pub use histogram::LumaHistogram;
pub use jobs::{JobStore, JobSummary};
pub use scene::{KeyframeManifest, KeyframeRecord, SceneExtractor, SceneOptions};
pub use timestamp::{
    frame_offsets, TimestampExtractor, TimestampFrameRecord, TimestampManifest, TimestampOptions,
};

/// Scene mode inspects every Nth decoded frame
pub const SAMPLE_STRIDE: u64 = 5;

pub const DEFAULT_THRESHOLD: f64 = 0.3;
pub const DEFAULT_MAX_FRAMES: usize = 100;
pub const DEFAULT_FRAMES_PER_TIMESTAMP: usize = 3;
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Manifest written by scene-change extraction
pub const KEYFRAMES_MANIFEST: &str = "keyframes_metadata.json";

/// Manifest written by timestamp extraction
pub const TIMESTAMP_MANIFEST: &str = "timestamp_frames_metadata.json";

// =============================================================================
// Decoder Traits
// =============================================================================

/// Opens videos for frame access
pub trait VideoDecoder {
    /// Fails with [`CoreError::VideoOpen`] when the file cannot be decoded
    fn open(&self, path: &Path) -> CoreResult<Box<dyn DecodedVideo>>;
}

/// An opened video
pub trait DecodedVideo {
    /// Stream properties read at open time
    fn info(&self) -> &VideoProbe;

    /// Next frame in decode order; `None` at end of stream
    fn next_frame(&mut self) -> CoreResult<Option<RgbImage>>;

    /// Frame at a zero-based index; `None` when it cannot be produced
    fn frame_at(&mut self, index: u64) -> CoreResult<Option<RgbImage>>;
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Parse a comma-separated list of timestamps in seconds, e.g. `"10.5, 25,60.3"`
pub fn parse_timestamp_list(input: &str) -> CoreResult<Vec<f64>> {
    if input.trim().is_empty() {
        return Err(CoreError::Validation(
            "At least one timestamp is required".to_string(),
        ));
    }

    input
        .split(',')
        .map(|item| {
            let item = item.trim();
            match item.parse::<f64>() {
                Ok(ts) if ts.is_finite() => Ok(ts),
                _ => Err(CoreError::Validation(format!(
                    "Invalid timestamp '{}': use comma-separated seconds, e.g. 10.5,25.0,60.3",
                    item
                ))),
            }
        })
        .collect()
}

pub(crate) fn ensure_video_exists(path: &Path) -> CoreResult<()> {
    if !path.is_file() {
        return Err(CoreError::VideoNotFound(path.display().to_string()));
    }
    Ok(())
}

pub(crate) fn validate_quality(quality: u8) -> CoreResult<()> {
    if !(1..=100).contains(&quality) {
        return Err(CoreError::Validation(format!(
            "JPEG quality must be between 1 and 100, got {}",
            quality
        )));
    }
    Ok(())
}

pub(crate) fn save_jpeg(frame: &RgbImage, path: &Path, quality: u8) -> CoreResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut writer, quality).encode_image(frame)?;
    writer.flush()?;
    Ok(())
}

pub(crate) fn write_manifest<T: Serialize>(output_dir: &Path, name: &str, manifest: &T) -> CoreResult<()> {
    let content = serde_json::to_string_pretty(manifest)?;
    std::fs::write(output_dir.join(name), content)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Synthetic decoder shared by the extractor tests

    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Grey level of a 1-based frame number
    pub type Shade = fn(u64) -> u8;

    #[derive(Default)]
    pub struct DecodeLog {
        pub sequential_reads: u64,
        pub requested: Vec<u64>,
    }

    pub struct FakeDecoder {
        pub probe: VideoProbe,
        pub shade: Shade,
        pub log: Rc<RefCell<DecodeLog>>,
        /// Indices `frame_at` refuses to produce
        pub unreadable: Vec<u64>,
    }

    impl FakeDecoder {
        pub fn new(fps: f64, total_frames: u64, shade: Shade) -> Self {
            Self {
                probe: VideoProbe::new(fps, total_frames, 8, 8),
                shade,
                log: Rc::new(RefCell::new(DecodeLog::default())),
                unreadable: Vec::new(),
            }
        }
    }

    pub fn solid(level: u8) -> RgbImage {
        RgbImage::from_pixel(8, 8, image::Rgb([level, level, level]))
    }

    struct FakeVideo {
        probe: VideoProbe,
        shade: Shade,
        log: Rc<RefCell<DecodeLog>>,
        unreadable: Vec<u64>,
        position: u64,
    }

    impl VideoDecoder for FakeDecoder {
        fn open(&self, path: &Path) -> CoreResult<Box<dyn DecodedVideo>> {
            if path.extension().and_then(|e| e.to_str()) == Some("broken") {
                return Err(CoreError::VideoOpen(path.display().to_string()));
            }
            Ok(Box::new(FakeVideo {
                probe: self.probe.clone(),
                shade: self.shade,
                log: self.log.clone(),
                unreadable: self.unreadable.clone(),
                position: 0,
            }))
        }
    }

    impl DecodedVideo for FakeVideo {
        fn info(&self) -> &VideoProbe {
            &self.probe
        }

        fn next_frame(&mut self) -> CoreResult<Option<RgbImage>> {
            if self.position >= self.probe.total_frames {
                return Ok(None);
            }
            self.position += 1;
            self.log.borrow_mut().sequential_reads += 1;
            Ok(Some(solid((self.shade)(self.position))))
        }

        fn frame_at(&mut self, index: u64) -> CoreResult<Option<RgbImage>> {
            self.log.borrow_mut().requested.push(index);
            if index >= self.probe.total_frames || self.unreadable.contains(&index) {
                return Ok(None);
            }
            Ok(Some(solid((self.shade)(index + 1))))
        }
    }

    /// Writes a placeholder file so existence checks pass
    pub fn touch_video(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"stub").unwrap();
        path
    }
}
