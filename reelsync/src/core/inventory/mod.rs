//! Local File Inventory Module
//!
//! Enumerates the video files present in the upload directory together with
//! the probe metadata reconciliation and listing need.

mod scanner;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{CoreResult, LocalName, TimeSec, VideoProbe};

pub use scanner::DirectoryInventory;

/// A video file found in local storage
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalVideo {
    /// File name inside the upload directory
    pub local_name: LocalName,
    /// Absolute path on disk
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Last modification time, if the filesystem reports one
    pub modified: Option<DateTime<Utc>>,
    /// Duration in seconds (0 when probing failed)
    pub duration_sec: TimeSec,
    /// Frame rate (0 when probing failed)
    pub fps: f64,
}

/// Local files keyed by `local_name`
pub type LocalSnapshot = BTreeMap<LocalName, LocalVideo>;

/// Source of the local side of reconciliation
pub trait LocalInventory {
    /// Current set of local video files
    fn snapshot(&self) -> CoreResult<LocalSnapshot>;

    /// Directory the inventory reads from and downloads land in
    fn root(&self) -> &Path;
}

/// Reads basic stream properties from a media file
pub trait MediaProber {
    fn probe(&self, path: &Path) -> CoreResult<VideoProbe>;
}
