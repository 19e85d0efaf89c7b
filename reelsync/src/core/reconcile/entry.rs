//! Unified Video Entries
//!
//! The merged, never-persisted view of one video across remote and local.

use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::inventory::LocalVideo;
use crate::core::remote::RemoteVideo;
use crate::core::{is_indexed, LocalName, RemoteId, TimeSec};

/// Where an entry's data comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// Remote video and local file linked by a sync record
    Synced,
    RemoteOnly,
    LocalOnly,
}

/// Remote half of an entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteSide {
    pub video_id: RemoteId,
    pub url: Option<String>,
    pub indexing_status: String,
}

impl From<&RemoteVideo> for RemoteSide {
    fn from(video: &RemoteVideo) -> Self {
        Self {
            video_id: video.video_id.clone(),
            url: video.url.clone(),
            indexing_status: video.indexing_status.clone(),
        }
    }
}

/// Local half of an entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalSide {
    pub local_name: LocalName,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
    pub duration_sec: TimeSec,
    pub fps: f64,
}

impl From<&LocalVideo> for LocalSide {
    fn from(video: &LocalVideo) -> Self {
        Self {
            local_name: video.local_name.clone(),
            path: video.path.clone(),
            size_bytes: video.size_bytes,
            modified: video.modified,
            duration_sec: video.duration_sec,
            fps: video.fps,
        }
    }
}

/// Actions the caller may offer for an entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_select: bool,
    pub can_download: bool,
    pub can_delete_remote: bool,
    pub can_delete_local: bool,
    pub can_refresh_status: bool,
}

impl Capabilities {
    pub fn synced(indexing_status: &str) -> Self {
        let indexed = is_indexed(Some(indexing_status));
        Self {
            can_select: indexed,
            can_download: false,
            can_delete_remote: true,
            can_delete_local: true,
            can_refresh_status: !indexed,
        }
    }

    pub fn remote_only(indexing_status: &str) -> Self {
        let indexed = is_indexed(Some(indexing_status));
        Self {
            can_select: false,
            can_download: indexed,
            can_delete_remote: true,
            can_delete_local: false,
            can_refresh_status: !indexed,
        }
    }

    pub fn local_only() -> Self {
        Self {
            can_delete_local: true,
            ..Self::default()
        }
    }
}

/// One row of the unified listing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnifiedVideoEntry {
    /// Remote id, or the local name for local-only entries
    pub id: String,
    pub name: String,
    pub source: EntrySource,
    pub remote: Option<RemoteSide>,
    pub local: Option<LocalSide>,
    pub capabilities: Capabilities,
}

impl UnifiedVideoEntry {
    pub fn remote_only(video: &RemoteVideo) -> Self {
        Self {
            id: video.video_id.clone(),
            name: video.name.clone(),
            source: EntrySource::RemoteOnly,
            remote: Some(RemoteSide::from(video)),
            local: None,
            capabilities: Capabilities::remote_only(&video.indexing_status),
        }
    }

    pub fn local_only(video: &LocalVideo) -> Self {
        Self {
            id: video.local_name.clone(),
            name: video.local_name.clone(),
            source: EntrySource::LocalOnly,
            remote: None,
            local: Some(LocalSide::from(video)),
            capabilities: Capabilities::local_only(),
        }
    }

    /// Local modification time, if any side carries one
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.local.as_ref().and_then(|l| l.modified)
    }

    /// Listing order: newest first, undated last, then by name
    pub fn listing_order(a: &Self, b: &Self) -> Ordering {
        b.modified()
            .cmp(&a.modified())
            .then_with(|| a.name.cmp(&b.name))
    }
}
