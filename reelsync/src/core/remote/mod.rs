//! Remote Catalog Module
//!
//! The remote video-hosting and indexing service, seen as a capability:
//! list, upload, delete, question answering and raw media download.
//! [`HttpRemoteCatalog`] talks to the service over HTTP.

mod http;

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{RemoteId, UNKNOWN_STATUS};

pub use http::HttpRemoteCatalog;

/// Remote catalog error types
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Remote API key not configured")]
    NotConfigured,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Remote video not found: {0}")]
    NotFound(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

// =============================================================================
// Catalog Types
// =============================================================================

/// Fallback display name for remote videos without metadata
pub const UNNAMED_VIDEO: &str = "Unnamed Video";

/// A video as listed by the remote catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteVideo {
    pub video_id: RemoteId,
    pub name: String,
    /// Direct media URL, when the service exposes one
    pub url: Option<String>,
    pub indexing_status: String,
}

impl RemoteVideo {
    pub fn new(video_id: &str, name: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            name: name.to_string(),
            url: None,
            indexing_status: UNKNOWN_STATUS.to_string(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.indexing_status = status.to_string();
        self
    }
}

/// Remote catalog keyed by video id
pub type RemoteCatalogSnapshot = BTreeMap<RemoteId, RemoteVideo>;

/// Options shared by file and URL uploads
#[derive(Clone, Debug, PartialEq)]
pub struct UploadRequest {
    pub video_name: String,
    /// Ask the service to index the video for search and Q&A
    pub index: bool,
    pub enable_thumbnails: bool,
    pub group_id: String,
}

impl UploadRequest {
    pub fn new(video_name: &str, group_id: &str) -> Self {
        Self {
            video_name: video_name.to_string(),
            index: true,
            enable_thumbnails: false,
            group_id: group_id.to_string(),
        }
    }
}

/// What the service returned for an accepted upload
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub video_id: Option<RemoteId>,
    pub url: Option<String>,
    /// Full response body
    pub raw: serde_json::Value,
}

/// One turn of a Q&A conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

// =============================================================================
// Catalog Trait
// =============================================================================

/// Remote video service
pub trait RemoteCatalog {
    /// Whether credentials are present; no request is made
    fn is_configured(&self) -> bool;

    fn list_videos(&self) -> RemoteResult<Vec<RemoteVideo>>;

    fn upload_file(&self, path: &Path, request: &UploadRequest) -> RemoteResult<UploadReceipt>;

    /// Ask the service to ingest a video from a public URL
    fn upload_from_url(&self, url: &str, request: &UploadRequest) -> RemoteResult<UploadReceipt>;

    fn delete_video(&self, video_id: &str) -> RemoteResult<()>;

    /// Forward a conversation about one video; returns the service's answer payload
    fn ask_question(
        &self,
        video_id: &str,
        messages: &[ChatMessage],
    ) -> RemoteResult<serde_json::Value>;

    /// Open a streaming reader over a media URL
    fn open_download(&self, url: &str) -> RemoteResult<Box<dyn Read>>;

    /// The catalog keyed by video id
    fn snapshot(&self) -> RemoteResult<RemoteCatalogSnapshot> {
        Ok(self
            .list_videos()?
            .into_iter()
            .map(|v| (v.video_id.clone(), v))
            .collect())
    }
}
