//! Video Library Service
//!
//! User-facing operations over the injected sync store, remote catalog,
//! local inventory and media prober.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::download::{stream_to_file, DownloadOutcome, DownloadRequest, DownloadedVideo};
use super::filename::{sanitize_filename, validate_file_component};
use crate::core::inventory::{LocalInventory, MediaProber};
use crate::core::reconcile::{Reconciler, Reconciliation};
use crate::core::remote::{ChatMessage, RemoteCatalog, RemoteVideo, UploadReceipt, UploadRequest};
use crate::core::sync::{DuplicateConflict, NewSyncRecord, SyncRecord, SyncStore};
use crate::core::{CoreError, CoreResult, LocalName, VideoProbe, INDEXING_STATUS};

// =============================================================================
// Results
// =============================================================================

/// Outcome of pushing a local file to the remote catalog
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    Uploaded {
        receipt: UploadReceipt,
        /// The new sync record, when the service returned an id and the write succeeded
        record: Option<SyncRecord>,
    },
    /// The local file is already linked to a remote video
    Duplicate(DuplicateConflict),
}

/// Result of removing a local file
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LocalDeletion {
    pub local_name: LocalName,
    /// Whether a sync record was removed with it
    pub record_removed: bool,
}

/// Result of removing a remote video
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemoteDeletion {
    pub remote_id: String,
    pub record_removed: bool,
}

/// Properties of a local file, as needed to select it for extraction
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocalVideoDetails {
    pub local_name: LocalName,
    pub path: PathBuf,
    pub size_bytes: u64,
    #[serde(flatten)]
    pub probe: VideoProbe,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RemoteStatus {
    pub configured: bool,
}

// =============================================================================
// Library
// =============================================================================

/// Entry point for listing, transferring and deleting videos
pub struct VideoLibrary {
    store: Box<dyn SyncStore>,
    remote: Box<dyn RemoteCatalog>,
    inventory: Box<dyn LocalInventory>,
    prober: Box<dyn MediaProber>,
    group_id: String,
}

impl VideoLibrary {
    pub fn new(
        store: Box<dyn SyncStore>,
        remote: Box<dyn RemoteCatalog>,
        inventory: Box<dyn LocalInventory>,
        prober: Box<dyn MediaProber>,
    ) -> Self {
        Self {
            store,
            remote,
            inventory,
            prober,
            group_id: "default".to_string(),
        }
    }

    /// Group id sent with uploads
    pub fn with_group_id(mut self, group_id: &str) -> Self {
        self.group_id = group_id.to_string();
        self
    }

    pub fn store(&self) -> &dyn SyncStore {
        self.store.as_ref()
    }

    fn upload_dir(&self) -> &Path {
        self.inventory.root()
    }

    fn local_path(&self, local_name: &str) -> CoreResult<PathBuf> {
        validate_file_component("File name", local_name)?;
        Ok(self.upload_dir().join(local_name))
    }

    /// Snapshot all three sources and reconcile them
    pub fn list_videos(&self) -> CoreResult<Reconciliation> {
        let local = self.inventory.snapshot()?;
        let remote = self.remote.snapshot();
        Ok(Reconciler::new(self.store.as_ref()).reconcile(remote, &local))
    }

    /// Materialize a remote video into the upload directory
    ///
    /// Conflicts are reported before anything touches the filesystem. Bytes
    /// written by a download that later fails are removed.
    pub fn download(&self, request: &DownloadRequest) -> CoreResult<DownloadOutcome> {
        if request.remote_id.trim().is_empty() {
            return Err(CoreError::Validation("remote id is required".to_string()));
        }
        if request.url.trim().is_empty() {
            return Err(CoreError::Validation("video url is required".to_string()));
        }

        let local_name = sanitize_filename(&request.display_name, &request.remote_id);

        if let Some(conflict) = self
            .store
            .check_duplicate(Some(&request.remote_id), Some(&local_name))?
        {
            tracing::info!(
                remote_id = %request.remote_id,
                local_name = %local_name,
                "Download refused: {}",
                conflict.message()
            );
            return Ok(DownloadOutcome::Duplicate(conflict));
        }

        let path = self.upload_dir().join(&local_name);
        if path.exists() {
            return Ok(DownloadOutcome::FileExists { local_name });
        }

        fs::create_dir_all(self.upload_dir())?;

        let mut reader = self.remote.open_download(&request.url)?;
        let bytes_downloaded = stream_to_file(reader.as_mut(), &path)?;

        let probe = match self.prober.probe(&path) {
            Ok(probe) => probe,
            Err(e) => {
                remove_quietly(&path);
                return Err(CoreError::VideoOpen(format!(
                    "Unable to open downloaded video file {}: {}",
                    local_name, e
                )));
            }
        };

        let record = NewSyncRecord::synced(&request.remote_id, &local_name, &request.display_name)
            .with_remote_url(Some(request.url.clone()))
            .with_indexing_status(request.indexing_status.clone());

        if let Err(e) = self.store.upsert(&record) {
            remove_quietly(&path);
            return Err(e.into());
        }

        tracing::info!(
            remote_id = %request.remote_id,
            local_name = %local_name,
            bytes = bytes_downloaded,
            "Downloaded video"
        );

        Ok(DownloadOutcome::Completed(DownloadedVideo {
            remote_id: request.remote_id.clone(),
            local_name,
            path,
            display_name: request.display_name.clone(),
            bytes_downloaded,
            probe,
            indexing_status: request.indexing_status.clone(),
        }))
    }

    /// Push a file from the upload directory to the remote catalog
    pub fn upload_local(
        &self,
        local_name: &str,
        display_name: Option<&str>,
    ) -> CoreResult<UploadOutcome> {
        let path = self.local_path(local_name)?;
        if !path.is_file() {
            return Err(CoreError::VideoNotFound(local_name.to_string()));
        }

        if let Some(conflict) = self.store.check_duplicate(None, Some(local_name))? {
            return Ok(UploadOutcome::Duplicate(conflict));
        }

        let video_name = display_name
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| file_stem(local_name));

        let receipt = self
            .remote
            .upload_file(&path, &UploadRequest::new(&video_name, &self.group_id))?;

        let record = match receipt.video_id.as_deref() {
            Some(video_id) => {
                let new_record = NewSyncRecord::synced(video_id, local_name, &video_name)
                    .with_remote_url(receipt.url.clone())
                    .with_indexing_status(Some(INDEXING_STATUS.to_string()));
                match self.store.upsert(&new_record) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(remote_id = %video_id, error = %e, "Uploaded but failed to record sync");
                        None
                    }
                }
            }
            None => {
                tracing::warn!(local_name = %local_name, "Upload response carried no video id");
                None
            }
        };

        Ok(UploadOutcome::Uploaded { receipt, record })
    }

    /// Ask the remote service to ingest a video by URL; no record is kept
    pub fn upload_from_url(&self, url: &str, name: &str) -> CoreResult<UploadReceipt> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CoreError::Validation(format!("Invalid video URL: {}", url)));
        }
        if name.trim().is_empty() {
            return Err(CoreError::Validation("video name is required".to_string()));
        }

        Ok(self
            .remote
            .upload_from_url(url, &UploadRequest::new(name.trim(), &self.group_id))?)
    }

    /// Delete a local file and any sync record that points at it
    pub fn delete_local(&self, local_name: &str) -> CoreResult<LocalDeletion> {
        let path = self.local_path(local_name)?;
        if !path.is_file() {
            return Err(CoreError::VideoNotFound(local_name.to_string()));
        }

        fs::remove_file(&path)?;
        let record_removed = self.cascade(|store| store.delete_by_local_name(local_name));

        tracing::info!(local_name = %local_name, record_removed, "Deleted local video");
        Ok(LocalDeletion {
            local_name: local_name.to_string(),
            record_removed,
        })
    }

    /// Delete a remote video and any sync record that points at it
    pub fn delete_remote(&self, remote_id: &str) -> CoreResult<RemoteDeletion> {
        if remote_id.trim().is_empty() {
            return Err(CoreError::Validation("remote id is required".to_string()));
        }

        self.remote.delete_video(remote_id)?;
        let record_removed = self.cascade(|store| store.delete_by_remote_id(remote_id));

        tracing::info!(remote_id = %remote_id, record_removed, "Deleted remote video");
        Ok(RemoteDeletion {
            remote_id: remote_id.to_string(),
            record_removed,
        })
    }

    fn cascade<F>(&self, delete: F) -> bool
    where
        F: FnOnce(&dyn SyncStore) -> crate::core::sync::SyncResult<bool>,
    {
        match delete(self.store.as_ref()) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to remove sync record");
                false
            }
        }
    }

    /// Look up one video in a fresh remote listing
    pub fn remote_video(&self, remote_id: &str) -> CoreResult<RemoteVideo> {
        self.remote
            .snapshot()?
            .remove(remote_id)
            .ok_or_else(|| CoreError::RemoteVideoNotFound(remote_id.to_string()))
    }

    /// Re-read a video's indexing status from the remote catalog
    pub fn refresh_status(&self, remote_id: &str) -> CoreResult<String> {
        let video = self.remote_video(remote_id)?;

        match self
            .store
            .update_indexing_status(remote_id, &video.indexing_status)
        {
            Ok(true) => {
                tracing::info!(remote_id = %remote_id, status = %video.indexing_status, "Refreshed indexing status")
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(remote_id = %remote_id, error = %e, "Failed to store refreshed status")
            }
        }

        Ok(video.indexing_status)
    }

    /// Probe a local file
    pub fn describe_local(&self, local_name: &str) -> CoreResult<LocalVideoDetails> {
        let path = self.local_path(local_name)?;
        if !path.is_file() {
            return Err(CoreError::VideoNotFound(local_name.to_string()));
        }

        let size_bytes = fs::metadata(&path)?.len();
        let probe = self
            .prober
            .probe(&path)
            .map_err(|e| CoreError::VideoOpen(format!("{}: {}", local_name, e)))?;

        Ok(LocalVideoDetails {
            local_name: local_name.to_string(),
            path,
            size_bytes,
            probe,
        })
    }

    /// Ask a question about a remote video, continuing `history`
    pub fn ask(
        &self,
        remote_id: &str,
        question: &str,
        history: &[ChatMessage],
    ) -> CoreResult<serde_json::Value> {
        if question.trim().is_empty() {
            return Err(CoreError::Validation("question is required".to_string()));
        }

        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(question.trim()));
        Ok(self.remote.ask_question(remote_id, &messages)?)
    }

    pub fn remote_status(&self) -> RemoteStatus {
        RemoteStatus {
            configured: self.remote.is_configured(),
        }
    }
}

fn file_stem(local_name: &str) -> String {
    Path::new(local_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| local_name.to_string())
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove downloaded file");
    }
}
