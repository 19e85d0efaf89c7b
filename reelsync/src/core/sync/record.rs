//! Sync Record Model
//!
//! One row per remote video ↔ local file association.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{LocalName, RemoteId};

// =============================================================================
// Sync Status
// =============================================================================

/// Transfer state of an association
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Synced,
    Downloading,
    Uploading,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Downloading => "downloading",
            SyncStatus::Uploading => "uploading",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "synced" => Ok(SyncStatus::Synced),
            "downloading" => Ok(SyncStatus::Downloading),
            "uploading" => Ok(SyncStatus::Uploading),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A persisted association between a remote video and a local file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Store-assigned row id
    pub id: i64,
    pub remote_id: RemoteId,
    pub local_name: LocalName,
    pub display_name: String,
    pub remote_url: Option<String>,
    pub sync_status: SyncStatus,
    pub indexing_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncRecord {
    /// Materializes a record from a write request
    pub fn from_new(id: i64, record: &NewSyncRecord, now: DateTime<Utc>) -> Self {
        Self {
            id,
            remote_id: record.remote_id.clone(),
            local_name: record.local_name.clone(),
            display_name: record.display_name.clone(),
            remote_url: record.remote_url.clone(),
            sync_status: record.sync_status,
            indexing_status: record.indexing_status.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Write request for [`super::SyncStore::upsert`]
#[derive(Clone, Debug, PartialEq)]
pub struct NewSyncRecord {
    pub remote_id: RemoteId,
    pub local_name: LocalName,
    pub display_name: String,
    pub remote_url: Option<String>,
    pub sync_status: SyncStatus,
    pub indexing_status: Option<String>,
}

impl NewSyncRecord {
    /// A fully synced association with no URL or indexing status yet
    pub fn synced(remote_id: &str, local_name: &str, display_name: &str) -> Self {
        Self {
            remote_id: remote_id.to_string(),
            local_name: local_name.to_string(),
            display_name: display_name.to_string(),
            remote_url: None,
            sync_status: SyncStatus::Synced,
            indexing_status: None,
        }
    }

    pub fn with_remote_url(mut self, url: Option<String>) -> Self {
        self.remote_url = url;
        self
    }

    pub fn with_indexing_status(mut self, status: Option<String>) -> Self {
        self.indexing_status = status;
        self
    }
}

// =============================================================================
// Duplicate Detection
// =============================================================================

/// Which unique key collided
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKey {
    RemoteId,
    LocalName,
}

/// A write or side effect refused because a record already owns one of its keys
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DuplicateConflict {
    pub key: DuplicateKey,
    pub existing: SyncRecord,
}

impl DuplicateConflict {
    pub fn new(key: DuplicateKey, existing: SyncRecord) -> Self {
        Self { key, existing }
    }

    /// Human-readable description naming the conflicting record
    pub fn message(&self) -> String {
        match self.key {
            DuplicateKey::RemoteId => format!(
                "This remote video is already synced with local file: {}. Delete one to continue.",
                self.existing.local_name
            ),
            DuplicateKey::LocalName => format!(
                "This local file is already synced with remote video: {}. Delete one to continue.",
                self.existing.display_name
            ),
        }
    }
}
