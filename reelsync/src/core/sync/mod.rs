//! Sync Store Module
//!
//! Persistent mapping between remote videos and local files.
//!
//! The [`SyncStore`] trait is the contract consumed by reconciliation and the
//! library service. [`SqliteSyncStore`] is the production implementation;
//! [`MemorySyncStore`] backs tests and dry runs.

mod memory;
mod record;
mod sqlite;

pub use memory::MemorySyncStore;
pub use record::{DuplicateConflict, DuplicateKey, NewSyncRecord, SyncRecord, SyncStatus};
pub use sqlite::SqliteSyncStore;

/// Sync store error types
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A write tried to reuse a `remote_id` or `local_name` owned by another record
    #[error("{}", .0.message())]
    Duplicate(DuplicateConflict),

    /// The underlying storage failed
    #[error("Storage failure: {0}")]
    Storage(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Persistent remote ↔ local mapping
///
/// `remote_id` and `local_name` are each unique across all records.
/// Lookups report absence as `Ok(None)`; deletes of missing keys are `Ok(false)`.
pub trait SyncStore {
    /// Prepare the backing storage (idempotent)
    fn initialize(&self) -> SyncResult<()>;

    /// Insert or update keyed by `remote_id`, touching `updated_at`
    ///
    /// Fails with [`SyncError::Duplicate`] when `local_name` already belongs to
    /// a record with a different `remote_id`.
    fn upsert(&self, record: &NewSyncRecord) -> SyncResult<SyncRecord>;

    fn find_by_remote_id(&self, remote_id: &str) -> SyncResult<Option<SyncRecord>>;

    fn find_by_local_name(&self, local_name: &str) -> SyncResult<Option<SyncRecord>>;

    /// Every record, most recently updated first
    fn list_all(&self) -> SyncResult<Vec<SyncRecord>>;

    /// Returns whether a record was removed
    fn delete_by_remote_id(&self, remote_id: &str) -> SyncResult<bool>;

    /// Returns whether a record was removed
    fn delete_by_local_name(&self, local_name: &str) -> SyncResult<bool>;

    /// Report the record that already owns either key, checking `remote_id` first
    fn check_duplicate(
        &self,
        remote_id: Option<&str>,
        local_name: Option<&str>,
    ) -> SyncResult<Option<DuplicateConflict>> {
        if let Some(remote_id) = remote_id {
            if let Some(existing) = self.find_by_remote_id(remote_id)? {
                return Ok(Some(DuplicateConflict::new(DuplicateKey::RemoteId, existing)));
            }
        }
        if let Some(local_name) = local_name {
            if let Some(existing) = self.find_by_local_name(local_name)? {
                return Ok(Some(DuplicateConflict::new(DuplicateKey::LocalName, existing)));
            }
        }
        Ok(None)
    }

    /// Partial update of the indexing status; returns whether a record matched
    fn update_indexing_status(&self, remote_id: &str, status: &str) -> SyncResult<bool>;
}
