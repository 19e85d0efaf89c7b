//! SQLite Sync Store
//!
//! Durable [`SyncStore`] backed by a single `video_sync` table.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    DuplicateConflict, DuplicateKey, NewSyncRecord, SyncError, SyncRecord, SyncResult,
    SyncStatus, SyncStore,
};

const SELECT_COLUMNS: &str = "id, remote_id, local_name, display_name, remote_url, \
     sync_status, indexing_status, created_at, updated_at";

// =============================================================================
// SQLite Store
// =============================================================================

/// Sync mapping persisted in SQLite
pub struct SqliteSyncStore {
    conn: Connection,
}

impl SqliteSyncStore {
    /// Opens (or creates) the database at `path` and ensures the schema exists
    pub fn open<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SyncError::Storage(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| SyncError::Storage(format!("Failed to open sync database: {}", e)))?;

        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory database (for testing)
    pub fn in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            SyncError::Storage(format!("Failed to create in-memory database: {}", e))
        })?;

        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// Closes the connection, surfacing any error from the final flush
    pub fn close(self) -> SyncResult<()> {
        self.conn
            .close()
            .map_err(|(_, e)| SyncError::Storage(format!("Failed to close sync database: {}", e)))
    }

    fn find_by(&self, column: &str, value: &str) -> SyncResult<Option<SyncRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM video_sync WHERE {column} = ?1");
        self.conn
            .query_row(&sql, [value], row_to_record)
            .optional()
            .map_err(storage_error)
    }

    fn delete_by(&self, column: &str, value: &str) -> SyncResult<bool> {
        let sql = format!("DELETE FROM video_sync WHERE {column} = ?1");
        let affected = self.conn.execute(&sql, [value]).map_err(storage_error)?;
        Ok(affected > 0)
    }
}

impl SyncStore for SqliteSyncStore {
    fn initialize(&self) -> SyncResult<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS video_sync (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    remote_id TEXT NOT NULL UNIQUE,
                    local_name TEXT NOT NULL UNIQUE,
                    display_name TEXT NOT NULL,
                    remote_url TEXT,
                    sync_status TEXT NOT NULL DEFAULT 'synced',
                    indexing_status TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_video_sync_remote ON video_sync(remote_id);
                CREATE INDEX IF NOT EXISTS idx_video_sync_local ON video_sync(local_name);
                CREATE INDEX IF NOT EXISTS idx_video_sync_status ON video_sync(sync_status);
                "#,
            )
            .map_err(|e| SyncError::Storage(format!("Failed to initialize schema: {}", e)))
    }

    fn upsert(&self, record: &NewSyncRecord) -> SyncResult<SyncRecord> {
        // The local_name index would reject this anyway; checking first lets us
        // report which record owns the name.
        if let Some(existing) = self.find_by_local_name(&record.local_name)? {
            if existing.remote_id != record.remote_id {
                return Err(SyncError::Duplicate(DuplicateConflict::new(
                    DuplicateKey::LocalName,
                    existing,
                )));
            }
        }

        let now = format_timestamp(Utc::now());
        self.conn
            .execute(
                "INSERT INTO video_sync
                    (remote_id, local_name, display_name, remote_url, sync_status,
                     indexing_status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(remote_id) DO UPDATE SET
                    local_name = excluded.local_name,
                    display_name = excluded.display_name,
                    remote_url = excluded.remote_url,
                    sync_status = excluded.sync_status,
                    indexing_status = excluded.indexing_status,
                    updated_at = excluded.updated_at",
                params![
                    record.remote_id,
                    record.local_name,
                    record.display_name,
                    record.remote_url,
                    record.sync_status.as_str(),
                    record.indexing_status,
                    now,
                ],
            )
            .map_err(|e| match e.sqlite_error_code() {
                Some(rusqlite::ErrorCode::ConstraintViolation) => {
                    match self.find_by_local_name(&record.local_name) {
                        Ok(Some(existing)) => SyncError::Duplicate(DuplicateConflict::new(
                            DuplicateKey::LocalName,
                            existing,
                        )),
                        _ => storage_error(e),
                    }
                }
                _ => storage_error(e),
            })?;

        self.find_by_remote_id(&record.remote_id)?.ok_or_else(|| {
            SyncError::Storage(format!(
                "Record for {} vanished after upsert",
                record.remote_id
            ))
        })
    }

    fn find_by_remote_id(&self, remote_id: &str) -> SyncResult<Option<SyncRecord>> {
        self.find_by("remote_id", remote_id)
    }

    fn find_by_local_name(&self, local_name: &str) -> SyncResult<Option<SyncRecord>> {
        self.find_by("local_name", local_name)
    }

    fn list_all(&self) -> SyncResult<Vec<SyncRecord>> {
        let sql =
            format!("SELECT {SELECT_COLUMNS} FROM video_sync ORDER BY updated_at DESC, id DESC");
        let mut stmt = self.conn.prepare(&sql).map_err(storage_error)?;
        let records = stmt
            .query_map([], row_to_record)
            .map_err(storage_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_error)?;
        Ok(records)
    }

    fn delete_by_remote_id(&self, remote_id: &str) -> SyncResult<bool> {
        self.delete_by("remote_id", remote_id)
    }

    fn delete_by_local_name(&self, local_name: &str) -> SyncResult<bool> {
        self.delete_by("local_name", local_name)
    }

    fn update_indexing_status(&self, remote_id: &str, status: &str) -> SyncResult<bool> {
        let affected = self
            .conn
            .execute(
                "UPDATE video_sync SET indexing_status = ?1, updated_at = ?2 WHERE remote_id = ?3",
                params![status, format_timestamp(Utc::now()), remote_id],
            )
            .map_err(storage_error)?;
        Ok(affected > 0)
    }
}

// =============================================================================
// Row Helpers
// =============================================================================

fn storage_error(e: rusqlite::Error) -> SyncError {
    SyncError::Storage(e.to_string())
}

/// Fixed-width UTC text so lexical order matches chronological order
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncRecord> {
    let status: String = row.get(5)?;
    let sync_status = status.parse::<SyncStatus>().unwrap_or_default();

    Ok(SyncRecord {
        id: row.get(0)?,
        remote_id: row.get(1)?,
        local_name: row.get(2)?,
        display_name: row.get(3)?,
        remote_url: row.get(4)?,
        sync_status,
        indexing_status: row.get(6)?,
        created_at: parse_timestamp(7, row.get(7)?)?,
        updated_at: parse_timestamp(8, row.get(8)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(remote_id: &str, local_name: &str) -> NewSyncRecord {
        NewSyncRecord::synced(remote_id, local_name, &format!("Video {}", remote_id))
    }

    #[test]
    fn test_upsert_and_find() {
        let store = SqliteSyncStore::in_memory().unwrap();
        let saved = store
            .upsert(&record("r1", "a_r1.mp4").with_remote_url(Some("https://x/r1".into())))
            .unwrap();

        assert_eq!(saved.remote_id, "r1");
        assert_eq!(saved.sync_status, SyncStatus::Synced);

        let by_remote = store.find_by_remote_id("r1").unwrap().unwrap();
        assert_eq!(by_remote.local_name, "a_r1.mp4");
        assert_eq!(by_remote.remote_url.as_deref(), Some("https://x/r1"));

        let by_local = store.find_by_local_name("a_r1.mp4").unwrap().unwrap();
        assert_eq!(by_local.id, saved.id);
    }

    #[test]
    fn test_find_missing_is_none() {
        let store = SqliteSyncStore::in_memory().unwrap();
        assert!(store.find_by_remote_id("nope").unwrap().is_none());
        assert!(store.find_by_local_name("nope.mp4").unwrap().is_none());
    }

    #[test]
    fn test_upsert_updates_existing_remote_id() {
        let store = SqliteSyncStore::in_memory().unwrap();
        let first = store.upsert(&record("r1", "a_r1.mp4")).unwrap();
        let second = store
            .upsert(
                &record("r1", "renamed_r1.mp4").with_indexing_status(Some("indexed".to_string())),
            )
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.local_name, "renamed_r1.mp4");
        assert_eq!(store.list_all().unwrap().len(), 1);
        assert!(store.find_by_local_name("a_r1.mp4").unwrap().is_none());
    }

    #[test]
    fn test_upsert_rejects_local_name_owned_by_other_remote() {
        let store = SqliteSyncStore::in_memory().unwrap();
        store.upsert(&record("r1", "shared.mp4")).unwrap();

        let err = store.upsert(&record("r2", "shared.mp4")).unwrap_err();
        match err {
            SyncError::Duplicate(conflict) => {
                assert_eq!(conflict.key, DuplicateKey::LocalName);
                assert_eq!(conflict.existing.remote_id, "r1");
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert!(store.find_by_remote_id("r2").unwrap().is_none());
    }

    #[test]
    fn test_list_all_most_recent_first() {
        let store = SqliteSyncStore::in_memory().unwrap();
        store.upsert(&record("r1", "one.mp4")).unwrap();
        store.upsert(&record("r2", "two.mp4")).unwrap();
        store.upsert(&record("r3", "three.mp4")).unwrap();
        // Touch r1 so it becomes the newest
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.update_indexing_status("r1", "indexed").unwrap();

        let ids: Vec<_> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.remote_id)
            .collect();
        assert_eq!(ids[0], "r1");
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_delete_reports_affected() {
        let store = SqliteSyncStore::in_memory().unwrap();
        store.upsert(&record("r1", "one.mp4")).unwrap();
        store.upsert(&record("r2", "two.mp4")).unwrap();

        assert!(store.delete_by_remote_id("r1").unwrap());
        assert!(!store.delete_by_remote_id("r1").unwrap());
        assert!(store.delete_by_local_name("two.mp4").unwrap());
        assert!(!store.delete_by_local_name("two.mp4").unwrap());
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_check_duplicate_prefers_remote_id() {
        let store = SqliteSyncStore::in_memory().unwrap();
        store.upsert(&record("r1", "one.mp4")).unwrap();
        store.upsert(&record("r2", "two.mp4")).unwrap();

        let conflict = store
            .check_duplicate(Some("r1"), Some("two.mp4"))
            .unwrap()
            .unwrap();
        assert_eq!(conflict.key, DuplicateKey::RemoteId);
        assert_eq!(conflict.existing.local_name, "one.mp4");

        let conflict = store
            .check_duplicate(Some("r9"), Some("two.mp4"))
            .unwrap()
            .unwrap();
        assert_eq!(conflict.key, DuplicateKey::LocalName);

        assert!(store.check_duplicate(Some("r9"), None).unwrap().is_none());
        assert!(store.check_duplicate(None, None).unwrap().is_none());
    }

    #[test]
    fn test_update_indexing_status() {
        let store = SqliteSyncStore::in_memory().unwrap();
        store.upsert(&record("r1", "one.mp4")).unwrap();

        assert!(store.update_indexing_status("r1", "indexed").unwrap());
        assert!(!store.update_indexing_status("missing", "indexed").unwrap());

        let saved = store.find_by_remote_id("r1").unwrap().unwrap();
        assert_eq!(saved.indexing_status.as_deref(), Some("indexed"));
    }

    #[test]
    fn test_open_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sync.db");

        let store = SqliteSyncStore::open(&path).unwrap();
        store.upsert(&record("r1", "one.mp4")).unwrap();
        store.close().unwrap();

        let reopened = SqliteSyncStore::open(&path).unwrap();
        assert!(reopened.find_by_remote_id("r1").unwrap().is_some());
    }
}
