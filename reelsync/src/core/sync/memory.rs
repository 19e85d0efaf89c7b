//! In-Memory Sync Store
//!
//! Non-durable [`SyncStore`] with the same uniqueness rules as the SQLite
//! store. Counts mutations and can be told to fail writes, which makes it the
//! store of choice for reconciliation tests.

use std::cell::{Cell, RefCell};

use chrono::Utc;

use super::{
    DuplicateConflict, DuplicateKey, NewSyncRecord, SyncError, SyncRecord, SyncResult, SyncStore,
};

#[derive(Default)]
pub struct MemorySyncStore {
    records: RefCell<Vec<SyncRecord>>,
    next_id: Cell<i64>,
    mutations: Cell<usize>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl MemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes (upserts, deletes and status updates that matched)
    pub fn mutation_count(&self) -> usize {
        self.mutations.get()
    }

    /// Make every subsequent write fail with a storage error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Make every subsequent read fail with a storage error
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    fn guard_read(&self) -> SyncResult<()> {
        if self.fail_reads.get() {
            return Err(SyncError::Storage("simulated read failure".to_string()));
        }
        Ok(())
    }

    fn guard_write(&self) -> SyncResult<()> {
        if self.fail_writes.get() {
            return Err(SyncError::Storage("simulated write failure".to_string()));
        }
        Ok(())
    }

    fn bump(&self) {
        self.mutations.set(self.mutations.get() + 1);
    }

    fn find<F>(&self, predicate: F) -> SyncResult<Option<SyncRecord>>
    where
        F: Fn(&SyncRecord) -> bool,
    {
        self.guard_read()?;
        Ok(self.records.borrow().iter().find(|r| predicate(r)).cloned())
    }

    fn remove<F>(&self, predicate: F) -> SyncResult<bool>
    where
        F: Fn(&SyncRecord) -> bool,
    {
        self.guard_write()?;
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|r| !predicate(r));
        let removed = records.len() != before;
        if removed {
            self.bump();
        }
        Ok(removed)
    }
}

impl SyncStore for MemorySyncStore {
    fn initialize(&self) -> SyncResult<()> {
        Ok(())
    }

    fn upsert(&self, record: &NewSyncRecord) -> SyncResult<SyncRecord> {
        self.guard_write()?;
        let mut records = self.records.borrow_mut();

        if let Some(owner) = records
            .iter()
            .find(|r| r.local_name == record.local_name && r.remote_id != record.remote_id)
        {
            return Err(SyncError::Duplicate(DuplicateConflict::new(
                DuplicateKey::LocalName,
                owner.clone(),
            )));
        }

        let now = Utc::now();
        let saved = match records.iter_mut().find(|r| r.remote_id == record.remote_id) {
            Some(existing) => {
                let created_at = existing.created_at;
                let id = existing.id;
                *existing = SyncRecord {
                    created_at,
                    ..SyncRecord::from_new(id, record, now)
                };
                existing.clone()
            }
            None => {
                let id = self.next_id.get() + 1;
                self.next_id.set(id);
                let created = SyncRecord::from_new(id, record, now);
                records.push(created.clone());
                created
            }
        };

        self.bump();
        Ok(saved)
    }

    fn find_by_remote_id(&self, remote_id: &str) -> SyncResult<Option<SyncRecord>> {
        self.find(|r| r.remote_id == remote_id)
    }

    fn find_by_local_name(&self, local_name: &str) -> SyncResult<Option<SyncRecord>> {
        self.find(|r| r.local_name == local_name)
    }

    fn list_all(&self) -> SyncResult<Vec<SyncRecord>> {
        self.guard_read()?;
        let mut records = self.records.borrow().clone();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    fn delete_by_remote_id(&self, remote_id: &str) -> SyncResult<bool> {
        self.remove(|r| r.remote_id == remote_id)
    }

    fn delete_by_local_name(&self, local_name: &str) -> SyncResult<bool> {
        self.remove(|r| r.local_name == local_name)
    }

    fn update_indexing_status(&self, remote_id: &str, status: &str) -> SyncResult<bool> {
        self.guard_write()?;
        let mut records = self.records.borrow_mut();
        match records.iter_mut().find(|r| r.remote_id == remote_id) {
            Some(record) => {
                record.indexing_status = Some(status.to_string());
                record.updated_at = Utc::now();
                self.bump();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_only_effective_mutations() {
        let store = MemorySyncStore::new();
        store
            .upsert(&NewSyncRecord::synced("r1", "one.mp4", "One"))
            .unwrap();
        assert!(!store.delete_by_remote_id("missing").unwrap());
        assert!(!store.update_indexing_status("missing", "indexed").unwrap());
        assert_eq!(store.mutation_count(), 1);

        assert!(store.delete_by_local_name("one.mp4").unwrap());
        assert_eq!(store.mutation_count(), 2);
    }

    #[test]
    fn test_upsert_keeps_id_and_created_at() {
        let store = MemorySyncStore::new();
        let first = store
            .upsert(&NewSyncRecord::synced("r1", "one.mp4", "One"))
            .unwrap();
        let second = store
            .upsert(&NewSyncRecord::synced("r1", "one.mp4", "One again"))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.display_name, "One again");
    }

    #[test]
    fn test_local_name_collision() {
        let store = MemorySyncStore::new();
        store
            .upsert(&NewSyncRecord::synced("r1", "one.mp4", "One"))
            .unwrap();
        let err = store
            .upsert(&NewSyncRecord::synced("r2", "one.mp4", "Other"))
            .unwrap_err();
        assert!(matches!(err, SyncError::Duplicate(_)));
    }

    #[test]
    fn test_simulated_failures() {
        let store = MemorySyncStore::new();
        store.set_fail_writes(true);
        assert!(store
            .upsert(&NewSyncRecord::synced("r1", "one.mp4", "One"))
            .is_err());

        store.set_fail_reads(true);
        assert!(store.list_all().is_err());
        assert_eq!(store.mutation_count(), 0);
    }
}
