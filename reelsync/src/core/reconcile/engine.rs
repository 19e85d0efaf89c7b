//! Reconciliation Engine
//!
//! Merges the sync store, the remote catalog and the local inventory into a
//! single listing, deleting sync records that no longer describe reality.
//!
//! Healing deletions are best-effort: a failure is logged and recorded in
//! [`Reconciliation::healed`], and the same record is healed again on the
//! next pass.

use std::collections::BTreeSet;

use serde::Serialize;

use super::{Capabilities, EntrySource, LocalSide, RemoteSide, UnifiedVideoEntry};
use crate::core::inventory::LocalSnapshot;
use crate::core::remote::{RemoteCatalogSnapshot, RemoteError};
use crate::core::sync::{SyncRecord, SyncStore};
use crate::core::{LocalName, RemoteId, UNKNOWN_STATUS};

/// The remote side as fetched; a failed fetch is a valid input
pub type RemoteSnapshot = Result<RemoteCatalogSnapshot, RemoteError>;

/// Why a sync record was deleted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealReason {
    /// The local file was removed outside the system
    LocalMissing,
    /// The remote video was removed outside the system
    RemoteMissing,
    /// Neither side exists any more
    BothMissing,
}

/// A corrective deletion attempted during reconciliation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealAction {
    pub remote_id: RemoteId,
    pub local_name: LocalName,
    pub reason: HealReason,
    pub succeeded: bool,
}

/// Result of one reconciliation pass
#[derive(Clone, Debug, Default, Serialize)]
pub struct Reconciliation {
    pub entries: Vec<UnifiedVideoEntry>,
    /// Set when the remote catalog could not be fetched
    pub remote_error: Option<String>,
    pub healed: Vec<HealAction>,
}

/// Runs reconciliation passes against an injected sync store
pub struct Reconciler<'a> {
    store: &'a dyn SyncStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn SyncStore) -> Self {
        Self { store }
    }

    /// One deterministic pass over the three sources
    pub fn reconcile(&self, remote: RemoteSnapshot, local: &LocalSnapshot) -> Reconciliation {
        let (remote, remote_error) = match remote {
            Ok(snapshot) => (Some(snapshot), None),
            Err(e) => {
                tracing::warn!(error = %e, "Remote catalog unavailable; listing local files only");
                (None, Some(e.to_string()))
            }
        };

        let records = self.store.list_all().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to list sync records; treating store as empty");
            Vec::new()
        });

        let mut result = Reconciliation {
            remote_error,
            ..Reconciliation::default()
        };
        let mut claimed_remote: BTreeSet<&str> = BTreeSet::new();
        let mut claimed_local: BTreeSet<&str> = BTreeSet::new();

        for record in &records {
            let local_video = local.get(&record.local_name);

            let Some(remote) = remote.as_ref() else {
                // Remote absence is unknowable; only local absence can be acted on
                if local_video.is_none() {
                    result
                        .healed
                        .push(self.heal(record, HealReason::LocalMissing));
                }
                continue;
            };

            match (remote.get(&record.remote_id), local_video) {
                (Some(remote_video), Some(local_video)) => {
                    // Remote status is authoritative; the record fills in when it is missing
                    let indexing_status = if remote_video.indexing_status == UNKNOWN_STATUS {
                        record
                            .indexing_status
                            .clone()
                            .unwrap_or_else(|| UNKNOWN_STATUS.to_string())
                    } else {
                        remote_video.indexing_status.clone()
                    };

                    result.entries.push(UnifiedVideoEntry {
                        id: record.remote_id.clone(),
                        name: record.display_name.clone(),
                        source: EntrySource::Synced,
                        remote: Some(RemoteSide {
                            video_id: record.remote_id.clone(),
                            url: record.remote_url.clone().or(remote_video.url.clone()),
                            indexing_status: indexing_status.clone(),
                        }),
                        local: Some(LocalSide::from(local_video)),
                        capabilities: Capabilities::synced(&indexing_status),
                    });
                    claimed_remote.insert(&record.remote_id);
                    claimed_local.insert(&record.local_name);
                }
                (Some(_), None) => {
                    result
                        .healed
                        .push(self.heal(record, HealReason::LocalMissing));
                }
                (None, Some(_)) => {
                    result
                        .healed
                        .push(self.heal(record, HealReason::RemoteMissing));
                }
                (None, None) => {
                    result
                        .healed
                        .push(self.heal(record, HealReason::BothMissing));
                }
            }
        }

        if let Some(remote) = remote.as_ref() {
            result.entries.extend(
                remote
                    .values()
                    .filter(|v| !claimed_remote.contains(v.video_id.as_str()))
                    .map(UnifiedVideoEntry::remote_only),
            );
        }

        result.entries.extend(
            local
                .values()
                .filter(|v| !claimed_local.contains(v.local_name.as_str()))
                .map(UnifiedVideoEntry::local_only),
        );

        result.entries.sort_by(UnifiedVideoEntry::listing_order);

        tracing::debug!(
            entries = result.entries.len(),
            healed = result.healed.len(),
            "Reconciliation complete"
        );
        result
    }

    fn heal(&self, record: &SyncRecord, reason: HealReason) -> HealAction {
        let deleted = match reason {
            HealReason::RemoteMissing => self.store.delete_by_local_name(&record.local_name),
            HealReason::LocalMissing | HealReason::BothMissing => {
                self.store.delete_by_remote_id(&record.remote_id)
            }
        };

        let succeeded = match deleted {
            Ok(_) => {
                tracing::info!(
                    remote_id = %record.remote_id,
                    local_name = %record.local_name,
                    reason = ?reason,
                    "Removed stale sync record"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    remote_id = %record.remote_id,
                    local_name = %record.local_name,
                    error = %e,
                    "Failed to remove stale sync record; will retry on next listing"
                );
                false
            }
        };

        HealAction {
            remote_id: record.remote_id.clone(),
            local_name: record.local_name.clone(),
            reason,
            succeeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inventory::LocalVideo;
    use crate::core::remote::RemoteVideo;
    use crate::core::sync::{MemorySyncStore, NewSyncRecord};
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn remote(videos: &[RemoteVideo]) -> RemoteSnapshot {
        Ok(videos
            .iter()
            .map(|v| (v.video_id.clone(), v.clone()))
            .collect())
    }

    fn local(names: &[&str]) -> LocalSnapshot {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let video = LocalVideo {
                    local_name: name.to_string(),
                    path: PathBuf::from("/videos").join(name),
                    size_bytes: 1024,
                    modified: Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, i as u32, 0).unwrap()),
                    duration_sec: 10.0,
                    fps: 30.0,
                };
                (name.to_string(), video)
            })
            .collect()
    }

    fn store_with(records: &[(&str, &str, &str)]) -> MemorySyncStore {
        let store = MemorySyncStore::new();
        for (remote_id, local_name, name) in records {
            store
                .upsert(&NewSyncRecord::synced(remote_id, local_name, name))
                .unwrap();
        }
        store
    }

    fn find<'e>(result: &'e Reconciliation, id: &str) -> &'e UnifiedVideoEntry {
        result.entries.iter().find(|e| e.id == id).unwrap()
    }

    #[test]
    fn test_synced_entry_merges_both_sides() {
        let store = store_with(&[("r1", "intro_r1.mp4", "Intro")]);
        let result = Reconciler::new(&store).reconcile(
            remote(&[RemoteVideo::new("r1", "Remote Name")
                .with_status("indexed")
                .with_url("https://cdn/r1.mp4")]),
            &local(&["intro_r1.mp4"]),
        );

        assert_eq!(result.entries.len(), 1);
        let entry = find(&result, "r1");
        assert_eq!(entry.source, EntrySource::Synced);
        assert_eq!(entry.name, "Intro");
        assert_eq!(
            entry.remote.as_ref().unwrap().url.as_deref(),
            Some("https://cdn/r1.mp4")
        );
        assert_eq!(entry.local.as_ref().unwrap().local_name, "intro_r1.mp4");
        assert!(entry.capabilities.can_select);
        assert!(!entry.capabilities.can_download);
        assert!(result.healed.is_empty());
    }

    #[test]
    fn test_three_way_classification() {
        let store = store_with(&[("r1", "one_r1.mp4", "One")]);
        let result = Reconciler::new(&store).reconcile(
            remote(&[
                RemoteVideo::new("r1", "One").with_status("indexed"),
                RemoteVideo::new("r2", "Two").with_status("indexed"),
            ]),
            &local(&["one_r1.mp4", "loose.mov"]),
        );

        assert_eq!(result.entries.len(), 3);
        assert_eq!(find(&result, "r1").source, EntrySource::Synced);
        assert_eq!(find(&result, "r2").source, EntrySource::RemoteOnly);
        assert!(find(&result, "r2").capabilities.can_download);
        assert_eq!(find(&result, "loose.mov").source, EntrySource::LocalOnly);
    }

    #[test]
    fn test_drift_correction_local_file_removed() {
        let store = store_with(&[("r1", "gone_r1.mp4", "Gone")]);
        let result = Reconciler::new(&store).reconcile(
            remote(&[RemoteVideo::new("r1", "Gone").with_status("indexed")]),
            &local(&[]),
        );

        assert!(store.find_by_remote_id("r1").unwrap().is_none());
        assert_eq!(result.healed.len(), 1);
        assert_eq!(result.healed[0].reason, HealReason::LocalMissing);
        assert!(result.healed[0].succeeded);

        let entry = find(&result, "r1");
        assert_eq!(entry.source, EntrySource::RemoteOnly);
        assert!(entry.capabilities.can_download);
    }

    #[test]
    fn test_drift_correction_remote_video_removed() {
        let store = store_with(&[("r1", "kept_r1.mp4", "Kept")]);
        let result =
            Reconciler::new(&store).reconcile(remote(&[]), &local(&["kept_r1.mp4"]));

        assert!(store.find_by_local_name("kept_r1.mp4").unwrap().is_none());
        assert_eq!(result.healed[0].reason, HealReason::RemoteMissing);
        assert_eq!(find(&result, "kept_r1.mp4").source, EntrySource::LocalOnly);
    }

    #[test]
    fn test_orphaned_record_removed() {
        let store = store_with(&[("r1", "x_r1.mp4", "X")]);
        let result = Reconciler::new(&store).reconcile(remote(&[]), &local(&[]));

        assert!(result.entries.is_empty());
        assert_eq!(result.healed[0].reason, HealReason::BothMissing);
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let store = store_with(&[
            ("r1", "one_r1.mp4", "One"),
            ("r2", "two_r2.mp4", "Two"),
            ("r3", "three_r3.mp4", "Three"),
        ]);
        let remote_videos = [
            RemoteVideo::new("r1", "One").with_status("indexed"),
            RemoteVideo::new("r2", "Two").with_status("indexing"),
            RemoteVideo::new("r4", "Four"),
        ];
        let local_files = local(&["one_r1.mp4", "three_r3.mp4", "solo.mp4"]);

        let reconciler = Reconciler::new(&store);
        let first = reconciler.reconcile(remote(&remote_videos), &local_files);
        let after_first = store.mutation_count();
        assert_eq!(first.healed.len(), 2);

        let second = reconciler.reconcile(remote(&remote_videos), &local_files);
        assert_eq!(store.mutation_count(), after_first);
        assert!(second.healed.is_empty());
        assert_eq!(first.entries, second.entries);
    }

    #[test]
    fn test_remote_failure_degrades_to_local_view() {
        let store = store_with(&[("r1", "one_r1.mp4", "One"), ("r2", "gone_r2.mp4", "Gone")]);
        let result = Reconciler::new(&store).reconcile(
            Err(RemoteError::Request("connection refused".to_string())),
            &local(&["one_r1.mp4", "solo.mp4"]),
        );

        assert!(result.remote_error.unwrap().contains("connection refused"));
        assert_eq!(result.entries.len(), 2);
        assert!(result
            .entries
            .iter()
            .all(|e| e.source == EntrySource::LocalOnly));

        // Record with a present local file survives; the one without is healed
        assert!(store.find_by_remote_id("r1").unwrap().is_some());
        assert!(store.find_by_remote_id("r2").unwrap().is_none());
    }

    #[test]
    fn test_failed_heal_does_not_abort_listing() {
        let store = store_with(&[("r1", "gone_r1.mp4", "Gone")]);
        store.set_fail_writes(true);

        let result = Reconciler::new(&store).reconcile(
            remote(&[RemoteVideo::new("r1", "Gone")]),
            &local(&["other.mp4"]),
        );

        assert_eq!(result.healed.len(), 1);
        assert!(!result.healed[0].succeeded);
        assert_eq!(result.entries.len(), 2);
        assert!(store.find_by_remote_id("r1").unwrap().is_some());
    }

    #[test]
    fn test_store_read_failure_lists_everything_unsynced() {
        let store = store_with(&[("r1", "one_r1.mp4", "One")]);
        store.set_fail_reads(true);

        let result = Reconciler::new(&store).reconcile(
            remote(&[RemoteVideo::new("r1", "One")]),
            &local(&["one_r1.mp4"]),
        );

        assert_eq!(find(&result, "r1").source, EntrySource::RemoteOnly);
        assert_eq!(find(&result, "one_r1.mp4").source, EntrySource::LocalOnly);
    }

    #[test]
    fn test_remote_status_is_authoritative() {
        let store = MemorySyncStore::new();
        store
            .upsert(
                &NewSyncRecord::synced("r1", "one_r1.mp4", "One")
                    .with_indexing_status(Some("indexing".to_string())),
            )
            .unwrap();
        store
            .upsert(
                &NewSyncRecord::synced("r2", "two_r2.mp4", "Two")
                    .with_indexing_status(Some("indexed".to_string())),
            )
            .unwrap();

        let result = Reconciler::new(&store).reconcile(
            remote(&[
                RemoteVideo::new("r1", "One").with_status("indexed"),
                RemoteVideo::new("r2", "Two"),
            ]),
            &local(&["one_r1.mp4", "two_r2.mp4"]),
        );

        let one = find(&result, "r1");
        assert_eq!(one.remote.as_ref().unwrap().indexing_status, "indexed");
        assert!(one.capabilities.can_select);

        // Remote omitted a status, so the stored one is shown
        let two = find(&result, "r2");
        assert_eq!(two.remote.as_ref().unwrap().indexing_status, "indexed");
    }
}
