//! Upload Directory Scanner
//!
//! Lists video files at the top level of the upload directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use super::{LocalInventory, LocalSnapshot, LocalVideo, MediaProber};
use crate::core::{is_video_file, CoreResult};

/// [`LocalInventory`] over a single flat directory
pub struct DirectoryInventory {
    root: PathBuf,
    prober: Box<dyn MediaProber>,
}

impl DirectoryInventory {
    pub fn new(root: impl Into<PathBuf>, prober: Box<dyn MediaProber>) -> Self {
        Self {
            root: root.into(),
            prober,
        }
    }

    fn describe(&self, path: &Path, local_name: String) -> Option<LocalVideo> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable file");
                return None;
            }
        };

        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        let (duration_sec, fps) = match self.prober.probe(path) {
            Ok(probe) => (probe.duration_sec, probe.fps),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Probe failed; reporting zero duration");
                (0.0, 0.0)
            }
        };

        Some(LocalVideo {
            local_name,
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
            modified,
            duration_sec,
            fps,
        })
    }
}

impl LocalInventory for DirectoryInventory {
    fn snapshot(&self) -> CoreResult<LocalSnapshot> {
        let mut snapshot = LocalSnapshot::new();

        if !self.root.is_dir() {
            return Ok(snapshot);
        }

        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry during scan");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if !is_video_file(name) {
                continue;
            }

            if let Some(video) = self.describe(entry.path(), name.to_string()) {
                snapshot.insert(video.local_name.clone(), video);
            }
        }

        Ok(snapshot)
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CoreError, VideoProbe};
    use std::fs;

    struct FixedProber(Option<VideoProbe>);

    impl MediaProber for FixedProber {
        fn probe(&self, path: &Path) -> CoreResult<VideoProbe> {
            self.0
                .clone()
                .ok_or_else(|| CoreError::VideoOpen(path.display().to_string()))
        }
    }

    fn inventory(root: &Path, probe: Option<VideoProbe>) -> DirectoryInventory {
        DirectoryInventory::new(root, Box::new(FixedProber(probe)))
    }

    #[test]
    fn test_snapshot_keeps_top_level_videos_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp4"), b"aaaa").unwrap();
        fs::write(dir.path().join("B.MKV"), b"bb").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.mp4"), b"c").unwrap();

        let snapshot = inventory(dir.path(), Some(VideoProbe::new(30.0, 300, 64, 36)))
            .snapshot()
            .unwrap();

        let names: Vec<_> = snapshot.keys().cloned().collect();
        assert_eq!(names, vec!["B.MKV".to_string(), "a.mp4".to_string()]);

        let a = &snapshot["a.mp4"];
        assert_eq!(a.size_bytes, 4);
        assert_eq!(a.duration_sec, 10.0);
        assert_eq!(a.fps, 30.0);
        assert!(a.modified.is_some());
    }

    #[test]
    fn test_probe_failure_reports_zero() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.mov"), b"not a video").unwrap();

        let snapshot = inventory(dir.path(), None).snapshot().unwrap();
        let broken = &snapshot["broken.mov"];
        assert_eq!(broken.duration_sec, 0.0);
        assert_eq!(broken.fps, 0.0);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = inventory(&dir.path().join("missing"), None)
            .snapshot()
            .unwrap();
        assert!(snapshot.is_empty());
    }
}
