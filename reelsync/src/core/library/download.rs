//! Streaming Download
//!
//! Copies a remote payload to disk in fixed-size chunks.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::sync::DuplicateConflict;
use crate::core::{LocalName, RemoteId, VideoProbe};

/// Bytes read from the remote stream per write
pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;

/// A request to materialize a remote video locally
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadRequest {
    pub remote_id: RemoteId,
    /// Direct media URL
    pub url: String,
    pub display_name: String,
    /// Status recorded on the new sync record
    pub indexing_status: Option<String>,
}

/// A successfully materialized video
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DownloadedVideo {
    pub remote_id: RemoteId,
    pub local_name: LocalName,
    pub path: PathBuf,
    pub display_name: String,
    pub bytes_downloaded: u64,
    pub probe: VideoProbe,
    pub indexing_status: Option<String>,
}

/// Terminal states of a download
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Completed(DownloadedVideo),
    /// A sync record already owns the remote id or the derived name
    Duplicate(DuplicateConflict),
    /// An untracked file already sits at the derived path
    FileExists { local_name: LocalName },
}

/// Stream `reader` into a new file at `path`
///
/// The file must not already exist. On any failure the partial file is
/// removed before the error is returned.
pub fn stream_to_file(reader: &mut dyn Read, path: &Path) -> std::io::Result<u64> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;

    match copy_chunks(reader, &mut file) {
        Ok(total) => Ok(total),
        Err(e) => {
            drop(file);
            if let Err(cleanup) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove partial download");
            }
            Err(e)
        }
    }
}

fn copy_chunks(reader: &mut dyn Read, file: &mut fs::File) -> std::io::Result<u64> {
    let mut buf = [0u8; DOWNLOAD_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        file.write_all(&buf[..n])?;
        total += n as u64;
    }

    file.sync_all()?;
    Ok(total)
}
