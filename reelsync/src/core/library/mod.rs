//! Video Library Module
//!
//! Listing, download, upload and deletion flows built on the sync store,
//! the remote catalog and the local inventory.

mod download;
mod filename;
mod service;

pub use download::{
    stream_to_file, DownloadOutcome, DownloadRequest, DownloadedVideo, DOWNLOAD_CHUNK_SIZE,
};
pub use filename::{sanitize_filename, MAX_NAME_PREFIX};
pub(crate) use filename::validate_file_component;
pub use service::{
    LocalDeletion, LocalVideoDetails, RemoteDeletion, RemoteStatus, UploadOutcome, VideoLibrary,
};
