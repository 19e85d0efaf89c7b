//! ReelSync Core Library
//!
//! Keeps a remote video catalog, a local video directory, and a persisted
//! mapping between the two consistent, and extracts representative still
//! frames from local videos.
//!
//! All business logic lives in [`core`]. Concrete adapters (SQLite, HTTP,
//! FFmpeg) sit behind traits so the reconciliation engine and the frame
//! extractors can be driven by test doubles.

pub mod core;
