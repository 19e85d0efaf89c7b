//! ReelSync Core Engine
//!
//! Sync store, remote catalog client, local inventory, reconciliation,
//! the video library service, and frame extraction.

pub mod ffmpeg;
pub mod frames;
pub mod inventory;
pub mod library;
pub mod reconcile;
pub mod remote;
pub mod settings;
pub mod sync;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
