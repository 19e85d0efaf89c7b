//! Reconciliation Module
//!
//! Three-way merge of remote catalog, local files and sync records.

mod engine;
mod entry;

pub use engine::{HealAction, HealReason, Reconciler, Reconciliation, RemoteSnapshot};
pub use entry::{Capabilities, EntrySource, LocalSide, RemoteSide, UnifiedVideoEntry};
