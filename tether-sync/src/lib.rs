//! Tether Sync - Sync Coordinator
//!
//! Caches the last known state of every collection the controller shows
//! and keeps it consistent with the store: refreshes never clear a
//! populated collection on failure, and mutations reread the collection
//! they affect only after the store confirmed the write.

pub mod cache;
pub mod coordinator;
pub mod event;

pub use cache::{Cached, LoadState};
pub use coordinator::{SyncCoordinator, COMMAND_LOG_CAPACITY};
pub use event::{Collection, Snapshot, SyncEvent};
