//! Sync queue domain types: the per-entry state machine and queue entries.

mod entry;
mod state;

pub use entry::{SyncQueueEntry, SyncQueueStatus};
pub use state::SyncEntryState;
