use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SyncEntryState;
use crate::ids::{ProjectId, SyncItemId};

/// One queued intent to mirror a local commit to the remote store.
///
/// The entry never owns the content: the payload is re-read from the
/// storage adapter at delivery time so a slow queue can never push stale
/// data. `payload_digest` only records what the local commit looked like
/// when the intent was enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueEntry {
    pub id: SyncItemId,
    pub project_id: ProjectId,
    pub payload_digest: String,
    pub state: SyncEntryState,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl SyncQueueEntry {
    pub fn new(project_id: ProjectId, payload_digest: String, now: DateTime<Utc>) -> Self {
        Self {
            id: SyncItemId::new(),
            project_id,
            payload_digest,
            state: SyncEntryState::Pending,
            attempts: 0,
            last_error: None,
            enqueued_at: now,
        }
    }

    /// Move the entry into `Syncing` and count the attempt. Returns false
    /// when the entry is not pending.
    pub fn begin_delivery(&mut self) -> bool {
        match self.state.start_delivery() {
            Some(next) => {
                self.state = next;
                self.attempts += 1;
                true
            }
            None => false,
        }
    }

    pub fn record_success(&mut self) {
        self.state = self.state.on_delivered(true);
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.state = self.state.on_delivered(false);
        self.last_error = Some(error.into());
    }

    /// Automatic retry: back to `Pending` while keeping the attempt count,
    /// so the retry bound still applies.
    pub fn requeue(&mut self) -> bool {
        match self.state.retry() {
            Some(next) => {
                self.state = next;
                true
            }
            None => false,
        }
    }

    /// Reset a parked entry for another delivery round, clearing the
    /// attempt counter.
    pub fn reset_for_retry(&mut self) -> bool {
        match self.state.retry() {
            Some(next) => {
                self.state = next;
                self.attempts = 0;
                self.last_error = None;
                true
            }
            None => false,
        }
    }
}

/// Aggregate queue status surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueStatus {
    pub pending: usize,
    pub syncing: usize,
    pub synced: usize,
    pub failed: usize,
    pub is_processing: bool,
    pub is_online: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> SyncQueueEntry {
        SyncQueueEntry::new(ProjectId::from("p1"), "digest".to_string(), Utc::now())
    }

    #[test]
    fn begin_delivery_counts_attempts() {
        let mut item = entry();
        assert!(item.begin_delivery());
        assert_eq!(item.attempts, 1);
        assert_eq!(item.state, SyncEntryState::Syncing);

        // Already syncing; a second begin is refused.
        assert!(!item.begin_delivery());
        assert_eq!(item.attempts, 1);
    }

    #[test]
    fn failure_records_the_error() {
        let mut item = entry();
        item.begin_delivery();
        item.record_failure("remote rejected");

        assert_eq!(item.state, SyncEntryState::Failed);
        assert_eq!(item.last_error.as_deref(), Some("remote rejected"));
    }

    #[test]
    fn requeue_keeps_the_attempt_count() {
        let mut item = entry();
        item.begin_delivery();
        item.record_failure("timeout");

        assert!(item.requeue());
        assert_eq!(item.state, SyncEntryState::Pending);
        assert_eq!(item.attempts, 1);
    }

    #[test]
    fn retry_clears_attempts_and_error() {
        let mut item = entry();
        item.begin_delivery();
        item.record_failure("network drop");

        assert!(item.reset_for_retry());
        assert_eq!(item.state, SyncEntryState::Pending);
        assert_eq!(item.attempts, 0);
        assert!(item.last_error.is_none());
    }

    #[test]
    fn success_clears_the_error_trail() {
        let mut item = entry();
        item.begin_delivery();
        item.record_failure("flaky");
        item.reset_for_retry();
        item.begin_delivery();
        item.record_success();

        assert_eq!(item.state, SyncEntryState::Synced);
        assert!(item.last_error.is_none());
    }
}
