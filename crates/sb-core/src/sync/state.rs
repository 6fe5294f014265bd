use serde::{Deserialize, Serialize};

/// Per-entry delivery state machine for the background sync queue.
///
/// This is a pure type state machine with only state definitions and
/// transition validation. Runtime behaviors like backoff delays and attempt
/// counting are handled by the application layer (sb-app).
///
/// State transitions:
///
/// ```text
/// Pending ──(dequeued, online)──→ Syncing ──(remote ack)──→ Synced
///    ▲                               │
///    └────────(retry)── Failed ◄─────┘ (remote reject / network drop)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncEntryState {
    /// Waiting for delivery.
    Pending,

    /// Delivery in flight.
    Syncing,

    /// Remote store acknowledged the write. Prunable on demand.
    Synced,

    /// Delivery attempts exhausted; parked until an explicit retry.
    Failed,
}

impl SyncEntryState {
    /// Terminal until an explicit retry (`Failed`) or pruning (`Synced`).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Synced | Self::Failed)
    }

    pub fn is_active(self) -> bool {
        self == Self::Syncing
    }

    /// Begin a delivery attempt.
    pub fn start_delivery(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Syncing),
            _ => None,
        }
    }

    /// Transition after the delivery attempt resolves.
    pub fn on_delivered(self, success: bool) -> Self {
        match self {
            Self::Syncing if success => Self::Synced,
            Self::Syncing => Self::Failed,
            _ => self,
        }
    }

    /// Explicit or automatic retry of a failed entry.
    pub fn retry(self) -> Option<Self> {
        match self {
            Self::Failed => Some(Self::Pending),
            _ => None,
        }
    }
}

impl Default for SyncEntryState {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_flow() {
        let mut state = SyncEntryState::Pending;

        state = state.start_delivery().unwrap();
        assert_eq!(state, SyncEntryState::Syncing);
        assert!(state.is_active());

        state = state.on_delivered(true);
        assert_eq!(state, SyncEntryState::Synced);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_failed_delivery_parks_entry() {
        let state = SyncEntryState::Syncing;
        let failed = state.on_delivered(false);

        assert_eq!(failed, SyncEntryState::Failed);
        assert!(failed.is_terminal());
    }

    #[test]
    fn test_retry_resets_failed_to_pending() {
        let state = SyncEntryState::Failed;
        assert_eq!(state.retry(), Some(SyncEntryState::Pending));
    }

    #[test]
    fn test_invalid_transitions() {
        // Only pending entries can start delivering.
        assert!(SyncEntryState::Syncing.start_delivery().is_none());
        assert!(SyncEntryState::Synced.start_delivery().is_none());

        // Only failed entries can be retried.
        assert!(SyncEntryState::Pending.retry().is_none());
        assert!(SyncEntryState::Synced.retry().is_none());
    }

    #[test]
    fn test_serialized_form_is_lowercase() {
        let json = serde_json::to_string(&SyncEntryState::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }
}
