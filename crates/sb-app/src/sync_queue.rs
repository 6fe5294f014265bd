//! Background sync queue.
//!
//! At-least-once mirroring of locally-committed projects to the remote
//! store. The queue owns only the intent to replicate: the payload is
//! re-read from the storage adapter at delivery time, so the remote copy
//! can never be staler than the local one it mirrors. A failed delivery
//! never touches the local copy; the worst outcome is "not yet synced",
//! recoverable by retry once online.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use sb_core::ids::{ProjectId, SyncItemId};
use sb_core::ports::{ClockPort, NetworkEvent, NetworkStatusPort, RemoteProjectStorePort};
use sb_core::sync::{SyncEntryState, SyncQueueEntry, SyncQueueStatus};
use sb_infra::storage::{keys, StorageAdapter};

/// Delivery attempts per entry before it is parked as failed.
pub const MAX_SYNC_ATTEMPTS: u32 = 3;
/// Base delay of the capped exponential backoff between attempts.
pub const BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Backoff before the next attempt, given how many have been made.
fn backoff_delay(attempts_made: u32) -> Duration {
    BACKOFF_BASE * 2u32.saturating_pow(attempts_made.saturating_sub(1))
}

pub struct SyncQueue {
    adapter: Arc<StorageAdapter>,
    remote: Arc<dyn RemoteProjectStorePort>,
    network: Arc<dyn NetworkStatusPort>,
    clock: Arc<dyn ClockPort>,
    entries: Mutex<Vec<SyncQueueEntry>>,
    /// Earliest next-attempt time per entry waiting out a backoff.
    /// In-memory only; a restart retries immediately.
    backoff_until: Mutex<HashMap<SyncItemId, Instant>>,
    processing: AtomicBool,
}

impl SyncQueue {
    /// Load persisted queue metadata and rebuild the in-memory queue.
    /// Entries caught mid-delivery by the previous shutdown are re-derived
    /// as pending.
    pub fn new(
        adapter: Arc<StorageAdapter>,
        remote: Arc<dyn RemoteProjectStorePort>,
        network: Arc<dyn NetworkStatusPort>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        let mut entries: Vec<SyncQueueEntry> =
            adapter.parse_json_or(keys::SYNC_QUEUE_KEY, Vec::new());
        for entry in &mut entries {
            if entry.state == SyncEntryState::Syncing {
                debug!(entry_id = %entry.id, "recovering entry interrupted mid-delivery");
                entry.state = SyncEntryState::Pending;
            }
        }

        Self {
            adapter,
            remote,
            network,
            clock,
            entries: Mutex::new(entries),
            backoff_until: Mutex::new(HashMap::new()),
            processing: AtomicBool::new(false),
        }
    }

    fn entries_lock(&self) -> MutexGuard<'_, Vec<SyncQueueEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // Lock order: entries before backoff, everywhere.
    fn backoff_lock(&self) -> MutexGuard<'_, HashMap<SyncItemId, Instant>> {
        match self.backoff_until.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, entries: &Vec<SyncQueueEntry>) {
        self.adapter.set_json(keys::SYNC_QUEUE_KEY, entries);
    }

    /// Record the intent to mirror `project_id`'s latest local commit.
    /// Returns `None` when the project has no local payload to mirror.
    /// The local commit has already completed by the time this runs.
    pub fn enqueue(&self, project_id: &ProjectId) -> Option<SyncItemId> {
        let payload = self.adapter.get_project_data(project_id)?;
        let entry = SyncQueueEntry::new(
            project_id.clone(),
            payload.content_digest(),
            self.clock.now(),
        );
        let id = entry.id.clone();

        let mut entries = self.entries_lock();
        entries.push(entry);
        self.persist(&entries);
        debug!(project_id = %project_id, entry_id = %id, "sync intent enqueued");
        Some(id)
    }

    /// Start processing on a background task. Idempotent: kicking a queue
    /// that is already processing, or offline, is a no-op.
    pub fn kick(self: &Arc<Self>) {
        if !self.network.is_online() {
            debug!("sync kick ignored while offline");
            return;
        }
        if self.processing.swap(true, Ordering::SeqCst) {
            return;
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            queue.drain().await;
            queue.processing.store(false, Ordering::SeqCst);
        });
    }

    /// Inline variant of `kick` for callers that want to await completion.
    pub async fn process_until_idle(&self) {
        if self.processing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.drain().await;
        self.processing.store(false, Ordering::SeqCst);
    }

    /// The first pending entry that is past its backoff deadline and whose
    /// project has nothing unresolved ahead of it. Keeps delivery FIFO per
    /// project; entries of distinct projects may interleave freely, and a
    /// project waiting out a backoff never holds the others up.
    fn next_deliverable(
        entries: &[SyncQueueEntry],
        backoff_until: &HashMap<SyncItemId, Instant>,
        now: Instant,
    ) -> Option<usize> {
        for (index, entry) in entries.iter().enumerate() {
            if entry.state != SyncEntryState::Pending {
                continue;
            }
            if backoff_until.get(&entry.id).is_some_and(|at| *at > now) {
                continue;
            }
            let blocked = entries[..index]
                .iter()
                .any(|earlier| {
                    earlier.project_id == entry.project_id
                        && earlier.state != SyncEntryState::Synced
                });
            if !blocked {
                return Some(index);
            }
        }
        None
    }

    /// Earliest pending backoff deadline still in the future, if any.
    fn next_wake(&self, now: Instant) -> Option<Instant> {
        let entries = self.entries_lock();
        let backoff = self.backoff_lock();
        entries
            .iter()
            .filter(|entry| entry.state == SyncEntryState::Pending)
            .filter_map(|entry| backoff.get(&entry.id).copied())
            .filter(|at| *at > now)
            .min()
    }

    async fn drain(&self) {
        loop {
            if !self.network.is_online() {
                debug!("going offline; sync processing stops");
                break;
            }

            let now = Instant::now();
            let claimed = {
                let mut entries = self.entries_lock();
                let mut backoff = self.backoff_lock();
                match Self::next_deliverable(&entries, &backoff, now) {
                    Some(index) => {
                        entries[index].begin_delivery();
                        backoff.remove(&entries[index].id);
                        let entry = entries[index].clone();
                        drop(backoff);
                        self.persist(&entries);
                        Some(entry)
                    }
                    None => None,
                }
            };
            let Some(entry) = claimed else {
                // Nothing deliverable now. Wait out the nearest backoff if
                // one is pending; otherwise the queue is idle.
                match self.next_wake(Instant::now()) {
                    Some(at) => {
                        tokio::time::sleep_until(at).await;
                        continue;
                    }
                    None => break,
                }
            };

            // Content is always re-read at delivery time.
            let result = match self.adapter.get_project_data(&entry.project_id) {
                Some(payload) => {
                    self.remote
                        .upsert_project(&entry.project_id, &payload)
                        .await
                }
                None => {
                    // The project was deleted locally after enqueue; there
                    // is nothing left to mirror.
                    debug!(project_id = %entry.project_id, "local payload gone; completing entry");
                    Ok(())
                }
            };

            {
                let mut entries = self.entries_lock();
                let Some(item) = entries.iter_mut().find(|item| item.id == entry.id) else {
                    continue;
                };
                match result {
                    Ok(()) => {
                        item.record_success();
                        info!(project_id = %item.project_id, entry_id = %item.id, "project synced");
                    }
                    Err(err) => {
                        item.record_failure(err.to_string());
                        if item.attempts < MAX_SYNC_ATTEMPTS {
                            item.requeue();
                            self.backoff_lock().insert(
                                item.id.clone(),
                                Instant::now() + backoff_delay(item.attempts),
                            );
                        } else {
                            warn!(
                                project_id = %item.project_id,
                                entry_id = %item.id,
                                attempts = item.attempts,
                                "delivery attempts exhausted; entry parked until manual retry"
                            );
                        }
                    }
                }
                self.persist(&entries);
            }
        }
    }

    /// Reset every parked entry to pending with a fresh attempt counter.
    /// Returns how many were reset; the caller decides when to kick.
    pub fn retry_failed(&self) -> usize {
        let mut entries = self.entries_lock();
        let reset = entries
            .iter_mut()
            .map(|entry| entry.reset_for_retry())
            .filter(|reset| *reset)
            .count();
        if reset > 0 {
            self.persist(&entries);
            info!(reset, "failed sync entries queued for retry");
        }
        reset
    }

    /// Prune synced entries. They are never auto-pruned, so the UI can show
    /// a durable success trail until the user clears it.
    pub fn clear_completed(&self) -> usize {
        let mut entries = self.entries_lock();
        let before = entries.len();
        entries.retain(|entry| entry.state != SyncEntryState::Synced);
        let removed = before - entries.len();
        if removed > 0 {
            self.persist(&entries);
        }
        removed
    }

    pub fn status(&self) -> SyncQueueStatus {
        let entries = self.entries_lock();
        let mut status = SyncQueueStatus {
            is_processing: self.processing.load(Ordering::SeqCst),
            is_online: self.network.is_online(),
            ..Default::default()
        };
        for entry in entries.iter() {
            match entry.state {
                SyncEntryState::Pending => status.pending += 1,
                SyncEntryState::Syncing => status.syncing += 1,
                SyncEntryState::Synced => status.synced += 1,
                SyncEntryState::Failed => status.failed += 1,
            }
        }
        status
    }

    pub fn entries_snapshot(&self) -> Vec<SyncQueueEntry> {
        self.entries_lock().clone()
    }

    /// Watch connectivity edges and auto-kick on reconnect. Runs until the
    /// event channel closes; the builder owns the task handle.
    pub async fn watch_network(self: Arc<Self>) -> anyhow::Result<()> {
        let mut events = self.network.subscribe().await?;
        while let Some(event) = events.recv().await {
            match event {
                NetworkEvent::Online => {
                    info!("back online; kicking sync queue");
                    self.kick();
                }
                NetworkEvent::Offline => {
                    debug!("network went offline");
                }
            }
        }
        Ok(())
    }
}
