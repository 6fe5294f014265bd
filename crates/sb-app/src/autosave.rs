//! Auto-save coordinator.
//!
//! Decouples "something changed" events from "persist it" calls. Mutation
//! sites only ever call the two triggers; the registered save handler does
//! the actual write. The coordinator is an explicit, injectable object with
//! an `init`/`teardown` lifecycle so tests can run independent instances.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::{debug, warn};

use sb_core::ports::SaveHandlerPort;

/// Quiet period a debounced save waits for before writing.
pub const DEBOUNCE_DELAY: Duration = Duration::from_secs(2);

struct Inner {
    save_handler: Mutex<Option<Arc<dyn SaveHandlerPort>>>,
    debounce_task: Mutex<Option<AbortHandle>>,
    debounce_delay: Duration,
    /// While set, debounced triggers are swallowed; one flush on exit.
    batch_active: AtomicBool,
    batch_dirty: AtomicBool,
    /// While set, every trigger is swallowed with no flush: a project
    /// switch is replacing the in-memory state and a save during that
    /// window could land under the wrong project's keys.
    switch_locked: AtomicBool,
    uninit_warned: AtomicBool,
}

impl Inner {
    fn handler(&self) -> Option<Arc<dyn SaveHandlerPort>> {
        lock_unpoisoned(&self.save_handler).clone()
    }

    fn warn_uninitialized(&self) {
        if !self.uninit_warned.swap(true, Ordering::SeqCst) {
            warn!("save triggered before auto-save coordinator init; ignoring");
        }
    }

    fn cancel_pending_debounce(&self) {
        if let Some(previous) = lock_unpoisoned(&self.debounce_task).take() {
            previous.abort();
        }
    }

    async fn run_save(&self, handler: &Arc<dyn SaveHandlerPort>) {
        if let Err(err) = handler.save_current_project().await {
            warn!(error = %err, "auto-save failed; local state unchanged in memory");
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Releases a suppression flag even when the guarded work unwinds.
struct FlagReset<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlagReset<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct AutoSaveCoordinator {
    inner: Arc<Inner>,
}

impl AutoSaveCoordinator {
    pub fn new() -> Self {
        Self::with_debounce_delay(DEBOUNCE_DELAY)
    }

    pub fn with_debounce_delay(debounce_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                save_handler: Mutex::new(None),
                debounce_task: Mutex::new(None),
                debounce_delay,
                batch_active: AtomicBool::new(false),
                batch_dirty: AtomicBool::new(false),
                switch_locked: AtomicBool::new(false),
                uninit_warned: AtomicBool::new(false),
            }),
        }
    }

    /// Register the save callback. Until this runs, triggers are dropped
    /// with a single logged warning.
    pub fn init(&self, save_handler: Arc<dyn SaveHandlerPort>) {
        *lock_unpoisoned(&self.inner.save_handler) = Some(save_handler);
    }

    /// Drop the save callback and cancel any pending debounce.
    pub fn teardown(&self) {
        self.inner.cancel_pending_debounce();
        *lock_unpoisoned(&self.inner.save_handler) = None;
        self.inner.batch_active.store(false, Ordering::SeqCst);
        self.inner.batch_dirty.store(false, Ordering::SeqCst);
        self.inner.switch_locked.store(false, Ordering::SeqCst);
    }

    pub fn is_switch_locked(&self) -> bool {
        self.inner.switch_locked.load(Ordering::SeqCst)
    }

    pub fn is_batching(&self) -> bool {
        self.inner.batch_active.load(Ordering::SeqCst)
    }

    /// Coalesce rapid successive changes into one save after the quiet
    /// period. Dropped entirely while the switch lock is held; deferred to
    /// a single flush while batching.
    pub fn trigger_debounced_save(&self) {
        if self.inner.switch_locked.load(Ordering::SeqCst) {
            debug!("debounced save dropped: project switch in progress");
            return;
        }
        if self.inner.batch_active.load(Ordering::SeqCst) {
            self.inner.batch_dirty.store(true, Ordering::SeqCst);
            return;
        }
        let Some(handler) = self.inner.handler() else {
            self.inner.warn_uninitialized();
            return;
        };

        let inner = Arc::clone(&self.inner);
        let mut slot = lock_unpoisoned(&self.inner.debounce_task);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce_delay).await;
            // Flags may have engaged while we waited.
            if inner.switch_locked.load(Ordering::SeqCst)
                || inner.batch_active.load(Ordering::SeqCst)
            {
                debug!("debounced save dropped at fire time");
                return;
            }
            inner.run_save(&handler).await;
        });
        *slot = Some(handle.abort_handle());
    }

    /// Save now, bypassing the debounce. Used for destructive operations
    /// (deletion) that must not wait out a quiet period. Still swallowed by
    /// the switch lock.
    pub async fn trigger_immediate_save(&self) {
        if self.inner.switch_locked.load(Ordering::SeqCst) {
            debug!("immediate save dropped: project switch in progress");
            return;
        }
        let Some(handler) = self.inner.handler() else {
            self.inner.warn_uninitialized();
            return;
        };
        // This save supersedes any pending debounce.
        self.inner.cancel_pending_debounce();
        self.inner.run_save(&handler).await;
    }

    /// Run `work` in batch mode: debounced triggers inside are deferred and
    /// flushed as exactly one save on exit. The flag is released even when
    /// `work` fails, and the failure is returned after cleanup.
    pub async fn with_batch<T>(
        &self,
        work: impl std::future::Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        self.inner.batch_active.store(true, Ordering::SeqCst);
        let result = {
            let _reset = FlagReset {
                flag: &self.inner.batch_active,
            };
            work.await
        };
        if self.inner.batch_dirty.swap(false, Ordering::SeqCst) {
            self.trigger_immediate_save().await;
        }
        result
    }

    /// Run `work` with the switch lock held: every trigger inside is
    /// dropped, with no flush on unlock. The lock is released even when
    /// `work` fails, and the failure is returned after cleanup.
    pub async fn with_switch_lock<T>(
        &self,
        work: impl std::future::Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        // A save scheduled before the lock must not land mid-switch.
        self.inner.cancel_pending_debounce();
        self.inner.switch_locked.store(true, Ordering::SeqCst);
        let _reset = FlagReset {
            flag: &self.inner.switch_locked,
        };
        work.await
    }
}

impl Default for AutoSaveCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
