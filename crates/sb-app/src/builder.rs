//! Composition root.
//!
//! `CoreBuilder` collects the port implementations and wires the services
//! in dependency order; `LocalFirstCore` is the handle the embedding shell
//! holds for the lifetime of the app. Construction is cheap and pure; the
//! side-effectful startup work (migration, corruption sweep, network
//! watcher) happens in `initialize`.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use sb_core::ports::{
    AuthStatePort, ClockPort, KeyValueStorePort, NetworkStatusPort, RemoteProjectStorePort,
};
use sb_infra::quota::QuotaGuard;
use sb_infra::storage::StorageAdapter;
use sb_infra::time::SystemClock;

use crate::autosave::AutoSaveCoordinator;
use crate::registry_service::ProjectRegistryService;
use crate::switcher::ProjectSwitcher;
use crate::sync_queue::SyncQueue;

#[derive(Default)]
pub struct CoreBuilder {
    store: Option<Arc<dyn KeyValueStorePort>>,
    remote: Option<Arc<dyn RemoteProjectStorePort>>,
    auth: Option<Arc<dyn AuthStatePort>>,
    network: Option<Arc<dyn NetworkStatusPort>>,
    clock: Option<Arc<dyn ClockPort>>,
}

impl CoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStorePort>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteProjectStorePort>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthStatePort>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_network(mut self, network: Arc<dyn NetworkStatusPort>) -> Self {
        self.network = Some(network);
        self
    }

    /// Override the clock; defaults to the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn ClockPort>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> anyhow::Result<LocalFirstCore> {
        let store = self.store.context("key-value store not provided")?;
        let remote = self.remote.context("remote project store not provided")?;
        let auth = self.auth.context("auth state port not provided")?;
        let network = self.network.context("network status port not provided")?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let storage = Arc::new(StorageAdapter::new(store));
        let quota = Arc::new(QuotaGuard::new(storage.clone()));
        let registry = Arc::new(ProjectRegistryService::new(
            storage.clone(),
            auth,
            clock.clone(),
        ));
        let autosave = AutoSaveCoordinator::new();
        let sync_queue = Arc::new(SyncQueue::new(
            storage.clone(),
            remote.clone(),
            network,
            clock,
        ));
        let switcher = Arc::new(ProjectSwitcher::new(
            registry.clone(),
            storage.clone(),
            remote,
            autosave.clone(),
        ));

        Ok(LocalFirstCore {
            storage,
            quota,
            registry,
            autosave,
            sync_queue,
            switcher,
            network_watcher: Mutex::new(None),
        })
    }
}

pub struct LocalFirstCore {
    storage: Arc<StorageAdapter>,
    quota: Arc<QuotaGuard>,
    registry: Arc<ProjectRegistryService>,
    autosave: AutoSaveCoordinator,
    sync_queue: Arc<SyncQueue>,
    switcher: Arc<ProjectSwitcher>,
    network_watcher: Mutex<Option<JoinHandle<()>>>,
}

impl LocalFirstCore {
    pub fn builder() -> CoreBuilder {
        CoreBuilder::new()
    }

    pub fn storage(&self) -> &Arc<StorageAdapter> {
        &self.storage
    }

    pub fn quota(&self) -> &Arc<QuotaGuard> {
        &self.quota
    }

    pub fn registry(&self) -> &Arc<ProjectRegistryService> {
        &self.registry
    }

    pub fn autosave(&self) -> &AutoSaveCoordinator {
        &self.autosave
    }

    pub fn sync_queue(&self) -> &Arc<SyncQueue> {
        &self.sync_queue
    }

    pub fn switcher(&self) -> &Arc<ProjectSwitcher> {
        &self.switcher
    }

    /// One-time startup work.
    ///
    /// Sweeps corrupted keys, migrates a pre-registry single-project blob
    /// into the scoped layout, starts the connectivity watcher, and kicks
    /// the sync queue in case entries were persisted by a previous run.
    pub fn initialize(&self) {
        let removed = self.storage.cleanup_corrupted_data();
        if !removed.is_empty() {
            warn!(keys = ?removed, "removed corrupted storage entries at startup");
        }

        if let Some(outcome) = self.storage.migrate_legacy_data() {
            match self.registry.create_with_id(
                outcome.project_id.clone(),
                &outcome.project_name,
                None,
            ) {
                Ok(metadata) => {
                    self.registry.set_current(Some(metadata.id.clone()));
                    info!(project_id = %metadata.id, "legacy project registered");
                }
                Err(err) => {
                    // Data is already under scoped keys; only the catalog
                    // entry is missing. Keep running rather than aborting
                    // startup.
                    warn!(error = %err, "could not register migrated project");
                }
            }
        }

        let mut watcher = match self.network_watcher.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if watcher.is_none() {
            let queue = Arc::clone(&self.sync_queue);
            *watcher = Some(tokio::spawn(async move {
                if let Err(err) = queue.watch_network().await {
                    warn!(error = %err, "network watcher stopped");
                }
            }));
        }

        self.sync_queue.kick();
    }

    /// Stop background work. Safe to call more than once.
    pub fn teardown(&self) {
        let mut watcher = match self.network_watcher.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = watcher.take() {
            handle.abort();
        }
        self.autosave.teardown();
    }
}

impl Drop for LocalFirstCore {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::{DateTime, Utc};
    use tokio::sync::mpsc;

    use sb_core::ids::ProjectId;
    use sb_core::ports::NetworkEvent;
    use sb_core::project::{CloudProjectSummary, ProjectPayload};
    use sb_infra::kv::MemoryKeyValueStore;
    use sb_infra::storage::keys;

    struct TestAuth;

    impl AuthStatePort for TestAuth {
        fn is_authenticated(&self) -> Option<bool> {
            Some(true)
        }
    }

    struct OfflineNetwork;

    #[async_trait::async_trait]
    impl NetworkStatusPort for OfflineNetwork {
        fn is_online(&self) -> bool {
            false
        }

        async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<NetworkEvent>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
    }

    struct NullRemote;

    #[async_trait::async_trait]
    impl RemoteProjectStorePort for NullRemote {
        async fn upsert_project(
            &self,
            _id: &ProjectId,
            _payload: &ProjectPayload,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn fetch_project(&self, _id: &ProjectId) -> anyhow::Result<Option<ProjectPayload>> {
            Ok(None)
        }

        async fn list_projects(&self) -> anyhow::Result<Vec<CloudProjectSummary>> {
            Ok(Vec::new())
        }
    }

    struct FixedClock;

    impl ClockPort for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    fn core(store: Arc<MemoryKeyValueStore>) -> LocalFirstCore {
        LocalFirstCore::builder()
            .with_store(store)
            .with_remote(Arc::new(NullRemote))
            .with_auth(Arc::new(TestAuth))
            .with_network(Arc::new(OfflineNetwork))
            .with_clock(Arc::new(FixedClock))
            .build()
            .expect("build core")
    }

    #[test]
    fn build_requires_every_port() {
        assert!(CoreBuilder::new().build().is_err());
        assert!(CoreBuilder::new()
            .with_store(Arc::new(MemoryKeyValueStore::new()))
            .build()
            .is_err());
    }

    #[tokio::test]
    async fn initialize_registers_a_legacy_project() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store
            .set(
                keys::LEGACY_KEY,
                r#"{"projectName":"Old Board","pages":[],"shots":{},"shotOrder":[]}"#,
            )
            .expect("seed legacy blob");

        let core = core(store);
        core.initialize();

        let projects = core.registry().list_sorted(sb_core::registry::SortKey::Name);
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "Old Board");
        assert_eq!(
            core.registry().current_project_id(),
            Some(projects[0].id.clone())
        );
        // The legacy blob is consumed; running again changes nothing.
        core.initialize();
        assert_eq!(core.registry().len(), 1);
        core.teardown();
    }

    #[tokio::test]
    async fn initialize_on_empty_store_is_a_no_op() {
        let core = core(Arc::new(MemoryKeyValueStore::new()));
        core.initialize();
        assert!(core.registry().is_empty());
        assert!(core.registry().current_project_id().is_none());
        core.teardown();
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let core = core(Arc::new(MemoryKeyValueStore::new()));
        core.initialize();
        core.teardown();
        core.teardown();
    }
}
