//! Project switching and deletion.
//!
//! Switching replaces the whole in-memory working set, so it runs under
//! the auto-save switch lock: any save fired mid-switch would write the
//! outgoing project's state under the incoming project's keys. Switches
//! are additionally serialized through an async gate so two concurrent
//! requests cannot interleave their hydration steps.

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use sb_core::ids::ProjectId;
use sb_core::ports::RemoteProjectStorePort;
use sb_core::project::ProjectPayload;
use sb_core::registry::SortKey;
use sb_core::validate::auto_repair;
use sb_infra::storage::StorageAdapter;

use crate::autosave::AutoSaveCoordinator;
use crate::registry_service::ProjectRegistryService;

pub struct ProjectSwitcher {
    registry: Arc<ProjectRegistryService>,
    adapter: Arc<StorageAdapter>,
    remote: Arc<dyn RemoteProjectStorePort>,
    autosave: AutoSaveCoordinator,
    switch_gate: tokio::sync::Mutex<()>,
}

impl ProjectSwitcher {
    pub fn new(
        registry: Arc<ProjectRegistryService>,
        adapter: Arc<StorageAdapter>,
        remote: Arc<dyn RemoteProjectStorePort>,
        autosave: AutoSaveCoordinator,
    ) -> Self {
        Self {
            registry,
            adapter,
            remote,
            autosave,
            switch_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Make `id` the current project and return its payload, hydrating a
    /// cloud-only placeholder from the remote store first.
    ///
    /// The returned payload has already been repaired; callers load it
    /// into memory as-is.
    pub async fn switch_to(&self, id: &ProjectId) -> anyhow::Result<ProjectPayload> {
        let _gate = self.switch_gate.lock().await;

        let metadata = self
            .registry
            .get(id)
            .with_context(|| format!("cannot switch to unknown project {id}"))?;

        let registry = Arc::clone(&self.registry);
        let adapter = Arc::clone(&self.adapter);
        let remote = Arc::clone(&self.remote);
        let id = id.clone();
        self.autosave
            .with_switch_lock(async move {
                let payload = if metadata.is_local {
                    match adapter.get_project_data(&id) {
                        Some(payload) => auto_repair(payload),
                        None => {
                            // Registry says local but the slices are gone.
                            // Start the project over empty rather than
                            // failing the switch.
                            warn!(project_id = %id, "local project has no stored payload; starting empty");
                            let payload = auto_repair(ProjectPayload::default());
                            adapter.put_project_data(&id, &payload);
                            payload
                        }
                    }
                } else {
                    debug!(project_id = %id, "hydrating cloud-only project");
                    let fetched = remote
                        .fetch_project(&id)
                        .await
                        .with_context(|| format!("fetching project {id} from remote store"))?
                        .with_context(|| format!("project {id} missing from remote store"))?;
                    let payload = auto_repair(fetched);
                    if !adapter.put_project_data(&id, &payload) {
                        anyhow::bail!("storing hydrated payload for project {id}");
                    }
                    registry
                        .mark_local(&id)
                        .context("marking hydrated project local")?;
                    payload
                };

                registry.set_current(Some(id.clone()));
                info!(project_id = %id, "switched current project");
                Ok(payload)
            })
            .await
    }

    /// Delete a project: registry entry, all four storage slices, and, when
    /// it was current, fall back to the most recently modified survivor.
    /// Returns the id of the new current project, if any.
    pub async fn delete_project(&self, id: &ProjectId) -> anyhow::Result<Option<ProjectId>> {
        let _gate = self.switch_gate.lock().await;

        let removed = self
            .registry
            .delete(id)
            .with_context(|| format!("cannot delete unknown project {id}"))?;
        self.adapter.remove_project_data(id);
        info!(project_id = %id, name = %removed.name, "project deleted");

        let was_current = self.registry.current_project_id().as_ref() == Some(id);
        let fallback = if was_current {
            let fallback = self
                .registry
                .list_sorted(SortKey::Date)
                .into_iter()
                .map(|meta| meta.id)
                .next();
            self.registry.set_current(fallback.clone());
            fallback
        } else {
            self.registry.current_project_id()
        };

        // Deletion is destructive; persist the survivor's state now rather
        // than waiting out a debounce window.
        self.autosave.trigger_immediate_save().await;
        Ok(fallback)
    }
}
