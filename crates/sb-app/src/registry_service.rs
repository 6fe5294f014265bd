//! Project registry service.
//!
//! Owns the persisted project catalog: which projects exist, which one is
//! current, and how many the active plan allows. Registry state is pure
//! (`sb_core::registry`); this service wires it to the storage adapter,
//! the auth probe, and the clock, and persists a snapshot after every
//! mutation so a crash can lose at most the in-flight change.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use sb_core::error::RegistryError;
use sb_core::ids::ProjectId;
use sb_core::ports::{AuthStatePort, ClockPort};
use sb_core::project::{CloudProjectSummary, MetadataPatch, ProjectMetadata};
use sb_core::registry::{RegistrySnapshot, RegistryState, SortKey};
use sb_infra::storage::{keys, StorageAdapter};

pub struct ProjectRegistryService {
    adapter: Arc<StorageAdapter>,
    auth: Arc<dyn AuthStatePort>,
    clock: Arc<dyn ClockPort>,
    state: Mutex<RegistryState>,
}

impl ProjectRegistryService {
    /// Rebuild the registry from its persisted snapshot. A missing or
    /// corrupted snapshot yields an empty registry rather than an error.
    pub fn new(
        adapter: Arc<StorageAdapter>,
        auth: Arc<dyn AuthStatePort>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        let snapshot: RegistrySnapshot =
            adapter.parse_json_or(keys::REGISTRY_KEY, RegistrySnapshot::default());
        let state = RegistryState::from_snapshot(snapshot);
        debug!(projects = state.len(), "registry loaded");

        Self {
            adapter,
            auth,
            clock,
            state: Mutex::new(state),
        }
    }

    fn state_lock(&self) -> MutexGuard<'_, RegistryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, state: &RegistryState) {
        self.adapter.set_json(keys::REGISTRY_KEY, &state.snapshot());
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Whether another project fits under the active plan ceiling.
    pub fn can_create(&self) -> bool {
        self.state_lock().can_create(self.auth.is_authenticated())
    }

    /// Create a project with a fresh id. Refused with `LimitReached` when
    /// the plan ceiling is hit.
    pub fn create(
        &self,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<ProjectMetadata, RegistryError> {
        self.create_with_id(ProjectId::new(), name, description)
    }

    /// Create a project under a caller-chosen id (migration uses this to
    /// keep the id its scoped keys were written under).
    pub fn create_with_id(
        &self,
        id: ProjectId,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<ProjectMetadata, RegistryError> {
        let now = self.now();
        let mut state = self.state_lock();
        if !state.can_create(self.auth.is_authenticated()) {
            return Err(RegistryError::LimitReached {
                limit: state.max_projects(),
            });
        }

        let metadata = ProjectMetadata::new_local(id, name, description, now);
        state.insert(metadata.clone())?;
        self.persist(&state);
        info!(project_id = %metadata.id, name = %metadata.name, "project created");
        Ok(metadata)
    }

    /// Drop a project's registry entry. Returns the removed metadata, or
    /// `None` when the id was unknown. The current pointer is left for the
    /// switching coordinator to resolve.
    pub fn delete(&self, id: &ProjectId) -> Option<ProjectMetadata> {
        let mut state = self.state_lock();
        let removed = state.remove(id)?;
        self.persist(&state);
        info!(project_id = %id, "project removed from registry");
        Some(removed)
    }

    pub fn rename(&self, id: &ProjectId, name: impl Into<String>) -> Result<(), RegistryError> {
        let now = self.now();
        let mut state = self.state_lock();
        state.rename(id, name, now)?;
        self.persist(&state);
        Ok(())
    }

    pub fn update_metadata(
        &self,
        id: &ProjectId,
        patch: &MetadataPatch,
    ) -> Result<(), RegistryError> {
        let now = self.now();
        let mut state = self.state_lock();
        state.update_metadata(id, patch, now)?;
        self.persist(&state);
        Ok(())
    }

    /// Move the current pointer. Unknown ids are a logged no-op inside the
    /// registry state, so a stale UI reference can never corrupt it.
    pub fn set_current(&self, id: Option<ProjectId>) {
        let mut state = self.state_lock();
        state.set_current(id);
        self.persist(&state);
    }

    pub fn current_project_id(&self) -> Option<ProjectId> {
        self.state_lock().current_project_id().cloned()
    }

    pub fn get(&self, id: &ProjectId) -> Option<ProjectMetadata> {
        self.state_lock().get(id).cloned()
    }

    pub fn contains(&self, id: &ProjectId) -> bool {
        self.state_lock().contains(id)
    }

    pub fn list_sorted(&self, key: SortKey) -> Vec<ProjectMetadata> {
        self.state_lock().list_sorted(key)
    }

    pub fn len(&self) -> usize {
        self.state_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state_lock().is_empty()
    }

    /// Merge a cloud listing into the registry. Local entries always win
    /// over their cloud counterparts.
    pub fn add_cloud_projects(&self, summaries: &[CloudProjectSummary]) {
        let now = self.now();
        let mut state = self.state_lock();
        for summary in summaries {
            state.add_cloud_project(summary, now);
        }
        self.persist(&state);
        debug!(count = summaries.len(), "cloud listing merged");
    }

    /// Flip a hydrated cloud placeholder to a full local project.
    pub fn mark_local(&self, id: &ProjectId) -> Result<(), RegistryError> {
        let mut state = self.state_lock();
        state.mark_local(id)?;
        self.persist(&state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sb_core::registry::{AUTHENTICATED_PROJECT_LIMIT, GUEST_PROJECT_LIMIT};
    use sb_infra::kv::MemoryKeyValueStore;

    struct TestAuth(Option<bool>);

    impl AuthStatePort for TestAuth {
        fn is_authenticated(&self) -> Option<bool> {
            self.0
        }
    }

    struct FixedClock;

    impl ClockPort for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    fn service(auth: Option<bool>) -> (Arc<StorageAdapter>, ProjectRegistryService) {
        let adapter = Arc::new(StorageAdapter::new(Arc::new(MemoryKeyValueStore::new())));
        let service =
            ProjectRegistryService::new(adapter.clone(), Arc::new(TestAuth(auth)), Arc::new(FixedClock));
        (adapter, service)
    }

    #[test]
    fn guest_is_refused_a_second_project() {
        let (_, service) = service(Some(false));
        service.create("First", None).expect("first project");

        let err = service.create("Second", None).expect_err("over ceiling");
        assert!(matches!(
            err,
            RegistryError::LimitReached {
                limit: GUEST_PROJECT_LIMIT
            }
        ));
    }

    #[test]
    fn unknown_auth_state_gets_the_guest_ceiling() {
        let (_, service) = service(None);
        service.create("Only", None).expect("first project");
        assert!(!service.can_create());
    }

    #[test]
    fn authenticated_ceiling_is_fifteen() {
        let (_, service) = service(Some(true));
        for i in 0..AUTHENTICATED_PROJECT_LIMIT {
            service.create(format!("Board {i}"), None).expect("under ceiling");
        }
        assert!(service.create("One more", None).is_err());
    }

    #[test]
    fn mutations_survive_a_reload() {
        let (adapter, service) = service(Some(true));
        let created = service.create("Persisted", None).expect("create");
        service.set_current(Some(created.id.clone()));

        let reloaded = ProjectRegistryService::new(
            adapter,
            Arc::new(TestAuth(Some(true))),
            Arc::new(FixedClock),
        );
        assert_eq!(reloaded.current_project_id(), Some(created.id.clone()));
        assert_eq!(reloaded.get(&created.id).expect("metadata").name, "Persisted");
    }

    #[test]
    fn delete_returns_none_for_unknown_id() {
        let (_, service) = service(Some(true));
        assert!(service.delete(&ProjectId::from("ghost")).is_none());
    }

    #[test]
    fn rename_touches_last_modified() {
        let (_, service) = service(Some(true));
        let created = service.create("Old", None).expect("create");

        service.rename(&created.id, "New").expect("rename");
        let meta = service.get(&created.id).expect("metadata");
        assert_eq!(meta.name, "New");
        assert!(meta.last_modified >= created.last_modified);
    }

    #[test]
    fn cloud_listing_respects_local_wins() {
        let (_, service) = service(Some(true));
        let created = service.create("Mine", None).expect("create");

        service.add_cloud_projects(&[CloudProjectSummary {
            id: created.id.clone(),
            name: "Theirs".to_string(),
            description: None,
            shot_count: 0,
            page_count: 0,
            created_at: None,
            updated_at: None,
        }]);

        let meta = service.get(&created.id).expect("metadata");
        assert_eq!(meta.name, "Mine");
        assert!(meta.is_local);
    }
}
