use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RegistryError;
use crate::ids::ProjectId;
use crate::project::{CloudProjectSummary, MetadataPatch, ProjectMetadata};

/// Unauthenticated (guest) callers are capped at a single project.
pub const GUEST_PROJECT_LIMIT: usize = 1;
/// Authenticated callers are capped at a fixed plan ceiling.
pub const AUTHENTICATED_PROJECT_LIMIT: usize = 15;

/// Plan ceiling for the given auth state. `None` means the auth state is
/// unknown and the check fails closed: unknown is treated as guest so a
/// broken auth probe can never bypass the quota.
pub fn ceiling_for(authenticated: Option<bool>) -> usize {
    match authenticated {
        Some(true) => AUTHENTICATED_PROJECT_LIMIT,
        Some(false) | None => GUEST_PROJECT_LIMIT,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Date,
}

/// Pure registry state. All mutation goes through these operations; no
/// other component touches the map directly. Persistence and the auth
/// lookup live in the application layer.
#[derive(Debug, Clone, Default)]
pub struct RegistryState {
    projects: HashMap<ProjectId, ProjectMetadata>,
    current_project_id: Option<ProjectId>,
    max_projects: usize,
}

/// Serialized form persisted under `project-manager-storage`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub projects: HashMap<ProjectId, ProjectMetadata>,
    #[serde(default)]
    pub current_project_id: Option<ProjectId>,
    #[serde(default)]
    pub max_projects: usize,
    #[serde(default)]
    pub is_initialized: bool,
}

impl RegistryState {
    pub fn new() -> Self {
        Self {
            projects: HashMap::new(),
            current_project_id: None,
            max_projects: GUEST_PROJECT_LIMIT,
        }
    }

    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        let mut state = Self {
            projects: snapshot.projects,
            current_project_id: snapshot.current_project_id,
            max_projects: snapshot.max_projects.max(GUEST_PROJECT_LIMIT),
        };
        // A stale current pointer must not survive a reload.
        if let Some(current) = &state.current_project_id {
            if !state.projects.contains_key(current) {
                warn!(project_id = %current, "dropping dangling current project pointer");
                state.current_project_id = None;
            }
        }
        state
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            projects: self.projects.clone(),
            current_project_id: self.current_project_id.clone(),
            max_projects: self.max_projects,
            is_initialized: true,
        }
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn get(&self, id: &ProjectId) -> Option<&ProjectMetadata> {
        self.projects.get(id)
    }

    pub fn contains(&self, id: &ProjectId) -> bool {
        self.projects.contains_key(id)
    }

    pub fn current_project_id(&self) -> Option<&ProjectId> {
        self.current_project_id.as_ref()
    }

    pub fn max_projects(&self) -> usize {
        self.max_projects
    }

    /// Whether a create is allowed under the ceiling for `authenticated`.
    /// Also refreshes the persisted ceiling to the active plan.
    pub fn can_create(&mut self, authenticated: Option<bool>) -> bool {
        self.max_projects = ceiling_for(authenticated);
        self.projects.len() < self.max_projects
    }

    /// Insert a freshly created project. The caller has already passed
    /// `can_create`; a duplicate id is a programmer error.
    pub fn insert(&mut self, metadata: ProjectMetadata) -> Result<(), RegistryError> {
        if self.projects.contains_key(&metadata.id) {
            return Err(RegistryError::DuplicateProject(metadata.id));
        }
        self.projects.insert(metadata.id.clone(), metadata);
        Ok(())
    }

    /// Remove a project's registry entry. Deliberately does not clear
    /// `current_project_id`; the switching coordinator picks the fallback
    /// so the UI never observes a transient "no project" state.
    pub fn remove(&mut self, id: &ProjectId) -> Option<ProjectMetadata> {
        self.projects.remove(id)
    }

    pub fn rename(
        &mut self,
        id: &ProjectId,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let metadata = self
            .projects
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownProject(id.clone()))?;
        metadata.name = name.into();
        metadata.touch(now);
        Ok(())
    }

    /// Point the registry at a new current project. An unknown non-null id
    /// is a logged no-op, not an error.
    pub fn set_current(&mut self, id: Option<ProjectId>) {
        match id {
            None => self.current_project_id = None,
            Some(id) if self.projects.contains_key(&id) => {
                self.current_project_id = Some(id);
            }
            Some(id) => {
                warn!(project_id = %id, "ignoring set_current for unknown project");
            }
        }
    }

    pub fn update_metadata(
        &mut self,
        id: &ProjectId,
        patch: &MetadataPatch,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let metadata = self
            .projects
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownProject(id.clone()))?;
        patch.apply(metadata);
        metadata.touch(now);
        Ok(())
    }

    /// Record a project discovered through a cloud listing. Local wins: an
    /// existing local copy is never downgraded to a cloud-only placeholder.
    pub fn add_cloud_project(&mut self, summary: &CloudProjectSummary, now: DateTime<Utc>) {
        if let Some(existing) = self.projects.get(&summary.id) {
            if existing.is_local {
                return;
            }
        }
        self.projects.insert(
            summary.id.clone(),
            ProjectMetadata::from_cloud_summary(summary, now),
        );
    }

    /// Flip a cloud-only placeholder to local once hydration completes.
    pub fn mark_local(&mut self, id: &ProjectId) -> Result<(), RegistryError> {
        let metadata = self
            .projects
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownProject(id.clone()))?;
        metadata.mark_local();
        Ok(())
    }

    pub fn list_sorted(&self, key: SortKey) -> Vec<ProjectMetadata> {
        let mut projects: Vec<ProjectMetadata> = self.projects.values().cloned().collect();
        match key {
            SortKey::Name => {
                projects.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            }
            SortKey::Date => projects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified)),
        }
        projects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(id: &str, name: &str) -> ProjectMetadata {
        ProjectMetadata::new_local(ProjectId::from(id), name, None, Utc::now())
    }

    fn summary(id: &str, name: &str) -> CloudProjectSummary {
        CloudProjectSummary {
            id: ProjectId::from(id),
            name: name.to_string(),
            description: None,
            shot_count: 0,
            page_count: 0,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn guest_ceiling_is_one_project() {
        let mut state = RegistryState::new();
        assert!(state.can_create(Some(false)));
        state.insert(local("p1", "One")).expect("insert");
        assert!(!state.can_create(Some(false)));
    }

    #[test]
    fn unknown_auth_fails_closed() {
        let mut state = RegistryState::new();
        state.insert(local("p1", "One")).expect("insert");
        assert!(!state.can_create(None));
        assert!(state.can_create(Some(true)));
    }

    #[test]
    fn authenticated_ceiling_holds_over_operation_sequences() {
        let mut state = RegistryState::new();
        for i in 0..40 {
            if state.can_create(Some(true)) {
                state
                    .insert(local(&format!("p{i}"), "Board"))
                    .expect("insert under ceiling");
            }
            if i % 5 == 0 {
                state.remove(&ProjectId::from(format!("p{}", i / 2).as_str()));
            }
            assert!(state.len() <= AUTHENTICATED_PROJECT_LIMIT);
        }
    }

    #[test]
    fn set_current_ignores_unknown_ids() {
        let mut state = RegistryState::new();
        state.insert(local("p1", "One")).expect("insert");
        state.set_current(Some(ProjectId::from("p1")));
        state.set_current(Some(ProjectId::from("ghost")));
        assert_eq!(state.current_project_id(), Some(&ProjectId::from("p1")));
    }

    #[test]
    fn remove_keeps_current_pointer_for_switcher_to_resolve() {
        let mut state = RegistryState::new();
        state.insert(local("p1", "One")).expect("insert");
        state.set_current(Some(ProjectId::from("p1")));
        state.remove(&ProjectId::from("p1"));
        assert_eq!(state.current_project_id(), Some(&ProjectId::from("p1")));
    }

    #[test]
    fn cloud_listing_never_overwrites_local_copy() {
        let mut state = RegistryState::new();
        state.insert(local("p1", "Mine")).expect("insert");
        state.add_cloud_project(&summary("p1", "Theirs"), Utc::now());

        let meta = state.get(&ProjectId::from("p1")).expect("p1");
        assert!(meta.is_local);
        assert_eq!(meta.name, "Mine");
    }

    #[test]
    fn cloud_listing_inserts_placeholder_for_new_projects() {
        let mut state = RegistryState::new();
        state.add_cloud_project(&summary("p2", "Remote"), Utc::now());

        let meta = state.get(&ProjectId::from("p2")).expect("p2");
        assert!(meta.is_cloud_only);
        assert!(!meta.is_local);
    }

    #[test]
    fn list_sorted_by_name_is_case_insensitive() {
        let mut state = RegistryState::new();
        state.insert(local("p1", "banana")).expect("insert");
        state.insert(local("p2", "Apple")).expect("insert");

        let names: Vec<String> = state
            .list_sorted(SortKey::Name)
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Apple", "banana"]);
    }

    #[test]
    fn snapshot_reload_drops_dangling_current() {
        let mut snapshot = RegistryState::new().snapshot();
        snapshot.current_project_id = Some(ProjectId::from("ghost"));

        let state = RegistryState::from_snapshot(snapshot);
        assert!(state.current_project_id().is_none());
    }
}
