//! Persisted key layout.
//!
//! Project-scoped keys follow `<kind>-storage-project-<id>` (the UI slice
//! historically used `ui-store-`), which statically prevents cross-project
//! collisions: every component writes only under its own project's keys.

use sb_core::ids::ProjectId;

pub const PAGE_KEY_PREFIX: &str = "page-storage-project-";
pub const SHOT_KEY_PREFIX: &str = "shot-storage-project-";
pub const PROJECT_KEY_PREFIX: &str = "project-storage-project-";
pub const UI_KEY_PREFIX: &str = "ui-store-project-";

/// Registry snapshot.
pub const REGISTRY_KEY: &str = "project-manager-storage";
/// Persisted sync queue metadata.
pub const SYNC_QUEUE_KEY: &str = "sync-queue-storage";
/// Legacy monolithic key, consumed once by migration and never written again.
pub const LEGACY_KEY: &str = "storyboard-storage";

/// Sentinel key for the availability probe.
pub const PROBE_KEY: &str = "storage-availability-probe";

pub fn page_key(id: &ProjectId) -> String {
    format!("{PAGE_KEY_PREFIX}{id}")
}

pub fn shot_key(id: &ProjectId) -> String {
    format!("{SHOT_KEY_PREFIX}{id}")
}

pub fn project_key(id: &ProjectId) -> String {
    format!("{PROJECT_KEY_PREFIX}{id}")
}

pub fn ui_key(id: &ProjectId) -> String {
    format!("{UI_KEY_PREFIX}{id}")
}

pub fn is_project_scoped(key: &str) -> bool {
    project_id_of(key).is_some()
}

/// The owning project of a project-scoped key.
pub fn project_id_of(key: &str) -> Option<ProjectId> {
    for prefix in [
        PAGE_KEY_PREFIX,
        SHOT_KEY_PREFIX,
        PROJECT_KEY_PREFIX,
        UI_KEY_PREFIX,
    ] {
        if let Some(id) = key.strip_prefix(prefix) {
            if !id.is_empty() {
                return Some(ProjectId::from(id));
            }
        }
    }
    None
}
