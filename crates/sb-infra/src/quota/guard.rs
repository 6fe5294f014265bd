use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use sb_core::ids::ProjectId;
use sb_core::quota::{self, QuotaGuidance, QuotaUsage, UploadDecision};
use sb_core::registry::RegistrySnapshot;

use crate::storage::{keys, StorageAdapter};

/// The project currently occupying the most storage, offered as eviction
/// guidance when space runs out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LargestProject {
    pub project_id: ProjectId,
    pub name: String,
    pub bytes: u64,
}

/// Composite quota report for the UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSummary {
    pub usage: QuotaUsage,
    pub guidance: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub largest_project: Option<LargestProject>,
}

/// Estimates store usage and classifies it against the quota thresholds.
///
/// Byte counts are the UTF-8 encoded lengths of key plus value, per the
/// policy documented in `sb_core::quota`.
pub struct QuotaGuard {
    adapter: Arc<StorageAdapter>,
}

impl QuotaGuard {
    pub fn new(adapter: Arc<StorageAdapter>) -> Self {
        Self { adapter }
    }

    pub fn check_quota(&self) -> QuotaUsage {
        let used: u64 = self
            .adapter
            .entries()
            .iter()
            .map(|(key, value)| (key.len() + value.len()) as u64)
            .sum();
        debug!(used_bytes = used, "quota check");
        quota::classify(used)
    }

    /// Per-project byte totals over project-scoped keys, resolving display
    /// names through the persisted registry snapshot. `None` when no
    /// project data exists.
    pub fn find_largest_project(&self) -> Option<LargestProject> {
        let mut totals: HashMap<ProjectId, u64> = HashMap::new();
        for (key, value) in self.adapter.entries() {
            if let Some(project_id) = keys::project_id_of(&key) {
                *totals.entry(project_id).or_default() += (key.len() + value.len()) as u64;
            }
        }

        let (project_id, bytes) = totals.into_iter().max_by_key(|(_, bytes)| *bytes)?;
        let registry: RegistrySnapshot = self
            .adapter
            .parse_json_or(keys::REGISTRY_KEY, RegistrySnapshot::default());
        let name = registry
            .projects
            .get(&project_id)
            .map(|meta| meta.name.clone())
            .unwrap_or_else(|| project_id.to_string());

        Some(LargestProject {
            project_id,
            name,
            bytes,
        })
    }

    pub fn get_summary(&self) -> QuotaSummary {
        let usage = self.check_quota();
        QuotaSummary {
            usage,
            guidance: QuotaGuidance::for_usage(usage).message(),
            largest_project: self.find_largest_project(),
        }
    }

    /// Project post-upload usage against the cloud thresholds.
    pub fn check_upload_allowed(&self, file_size_bytes: u64) -> UploadDecision {
        quota::check_upload(self.check_quota().used_bytes, file_size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use chrono::Utc;
    use sb_core::project::ProjectMetadata;
    use sb_core::registry::RegistryState;

    fn guard() -> (Arc<StorageAdapter>, QuotaGuard) {
        let adapter = Arc::new(StorageAdapter::new(Arc::new(MemoryKeyValueStore::new())));
        (adapter.clone(), QuotaGuard::new(adapter))
    }

    #[test]
    fn empty_store_is_healthy() {
        let (_, guard) = guard();
        let usage = guard.check_quota();
        assert_eq!(usage.used_bytes, 0);
        assert!(!usage.warning);
        assert!(guard.find_largest_project().is_none());
    }

    #[test]
    fn usage_counts_key_and_value_bytes() {
        let (adapter, guard) = guard();
        adapter.set("abc", "0123456789");
        assert_eq!(guard.check_quota().used_bytes, 13);
    }

    #[test]
    fn largest_project_resolves_registry_name() {
        let (adapter, guard) = guard();

        let mut registry = RegistryState::new();
        registry
            .insert(ProjectMetadata::new_local(
                ProjectId::from("p1"),
                "Big Board",
                None,
                Utc::now(),
            ))
            .expect("insert");
        registry
            .insert(ProjectMetadata::new_local(
                ProjectId::from("p2"),
                "Small Board",
                None,
                Utc::now(),
            ))
            .expect("insert");
        adapter.set_json(keys::REGISTRY_KEY, &registry.snapshot());

        adapter.set(&keys::shot_key(&ProjectId::from("p1")), &"x".repeat(500));
        adapter.set(&keys::shot_key(&ProjectId::from("p2")), "x");

        let largest = guard.find_largest_project().expect("largest");
        assert_eq!(largest.project_id, ProjectId::from("p1"));
        assert_eq!(largest.name, "Big Board");
    }

    #[test]
    fn summary_reports_guidance() {
        let (_, guard) = guard();
        let summary = guard.get_summary();
        assert_eq!(summary.guidance, QuotaGuidance::Healthy.message());
    }
}
