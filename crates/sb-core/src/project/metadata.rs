use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ProjectId;

/// Registry-level description of a project.
///
/// A project is `is_local` (full payload present under project-scoped keys),
/// `is_cloud_only` (metadata placeholder from a cloud listing, payload not
/// yet hydrated), or both when it exists in both stores. It is never
/// neither; constructors and transitions preserve that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub id: ProjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub shot_count: u32,
    #[serde(default)]
    pub page_count: u32,
    pub is_local: bool,
    pub is_cloud_only: bool,
}

impl ProjectMetadata {
    /// Metadata for a project created locally by explicit user action.
    pub fn new_local(
        id: ProjectId,
        name: impl Into<String>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description,
            created_at: now,
            last_modified: now,
            shot_count: 0,
            page_count: 0,
            is_local: true,
            is_cloud_only: false,
        }
    }

    /// Placeholder for a project discovered through a cloud listing. Its
    /// payload must be hydrated before it can become the active project.
    pub fn from_cloud_summary(summary: &CloudProjectSummary, now: DateTime<Utc>) -> Self {
        Self {
            id: summary.id.clone(),
            name: summary.name.clone(),
            description: summary.description.clone(),
            created_at: summary.created_at.unwrap_or(now),
            last_modified: summary.updated_at.unwrap_or(now),
            shot_count: summary.shot_count,
            page_count: summary.page_count,
            is_local: false,
            is_cloud_only: true,
        }
    }

    /// Flip a cloud-only placeholder to local after hydration completes.
    pub fn mark_local(&mut self) {
        self.is_local = true;
        self.is_cloud_only = false;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_modified = now;
    }
}

/// Slim project description returned by a cloud listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudProjectSummary {
    pub id: ProjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub shot_count: u32,
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial metadata update applied through the registry.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub shot_count: Option<u32>,
    pub page_count: Option<u32>,
}

impl MetadataPatch {
    pub fn apply(&self, metadata: &mut ProjectMetadata) {
        if let Some(name) = &self.name {
            metadata.name = name.clone();
        }
        if let Some(description) = &self.description {
            metadata.description = description.clone();
        }
        if let Some(shot_count) = self.shot_count {
            metadata.shot_count = shot_count;
        }
        if let Some(page_count) = self.page_count {
            metadata.page_count = page_count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_project_is_not_cloud_only() {
        let meta = ProjectMetadata::new_local(ProjectId::new(), "Storyboard", None, Utc::now());
        assert!(meta.is_local);
        assert!(!meta.is_cloud_only);
    }

    #[test]
    fn mark_local_flips_cloud_placeholder() {
        let summary = CloudProjectSummary {
            id: ProjectId::from("p1"),
            name: "Remote".to_string(),
            description: None,
            shot_count: 3,
            page_count: 1,
            created_at: None,
            updated_at: None,
        };
        let mut meta = ProjectMetadata::from_cloud_summary(&summary, Utc::now());
        assert!(meta.is_cloud_only);
        assert!(!meta.is_local);

        meta.mark_local();
        assert!(meta.is_local);
        assert!(!meta.is_cloud_only);
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut meta = ProjectMetadata::new_local(
            ProjectId::new(),
            "Before",
            Some("keep me".to_string()),
            Utc::now(),
        );
        let patch = MetadataPatch {
            name: Some("After".to_string()),
            shot_count: Some(7),
            ..Default::default()
        };
        patch.apply(&mut meta);

        assert_eq!(meta.name, "After");
        assert_eq!(meta.shot_count, 7);
        assert_eq!(meta.description.as_deref(), Some("keep me"));
    }

    #[test]
    fn metadata_serializes_with_camel_case_keys() {
        let meta = ProjectMetadata::new_local(ProjectId::from("p1"), "Board", None, Utc::now());
        let json = serde_json::to_value(&meta).expect("serialize metadata");
        assert!(json.get("lastModified").is_some());
        assert!(json.get("isCloudOnly").is_some());
    }
}
