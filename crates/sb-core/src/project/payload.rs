use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single storyboard page. `shot_ids` is a cache of the per-page shot
/// ordering; the payload-level `shot_order` is canonical and `reconcile`
/// rebuilds this cache from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub shot_ids: Vec<String>,
}

/// A single shot card. Only the identity matters to the persistence core;
/// the editor owns the remaining fields, carried opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shot {
    pub id: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub project_info: Value,
    #[serde(default)]
    pub template_settings: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSettings {
    #[serde(default)]
    pub is_dragging: bool,
    #[serde(default)]
    pub is_exporting: bool,
}

/// The full in-memory state of one project, reassembled from the four
/// project-scoped storage slices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub active_page_id: Option<String>,
    #[serde(default)]
    pub shots: HashMap<String, Shot>,
    #[serde(default)]
    pub shot_order: Vec<String>,
    #[serde(default)]
    pub project_settings: ProjectSettings,
    #[serde(default)]
    pub ui_settings: UiSettings,
}

impl ProjectPayload {
    /// Repair the shot ordering invariant: every id in `shot_order` exists
    /// in `shots` and vice versa, with `shot_order` canonical.
    ///
    /// - ids in `shot_order` without a shot record are dropped,
    /// - shots absent from `shot_order` are appended (sorted by id, so the
    ///   repair is deterministic),
    /// - each page's embedded `shot_ids` cache is rebuilt in `shot_order`
    ///   order; shots not claimed by any page are appended to the first one.
    pub fn reconcile(&mut self) {
        self.shot_order.retain(|id| self.shots.contains_key(id));

        let mut missing: Vec<String> = self
            .shots
            .keys()
            .filter(|id| !self.shot_order.contains(*id))
            .cloned()
            .collect();
        missing.sort();
        self.shot_order.extend(missing);

        let position: HashMap<&str, usize> = self
            .shot_order
            .iter()
            .enumerate()
            .map(|(index, id)| (id.as_str(), index))
            .collect();

        let mut claimed: Vec<String> = Vec::new();
        for page in &mut self.pages {
            page.shot_ids.retain(|id| position.contains_key(id.as_str()));
            page.shot_ids
                .sort_by_key(|id| position.get(id.as_str()).copied().unwrap_or(usize::MAX));
            claimed.extend(page.shot_ids.iter().cloned());
        }

        if let Some(first) = self.pages.first_mut() {
            for id in &self.shot_order {
                if !claimed.contains(id) {
                    first.shot_ids.push(id.clone());
                }
            }
            first
                .shot_ids
                .sort_by_key(|id| position.get(id.as_str()).copied().unwrap_or(usize::MAX));
        }
    }

    /// Stable digest of the payload content, recorded on sync queue entries
    /// so deliveries can be traced back to the content they mirrored.
    pub fn content_digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}

/// Persisted under `page-storage-project-<id>`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSlice {
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub active_page_id: Option<String>,
}

/// Persisted under `shot-storage-project-<id>`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotSlice {
    #[serde(default)]
    pub shots: HashMap<String, Shot>,
    #[serde(default)]
    pub shot_order: Vec<String>,
}

impl ProjectPayload {
    pub fn from_slices(
        pages: PageSlice,
        shots: ShotSlice,
        project_settings: Option<ProjectSettings>,
        ui_settings: Option<UiSettings>,
    ) -> Self {
        Self {
            pages: pages.pages,
            active_page_id: pages.active_page_id,
            shots: shots.shots,
            shot_order: shots.shot_order,
            project_settings: project_settings.unwrap_or_default(),
            ui_settings: ui_settings.unwrap_or_default(),
        }
    }

    pub fn page_slice(&self) -> PageSlice {
        PageSlice {
            pages: self.pages.clone(),
            active_page_id: self.active_page_id.clone(),
        }
    }

    pub fn shot_slice(&self) -> ShotSlice {
        ShotSlice {
            shots: self.shots.clone(),
            shot_order: self.shot_order.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(id: &str) -> Shot {
        Shot {
            id: id.to_string(),
            fields: serde_json::Map::new(),
        }
    }

    fn payload_with(shots: &[&str], order: &[&str]) -> ProjectPayload {
        ProjectPayload {
            pages: vec![Page {
                id: "page-1".to_string(),
                name: None,
                shot_ids: shots.iter().map(|s| s.to_string()).collect(),
            }],
            shots: shots.iter().map(|s| (s.to_string(), shot(s))).collect(),
            shot_order: order.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn reconcile_rebuilds_page_cache_from_shot_order() {
        let mut payload = payload_with(&["s1", "s2"], &["s2", "s1"]);
        payload.reconcile();

        assert_eq!(payload.shot_order, vec!["s2", "s1"]);
        assert_eq!(payload.pages[0].shot_ids, vec!["s2", "s1"]);
    }

    #[test]
    fn reconcile_drops_order_entries_without_shot_records() {
        let mut payload = payload_with(&["s1"], &["ghost", "s1"]);
        payload.reconcile();

        assert_eq!(payload.shot_order, vec!["s1"]);
        assert_eq!(payload.pages[0].shot_ids, vec!["s1"]);
    }

    #[test]
    fn reconcile_appends_shots_missing_from_order() {
        let mut payload = payload_with(&["s1", "s2"], &["s1"]);
        payload.reconcile();

        assert_eq!(payload.shot_order, vec!["s1", "s2"]);
    }

    #[test]
    fn reconcile_claims_orphan_shots_onto_first_page() {
        let mut payload = payload_with(&[], &[]);
        payload.shots.insert("s9".to_string(), shot("s9"));
        payload.reconcile();

        assert_eq!(payload.shot_order, vec!["s9"]);
        assert_eq!(payload.pages[0].shot_ids, vec!["s9"]);
    }

    #[test]
    fn digest_changes_with_content() {
        let a = payload_with(&["s1"], &["s1"]);
        let mut b = a.clone();
        assert_eq!(a.content_digest(), b.content_digest());

        b.shot_order.push("s2".to_string());
        assert_ne!(a.content_digest(), b.content_digest());
    }

    #[test]
    fn slices_round_trip_through_payload() {
        let payload = payload_with(&["s1", "s2"], &["s2", "s1"]);
        let rebuilt = ProjectPayload::from_slices(
            payload.page_slice(),
            payload.shot_slice(),
            Some(payload.project_settings.clone()),
            Some(payload.ui_settings.clone()),
        );
        assert_eq!(rebuilt, payload);
    }

    #[test]
    fn shot_carries_editor_fields_opaquely() {
        let raw = serde_json::json!({
            "id": "s1",
            "title": "Opening",
            "durationMs": 1200,
        });
        let parsed: Shot = serde_json::from_value(raw.clone()).expect("parse shot");
        assert_eq!(parsed.id, "s1");
        assert_eq!(
            serde_json::to_value(&parsed).expect("serialize shot"),
            raw
        );
    }
}
