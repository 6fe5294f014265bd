//! Structural validation and auto-repair of project payloads.
//!
//! Data read back from the local store is not trusted until it passes
//! through here. Validation is lenient: a malformed top-level field is
//! coerced to its default instead of rejecting the whole payload, so a
//! damaged slice never takes the rest of the project down with it.

use serde_json::Value;
use tracing::warn;

use crate::project::{Page, ProjectPayload, ProjectSettings, Shot, UiSettings};

/// Coerce a raw JSON value into a `ProjectPayload`.
///
/// Returns `None` only on a hard failure (the value is not an object).
/// Missing or mistyped fields fall back to defaults: pages to an empty
/// sequence, shots to an empty map, settings to empty objects.
pub fn validate(raw: &Value) -> Option<ProjectPayload> {
    let object = raw.as_object()?;

    Some(ProjectPayload {
        pages: field_or_default::<Vec<Page>>(object, "pages"),
        active_page_id: field_or_default::<Option<String>>(object, "activePageId"),
        shots: field_or_default(object, "shots"),
        shot_order: field_or_default::<Vec<String>>(object, "shotOrder"),
        project_settings: field_or_default::<ProjectSettings>(object, "projectSettings"),
        ui_settings: field_or_default::<UiSettings>(object, "uiSettings"),
    })
}

fn field_or_default<T>(object: &serde_json::Map<String, Value>, key: &str) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    match object.get(key) {
        None => T::default(),
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|err| {
            warn!(key, error = %err, "coercing malformed payload field to default");
            T::default()
        }),
    }
}

/// Deterministic, non-destructive repair of a payload.
///
/// Fills gaps, never drops user content:
/// - an empty `shot_order` with existing shots is derived from the shot
///   map's keys (sorted),
/// - a first page without an id receives a synthetic one,
/// - the shot ordering invariant is then reconciled.
///
/// Idempotent: `auto_repair(auto_repair(x)) == auto_repair(x)`.
pub fn auto_repair(mut payload: ProjectPayload) -> ProjectPayload {
    if payload.shot_order.is_empty() && !payload.shots.is_empty() {
        let mut derived: Vec<String> = payload.shots.keys().cloned().collect();
        derived.sort();
        payload.shot_order = derived;
    }

    if let Some(first) = payload.pages.first_mut() {
        if first.id.is_empty() {
            first.id = format!("page-{}", uuid::Uuid::new_v4());
        }
    }

    payload.reconcile();
    payload
}

/// Convenience used by the storage adapter: validate, then repair.
pub fn validate_and_repair(raw: &Value) -> Option<ProjectPayload> {
    validate(raw).map(auto_repair)
}
