use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use sb_core::error::StorageError;
use sb_core::ids::ProjectId;
use sb_core::ports::KeyValueStorePort;
use sb_core::project::{PageSlice, ProjectPayload, ProjectSettings, ShotSlice, UiSettings};
use sb_core::validate;

use super::keys;

/// What a legacy migration produced; the registry service registers it.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub project_id: ProjectId,
    pub project_name: String,
}

/// Safe key-value access over the local store.
///
/// Every engine failure is caught here: callers receive a success flag or a
/// default value, never an error. When the store reports
/// `StorageError::Unavailable` the adapter degrades to an in-memory-only
/// overlay, warning once; committed content then survives for the session
/// but not a restart, which is the best a disabled storage engine allows.
pub struct StorageAdapter {
    store: Arc<dyn KeyValueStorePort>,
    overlay: Mutex<HashMap<String, String>>,
    degraded_warned: AtomicBool,
}

impl StorageAdapter {
    pub fn new(store: Arc<dyn KeyValueStorePort>) -> Self {
        Self {
            store,
            overlay: Mutex::new(HashMap::new()),
            degraded_warned: AtomicBool::new(false),
        }
    }

    fn warn_degraded_once(&self) {
        if !self.degraded_warned.swap(true, Ordering::SeqCst) {
            warn!("local storage unavailable; continuing with in-memory data only");
        }
    }

    fn overlay_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.overlay.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Read a raw value. Engine failures fall back to the in-memory
    /// overlay, then to `None`.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.or_else(|| self.overlay_lock().get(key).cloned()),
            Err(err) => {
                self.warn_degraded_once();
                warn!(key, error = %err, "storage get failed; falling back to overlay");
                self.overlay_lock().get(key).cloned()
            }
        }
    }

    /// Write a raw value. Returns whether the value is retained anywhere
    /// (persistently, or in the overlay while degraded).
    pub fn set(&self, key: &str, value: &str) -> bool {
        match self.store.set(key, value) {
            Ok(()) => true,
            Err(StorageError::Unavailable) => {
                self.warn_degraded_once();
                self.overlay_lock()
                    .insert(key.to_string(), value.to_string());
                true
            }
            Err(err) => {
                warn!(key, error = %err, "storage set failed");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.overlay_lock().remove(key);
        match self.store.remove(key) {
            Ok(()) => true,
            Err(StorageError::Unavailable) => {
                self.warn_degraded_once();
                true
            }
            Err(err) => {
                warn!(key, error = %err, "storage remove failed");
                false
            }
        }
    }

    /// Every key visible through the adapter (store plus overlay).
    pub fn keys(&self) -> Vec<String> {
        let mut keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(err) => {
                self.warn_degraded_once();
                warn!(error = %err, "storage key enumeration failed");
                Vec::new()
            }
        };
        for key in self.overlay_lock().keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    /// All key-value pairs, for quota accounting.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(&key).map(|value| (key, value)))
            .collect()
    }

    /// Parse a stored JSON value, never failing. A corrupted value is
    /// deleted (it would fail identically on every future read) and the
    /// default is returned.
    pub fn parse_json_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.get(key) else {
            return default;
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "corrupted value; deleting key and using default");
                self.remove(key);
                default
            }
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw),
            Err(err) => {
                warn!(key, error = %err, "serialize for storage failed");
                false
            }
        }
    }

    /// Write/delete probe against the real store (the overlay does not
    /// count as available storage).
    pub fn is_available(&self) -> bool {
        let probe_ok = self.store.set(keys::PROBE_KEY, "probe").is_ok();
        if probe_ok {
            let _ = self.store.remove(keys::PROBE_KEY);
        }
        probe_ok
    }

    /// Delete every well-known key holding unparseable JSON. Returns the
    /// keys removed.
    pub fn cleanup_corrupted_data(&self) -> Vec<String> {
        let mut removed = Vec::new();
        let mut candidates = vec![
            keys::REGISTRY_KEY.to_string(),
            keys::SYNC_QUEUE_KEY.to_string(),
            keys::LEGACY_KEY.to_string(),
        ];
        candidates.extend(self.keys().into_iter().filter(|k| keys::is_project_scoped(k)));

        for key in candidates {
            let Some(raw) = self.get(&key) else { continue };
            if serde_json::from_str::<Value>(&raw).is_err() {
                warn!(key = %key, "removing corrupted storage entry");
                self.remove(&key);
                removed.push(key);
            }
        }
        removed
    }

    /// Consume the legacy monolithic `storyboard-storage` blob, if present,
    /// into the project-scoped key layout under a freshly minted project
    /// id. Idempotent: the absence of the legacy key, or the presence of
    /// already-migrated project-scoped keys, skips the migration.
    pub fn migrate_legacy_data(&self) -> Option<MigrationOutcome> {
        let raw = self.get(keys::LEGACY_KEY)?;

        if self.keys().iter().any(|k| keys::is_project_scoped(k)) {
            info!("legacy blob present but project-scoped keys already exist; skipping migration");
            return None;
        }

        let blob: Value = match serde_json::from_str(&raw) {
            Ok(blob) => blob,
            Err(err) => {
                warn!(error = %err, "legacy blob unreadable; deleting it");
                self.remove(keys::LEGACY_KEY);
                return None;
            }
        };

        let payload = validate::validate_and_repair(&blob)?;
        let project_name = blob
            .get("projectName")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "Migrated Project".to_string());

        let project_id = ProjectId::new();
        if !self.put_project_data(&project_id, &payload) {
            warn!("failed to write migrated project data; keeping legacy blob");
            return None;
        }
        self.remove(keys::LEGACY_KEY);
        info!(project_id = %project_id, name = %project_name, "migrated legacy storyboard data");

        Some(MigrationOutcome {
            project_id,
            project_name,
        })
    }

    /// Remove every key matching the project-scoped convention. Returns the
    /// count removed.
    pub fn clear_all_project_data(&self) -> usize {
        let scoped: Vec<String> = self
            .keys()
            .into_iter()
            .filter(|k| keys::is_project_scoped(k))
            .collect();
        let mut removed = 0;
        for key in scoped {
            if self.remove(&key) {
                removed += 1;
            }
        }
        info!(removed, "cleared project-scoped storage");
        removed
    }

    /// Reassemble a full payload from the four project-scoped slices. The
    /// pages and shots slices are mandatory; missing either yields `None`.
    pub fn get_project_data(&self, id: &ProjectId) -> Option<ProjectPayload> {
        let pages: PageSlice = self.parse_slice(&keys::page_key(id))?;
        let shots: ShotSlice = self.parse_slice(&keys::shot_key(id))?;
        let settings: Option<ProjectSettings> = self.parse_slice(&keys::project_key(id));
        let ui: Option<UiSettings> = self.parse_slice(&keys::ui_key(id));

        Some(ProjectPayload::from_slices(pages, shots, settings, ui))
    }

    fn parse_slice<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(slice) => Some(slice),
            Err(err) => {
                warn!(key, error = %err, "corrupted project slice; deleting key");
                self.remove(key);
                None
            }
        }
    }

    /// Commit a payload as its four project-scoped slices. Synchronous and
    /// authoritative: once this returns true, the local copy is the source
    /// of truth no matter what the sync queue does.
    pub fn put_project_data(&self, id: &ProjectId, payload: &ProjectPayload) -> bool {
        self.set_json(&keys::page_key(id), &payload.page_slice())
            && self.set_json(&keys::shot_key(id), &payload.shot_slice())
            && self.set_json(&keys::project_key(id), &payload.project_settings)
            && self.set_json(&keys::ui_key(id), &payload.ui_settings)
    }

    /// Delete all four slices of one project.
    pub fn remove_project_data(&self, id: &ProjectId) {
        for key in [
            keys::page_key(id),
            keys::shot_key(id),
            keys::project_key(id),
            keys::ui_key(id),
        ] {
            self.remove(&key);
        }
    }
}
