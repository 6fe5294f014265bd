use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{error, warn};

use sb_core::error::StorageError;
use sb_core::ports::KeyValueStorePort;

/// File-backed key-value store: one JSON document on disk, rewritten
/// atomically (temp file + rename) on every mutation.
///
/// A missing file is an empty store. An unreadable document is logged and
/// treated as empty; per-key corruption recovery happens a layer up in the
/// storage adapter.
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileKeyValueStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "store document unreadable; starting empty");
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read store file failed: {}", path.display()))
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let content = serde_json::to_string(entries).map_err(|err| {
            error!(error = %err, "serialize store document failed");
            StorageError::Unavailable
        })?;

        if let Some(dir) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(dir) {
                error!(path = %dir.display(), error = %err, "create store dir failed");
                return Err(StorageError::Unavailable);
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|err| {
            error!(path = %tmp_path.display(), error = %err, "write temp store failed");
            StorageError::Unavailable
        })?;

        fs::rename(&tmp_path, &self.path).map_err(|err| {
            error!(path = %self.path.display(), error = %err, "rename temp store to target failed");
            StorageError::Unavailable
        })
    }
}

impl KeyValueStorePort for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        entries.remove(key);
        self.persist(&entries)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("store.json");

        let store = FileKeyValueStore::open(&path).expect("open");
        store.set("k", "v").expect("set");
        drop(store);

        let reopened = FileKeyValueStore::open(&path).expect("reopen");
        assert_eq!(reopened.get("k").expect("get").as_deref(), Some("v"));
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = TempDir::new().expect("tempdir");
        let store = FileKeyValueStore::open(dir.path().join("absent.json")).expect("open");
        assert!(store.keys().expect("keys").is_empty());
    }

    #[test]
    fn unreadable_document_starts_empty() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").expect("write garbage");

        let store = FileKeyValueStore::open(&path).expect("open");
        assert!(store.keys().expect("keys").is_empty());
    }

    #[test]
    fn remove_persists() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("store.json");

        let store = FileKeyValueStore::open(&path).expect("open");
        store.set("k", "v").expect("set");
        store.remove("k").expect("remove");
        drop(store);

        let reopened = FileKeyValueStore::open(&path).expect("reopen");
        assert_eq!(reopened.get("k").expect("get"), None);
    }
}
