use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use sb_core::error::StorageError;
use sb_core::ports::KeyValueStorePort;

/// In-memory key-value store.
///
/// Backs the degraded mode the storage adapter falls into when persistent
/// storage is unavailable, and doubles as the store used by most tests.
/// `set_available(false)` simulates a disabled storage engine.
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
    available: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability; while false every operation reports
    /// `StorageError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable)
        }
    }
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStorePort for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        let entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.check_available()?;
        let entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove_round_trip() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "v").expect("set");
        assert_eq!(store.get("k").expect("get").as_deref(), Some("v"));

        store.remove("k").expect("remove");
        assert_eq!(store.get("k").expect("get"), None);
    }

    #[test]
    fn default_store_starts_available() {
        let store = MemoryKeyValueStore::default();
        store.set("k", "v").expect("set");
        assert_eq!(store.get("k").expect("get").as_deref(), Some("v"));
    }

    #[test]
    fn unavailable_store_rejects_everything() {
        let store = MemoryKeyValueStore::new();
        store.set_available(false);

        assert_eq!(store.set("k", "v"), Err(StorageError::Unavailable));
        assert_eq!(store.get("k"), Err(StorageError::Unavailable));
        assert_eq!(store.keys(), Err(StorageError::Unavailable));
    }
}
