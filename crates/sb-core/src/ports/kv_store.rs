use crate::error::StorageError;

/// The local key-value store every component persists through.
///
/// Local I/O is synchronous and fast; only the remote store suspends. All
/// values are JSON strings; key scoping conventions live in the storage
/// adapter, not here.
pub trait KeyValueStorePort: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Every key currently present, in no particular order.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}
