//! Key-value store implementations behind `KeyValueStorePort`.

mod file;
mod memory;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;
