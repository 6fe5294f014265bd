//! # sb-infra
//!
//! Infrastructure adapters for the storyboard persistence core: key-value
//! store implementations, the storage adapter over the project-scoped key
//! layout, the quota guard, and the system clock.

pub mod kv;
pub mod quota;
pub mod storage;
pub mod time;

pub use kv::{FileKeyValueStore, MemoryKeyValueStore};
pub use quota::{QuotaGuard, QuotaSummary};
pub use storage::{MigrationOutcome, StorageAdapter};
pub use time::SystemClock;
