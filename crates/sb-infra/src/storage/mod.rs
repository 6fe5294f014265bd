//! Storage adapter and the persisted key layout.

pub mod keys;

mod adapter;

pub use adapter::{MigrationOutcome, StorageAdapter};
