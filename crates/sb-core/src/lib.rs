//! # sb-core
//!
//! Core domain models and business logic for the storyboard persistence
//! core: the project data model, registry state, sync-queue state machine,
//! validator, quota policy, and the ports the other layers plug into.
//!
//! This crate contains pure business logic without any infrastructure
//! dependencies.

pub mod error;
pub mod ids;
pub mod ports;
pub mod project;
pub mod quota;
pub mod registry;
pub mod sync;
pub mod validate;

// Re-export commonly used types at the crate root
pub use error::{RegistryError, StorageError};
pub use ids::{ProjectId, SyncItemId};
pub use project::{CloudProjectSummary, ProjectMetadata, ProjectPayload};
pub use registry::{RegistryState, SortKey};
pub use sync::{SyncEntryState, SyncQueueEntry, SyncQueueStatus};
