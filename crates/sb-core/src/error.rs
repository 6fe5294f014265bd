//! Typed error taxonomy for the persistence core.
//!
//! Every variant here is recovered at a component boundary (storage adapter,
//! quota guard, sync queue, registry) and surfaced as a value, never as a
//! panic. Losing already-locally-committed content is not a possible outcome
//! of any of these errors.

use thiserror::Error;

use crate::ids::ProjectId;

/// Failures of the local key-value store or of data read back from it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The underlying store is disabled or rejecting writes. Components
    /// degrade to in-memory operation and warn once.
    #[error("local storage is unavailable")]
    Unavailable,

    /// A value failed to parse. The offending key is deleted and the
    /// component falls back to defaults.
    #[error("corrupted data under key `{0}`")]
    Corrupted(String),

    /// A write would exceed the storage quota.
    #[error("quota exceeded: write of {size} bytes against a {limit} byte limit")]
    QuotaExceeded { size: u64, limit: u64 },
}

/// Refusals and failures of project registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The plan-based project ceiling is reached. A rejected create, not a
    /// crash; the UI presents it as a normal validation message.
    #[error("project limit reached ({limit} projects)")]
    LimitReached { limit: usize },

    /// An operation referenced a project id the registry does not know.
    #[error("unknown project `{0}`")]
    UnknownProject(ProjectId),

    /// A create was attempted with an id the registry already tracks.
    #[error("project `{0}` already exists")]
    DuplicateProject(ProjectId),
}
