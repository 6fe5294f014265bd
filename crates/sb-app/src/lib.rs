//! Application services for the storyboard persistence core.
//!
//! Everything here composes the pure domain (`sb-core`) with the storage
//! and quota adapters (`sb-infra`) behind injected ports. The embedding
//! shell builds a [`LocalFirstCore`] once at startup and drives all
//! persistence through it.

pub mod autosave;
pub mod builder;
pub mod registry_service;
pub mod switcher;
pub mod sync_queue;

pub use autosave::AutoSaveCoordinator;
pub use builder::{CoreBuilder, LocalFirstCore};
pub use registry_service::ProjectRegistryService;
pub use switcher::ProjectSwitcher;
pub use sync_queue::SyncQueue;
