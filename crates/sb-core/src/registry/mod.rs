//! Authoritative catalogue of project metadata.

mod state;

pub use state::{
    ceiling_for, RegistrySnapshot, RegistryState, SortKey, AUTHENTICATED_PROJECT_LIMIT,
    GUEST_PROJECT_LIMIT,
};
