//! Project data model: registry metadata and the per-project payload.

mod metadata;
mod payload;

pub use metadata::{CloudProjectSummary, MetadataPatch, ProjectMetadata};
pub use payload::{Page, PageSlice, ProjectPayload, ProjectSettings, Shot, ShotSlice, UiSettings};
