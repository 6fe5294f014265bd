use crate::ids::ProjectId;
use crate::project::{CloudProjectSummary, ProjectPayload};

/// The remote project store mirroring local commits, keyed by project id.
///
/// Authentication has already happened by the time a caller holds an
/// implementation of this port.
#[async_trait::async_trait]
pub trait RemoteProjectStorePort: Send + Sync {
    /// Create or update the remote copy of a project's full payload.
    async fn upsert_project(&self, id: &ProjectId, payload: &ProjectPayload)
        -> anyhow::Result<()>;

    /// Fetch a project's full payload, `None` when the remote store has no
    /// row for it.
    async fn fetch_project(&self, id: &ProjectId) -> anyhow::Result<Option<ProjectPayload>>;

    /// List the authenticated user's projects.
    async fn list_projects(&self) -> anyhow::Result<Vec<CloudProjectSummary>>;
}
