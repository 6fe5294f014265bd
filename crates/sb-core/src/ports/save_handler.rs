/// The persistence callback the auto-save coordinator drives.
///
/// Registered at startup through `AutoSaveCoordinator::init`; mutation
/// sites only ever talk to the coordinator, never to this port directly.
#[async_trait::async_trait]
pub trait SaveHandlerPort: Send + Sync {
    /// Persist the current project's in-memory state to local storage.
    async fn save_current_project(&self) -> anyhow::Result<()>;
}
