use tokio::sync::mpsc;

/// Connectivity edge events observed by the sync queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    Online,
    Offline,
}

/// Boolean online/offline state plus reconnect edges.
#[async_trait::async_trait]
pub trait NetworkStatusPort: Send + Sync {
    fn is_online(&self) -> bool;

    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<NetworkEvent>>;
}
