//! Trait seams between the core and its collaborators.
//!
//! Infrastructure implements these; the application layer consumes them
//! through `Arc<dyn Port>`, so every service can be exercised with
//! hand-written test doubles.

mod auth;
mod clock;
mod kv_store;
mod network;
mod remote_store;
mod save_handler;

pub use auth::AuthStatePort;
pub use clock::ClockPort;
pub use kv_store::KeyValueStorePort;
pub use network::{NetworkEvent, NetworkStatusPort};
pub use remote_store::RemoteProjectStorePort;
pub use save_handler::SaveHandlerPort;
