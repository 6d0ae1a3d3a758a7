//! The local view of the mesh: which instances are visible and over which
//! connections, plus routing of messages along that view.

mod config;
mod error;
mod event;
mod graph;
mod store;

pub use config::NetworkStoreConfig;
pub use error::NetworkError;
pub use event::NetworkEvent;
pub use graph::Link;
pub use store::NetworkStore;
