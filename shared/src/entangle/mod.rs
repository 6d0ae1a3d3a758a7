//! Mirroring a state subtree over a connection: a snapshot followed by live
//! deltas, published by a source and merged by a sink.

mod direction;
mod error;
mod object;
mod request;

pub use direction::{SyncDirection, SyncRoles};
pub use error::EntangleError;
pub use object::EntangledObject;
pub use request::{SyncConfig, SyncRequest};
