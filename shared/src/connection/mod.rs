//! The boundary between routing logic and concrete transports.
//!
//! A [`Connection`] carries [`Message`]s to one remote instance. Connections
//! are owned by a [`ConnectionRegistry`]; everything else holds them through
//! `Arc<dyn Connection>`.

mod error;
mod message;
mod pending;

use std::{fmt, sync::Arc};

use tokio::sync::oneshot;

pub use error::ConnectionError;
pub use message::{payload_type_of, Message, Payload};
pub use pending::PendingResponses;

use crate::sid::Sid;

/// Identifies one live connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn random() -> Self {
        Self(fastrand::u64(..))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Session id of this instance as the remote end knows it
    fn local_sid(&self) -> Sid;

    /// Session id of the instance on the other end
    fn remote_sid(&self) -> Sid;

    /// Queue a message for delivery
    fn send(&self, message: Message) -> Result<(), ConnectionError>;

    /// Register a reader for the message whose id is `response_id`. Register
    /// before sending the request so a fast response cannot be missed.
    fn read(&self, response_id: u32) -> Result<oneshot::Receiver<Message>, ConnectionError>;

    fn is_open(&self) -> bool;
}

/// Owns the live connections of an instance
pub trait ConnectionRegistry: Send + Sync {
    fn get_by_sid(&self, sid: Sid) -> Option<Arc<dyn Connection>>;
}
