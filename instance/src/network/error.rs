use std::time::Duration;

use thiserror::Error;

use meshnet_shared::{ConnectionError, Sid};

/// Errors that can occur while routing through the network store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The destination is not adjacent and there is no server to relay through
    #[error("No route to {to}: not directly connected and no server is reachable")]
    NoRoute { to: Sid },

    /// A message was addressed to this instance
    #[error("Refusing to route a message to ourselves ({sid})")]
    RouteToSelf { sid: Sid },

    /// This instance has not been assigned a session id yet
    #[error("This instance has no session id yet")]
    NoSid,

    /// A connection's remote end claims our own session id
    #[error("Connection {connection} loops back to our own session id {sid}")]
    SelfLoop { sid: Sid, connection: String },

    /// The registry has no live connection for a next hop
    #[error("No live connection to {sid}")]
    NoConnection { sid: Sid },

    /// No response arrived in time
    #[error("No response to message {id} within {after:?}")]
    ResponseTimeout { id: u32, after: Duration },

    /// The connection went away while a response was pending
    #[error("Connection dropped while waiting for the response to message {id}")]
    ResponseDropped { id: u32 },

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
