use thiserror::Error;

use crate::codec::CodecError;

use super::ConnectionId;

/// Errors raised at the connection boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The connection has been closed by either side
    #[error("Connection {connection} is closed")]
    Closed { connection: ConnectionId },

    /// The underlying transport refused the message
    #[error("Failed to send on connection {connection}: {reason}")]
    SendFailed {
        connection: ConnectionId,
        reason: String,
    },

    /// Someone is already waiting for a response with this id
    #[error("A reader for response {id} is already registered")]
    DuplicateResponseReader { id: u32 },

    /// The payload was not of the type the caller expected
    #[error("Expected payload type {expected:#010x}, found {found:#010x}")]
    UnexpectedPayload { expected: u32, found: u32 },

    #[error(transparent)]
    Codec(#[from] CodecError),
}
