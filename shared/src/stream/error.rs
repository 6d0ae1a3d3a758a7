use thiserror::Error;

use crate::{codec::CodecError, connection::ConnectionError};

/// Errors that can occur while wiring or feeding streams
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// An item was submitted after the stream was closed
    #[error("Stream {stream_id} is closed")]
    Closed { stream_id: u32 },

    /// The publisher already feeds this subscriber
    #[error("Stream {stream_id} is already connected to this subscriber")]
    AlreadyConnected { stream_id: u32 },

    /// Stream id 0 is reserved
    #[error("Stream id 0 is reserved")]
    ZeroStreamId,

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
