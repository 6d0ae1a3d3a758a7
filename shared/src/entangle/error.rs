use thiserror::Error;

use crate::{
    codec::CodecError, connection::ConnectionError, state::StateError, stream::StreamError,
};

/// Errors that can occur while setting up or tearing down an entanglement
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntangleError {
    /// The entangled root must be a non-root Oid with every id above it resolved
    #[error("Cannot entangle {oid}: {reason}")]
    InvalidRoot { oid: String, reason: &'static str },

    /// A whitelist entry does not live under the entangled root
    #[error("Whitelist entry {entry} is not below the entangled root {root}")]
    WhitelistOutsideRoot { entry: String, root: String },

    /// Stream id 0 is reserved
    #[error("A sync needs a nonzero stream id")]
    ZeroStreamId,

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
