use std::io;

use thiserror::Error;

/// Errors that can end a hole punch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HolePunchError {
    /// The peer sent something that is neither a request nor a response
    #[error("Unexpected hole punch datagram: {reason}")]
    Protocol { reason: String },

    /// The underlying channel failed
    #[error("Hole punch channel failed ({kind:?}): {reason}")]
    Io { kind: io::ErrorKind, reason: String },
}

impl From<io::Error> for HolePunchError {
    fn from(err: io::Error) -> Self {
        HolePunchError::Io {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}
