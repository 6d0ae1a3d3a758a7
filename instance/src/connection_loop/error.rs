use thiserror::Error;

/// Why a single connection attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// Worth retrying later (refused, unreachable, timed out)
    #[error("{0}")]
    Transient(String),

    /// Retrying cannot help; the loop stops
    #[error("{0}")]
    Fatal(String),
}

/// Errors that can end a connection loop
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionLoopError {
    /// The loop configuration is unusable
    #[error("Invalid connection loop config: {reason}")]
    InvalidConfig { reason: &'static str },

    /// A target string is not `host[:port]`
    #[error("Invalid connection target '{target}': {reason}")]
    InvalidTarget { target: String, reason: &'static str },

    /// An attempt failed in a way retrying cannot fix
    #[error("Connecting to {target} failed: {reason}")]
    Fatal { target: String, reason: String },

    /// The loop task died without resolving, e.g. a connector panicked
    #[error("The connection loop failed: {reason}")]
    Failed { reason: String },

    /// The loop task was aborted before it resolved
    #[error("The connection loop was cancelled")]
    Cancelled,
}
