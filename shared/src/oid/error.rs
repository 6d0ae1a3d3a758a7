use thiserror::Error;

/// Errors that can occur while parsing or validating an [`Oid`](super::Oid)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OidError {
    /// The namespace contains characters outside of `[a-z.]`
    #[error("Illegal namespace '{namespace}'. A namespace may only contain lowercase letters and '.'")]
    InvalidNamespace { namespace: String },

    /// More than one ':' separator was found
    #[error("Invalid namespace separator in '{input}'. At most one ':' is allowed")]
    AmbiguousNamespace { input: String },

    /// A path element contains characters outside of `[a-z0-9_-*]`
    #[error("Illegal path element '{element}'. Elements may only contain lowercase letters, digits, '_', '-' and '*'")]
    InvalidElement { element: String },

    /// A path component id contains a reserved character
    #[error("Illegal id '{id}'. Ids may not contain '/', ':', '(', ')', '[' or ']'")]
    InvalidId { id: String },

    /// The trailing range selector could not be parsed
    #[error("Malformed range selector '{selector}': {reason}")]
    MalformedSelector {
        selector: String,
        reason: &'static str,
    },
}
