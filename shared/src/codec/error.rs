use thiserror::Error;

/// Errors that can occur while decoding a binary record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The buffer ended before the record was complete
    #[error("Unexpected end of buffer while reading {field}: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// A tag byte did not name a known variant
    #[error("Unknown {kind} tag {tag}")]
    UnknownTag { kind: &'static str, tag: u8 },

    /// A length-prefixed string was not valid UTF-8
    #[error("Field {field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// A decoded field failed validation
    #[error("Field {field} is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Bytes were left over after the record was decoded
    #[error("{remaining} trailing bytes after record")]
    TrailingBytes { remaining: usize },
}
