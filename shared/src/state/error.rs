use thiserror::Error;

use crate::{backends::TimeError, codec::CodecError, oid::OidError};

use super::{node::NodeType, value::ValueType};

/// Errors that can occur while reading or mutating the state tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The node handle refers to a node that has been removed
    #[error("Node handle {index}:{generation} is stale or was never allocated")]
    NodeNotFound { index: u32, generation: u32 },

    /// An operation expected a different kind of node
    #[error("Node {oid} is a {found:?}, expected a {expected:?}")]
    WrongKind {
        oid: String,
        expected: NodeType,
        found: NodeType,
    },

    /// A child name is not a valid path element
    #[error("Illegal child name '{name}'. Names may only contain lowercase letters, digits, '_' and '-'")]
    InvalidName { name: String },

    /// A collection member id is empty or contains a reserved character
    #[error("Illegal collection member id '{id}'")]
    InvalidMemberId { id: String },

    /// An attribute was set to a value of a different type than it already holds
    #[error("Attribute {oid} holds {expected} values, refusing to store a {found}")]
    TypeMismatch {
        oid: String,
        expected: ValueType,
        found: ValueType,
    },

    /// The attribute's value is computed by a bound source
    #[error("Attribute {oid} is bound to a source and cannot be set")]
    AttributeBound { oid: String },

    /// A path could not be navigated
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// An Oid does not belong to this tree's namespace
    #[error("Oid namespace '{found}' does not match the tree namespace '{expected}'")]
    NamespaceMismatch { expected: String, found: String },

    /// The root document cannot be removed
    #[error("The root document cannot be removed")]
    RemoveRoot,

    #[error(transparent)]
    Oid(#[from] OidError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Time(#[from] TimeError),
}
