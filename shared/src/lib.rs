//! # Meshnet Shared
//! Common functionality shared by every meshnet instance: object ids, the
//! state tree, stream transport and entanglement.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

mod backends;
mod codec;
mod connection;
mod entangle;
mod oid;
mod sid;
mod state;
mod stream;

pub use backends::{TimeError, Timestamp};
pub use codec::{Codec, CodecError};
pub use connection::{
    payload_type_of, Connection, ConnectionError, ConnectionId, ConnectionRegistry, Message,
    Payload, PendingResponses,
};
pub use entangle::{
    EntangleError, EntangledObject, SyncConfig, SyncDirection, SyncRequest, SyncRoles,
};
pub use oid::{
    IndexSelection, Oid, OidError, PathComponent, Selection, TimestampSelection,
    DEFAULT_NAMESPACE, WILDCARD,
};
pub use sid::{InstanceFlavor, InstanceType, Sid, SidError};
pub use state::{
    lock_tree, Attribute, AttributeSource, AttributeValue, Delta, DeltaKind, Listener,
    ListenerKey, NodeId, NodeType, RetentionPolicy, SharedStateTree, Snapshot, SnapshotConfig,
    StateError, StateEvent, StateTree, TimestampedValue, ValueType,
};
pub use stream::{
    ClosedEnd, EndpointRole, InboundStreamAdapter, OutboundStreamAdapter, StreamClose,
    StreamData, StreamError, StreamSink, StreamSource, StreamStore, Subscriber,
};
