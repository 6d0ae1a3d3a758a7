//! The state tree: documents, collections and attributes addressed by
//! [`Oid`](crate::Oid), with change events and last-write-wins merging.

mod delta;
mod error;
mod event;
mod node;
mod snapshot;
mod tree;
mod value;

pub use delta::{Delta, DeltaKind};
pub use error::StateError;
pub use event::{Listener, ListenerKey, StateEvent};
pub use node::{Attribute, AttributeSource, NodeId, NodeType};
pub use snapshot::{Snapshot, SnapshotConfig};
pub use tree::{lock_tree, SharedStateTree, StateTree};
pub use value::{AttributeValue, RetentionPolicy, TimestampedValue, ValueType};
