use crate::oid::Oid;

use super::value::TimestampedValue;

/// A change inside the state tree.
///
/// Events are delivered synchronously to listeners registered on the changed
/// node and on every one of its ancestors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateEvent {
    AttributeChanged {
        oid: Oid,
        old: Option<TimestampedValue>,
        new: Option<TimestampedValue>,
    },
    DocumentAdded {
        oid: Oid,
    },
    /// Emitted before the document (or collection) is detached
    DocumentRemoved {
        oid: Oid,
    },
    AttributeRemoved {
        oid: Oid,
    },
}

impl StateEvent {
    pub fn oid(&self) -> &Oid {
        match self {
            StateEvent::AttributeChanged { oid, .. }
            | StateEvent::DocumentAdded { oid }
            | StateEvent::DocumentRemoved { oid }
            | StateEvent::AttributeRemoved { oid } => oid,
        }
    }
}

/// Identifies a registered listener for later removal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey(pub(crate) u64);

pub type Listener = Box<dyn FnMut(&StateEvent) + Send>;
