use std::collections::{BTreeMap, BTreeSet};

use crate::{
    backends::Timestamp,
    oid::{IndexSelection, Oid, TimestampSelection},
};

use super::{
    event::ListenerKey,
    value::{AttributeValue, RetentionPolicy, TimestampedValue, ValueType},
};

/// Handle to a node inside a [`StateTree`](super::StateTree).
///
/// Handles carry a generation so a handle to a removed node never aliases a
/// node that later reuses its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    Attribute,
    Document,
    Collection,
}

pub(crate) struct Node {
    pub(crate) oid: Oid,
    pub(crate) parent: Option<NodeId>,
    pub(crate) listeners: BTreeSet<ListenerKey>,
    pub(crate) kind: NodeKind,
}

pub(crate) enum NodeKind {
    Attribute(Attribute),
    /// Children keyed by element name
    Document(BTreeMap<String, NodeId>),
    /// Member documents keyed by id
    Collection(BTreeMap<String, NodeId>),
}

impl NodeKind {
    pub(crate) fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Attribute(_) => NodeType::Attribute,
            NodeKind::Document(_) => NodeType::Document,
            NodeKind::Collection(_) => NodeType::Collection,
        }
    }

    pub(crate) fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        let children = match self {
            NodeKind::Attribute(_) => None,
            NodeKind::Document(children) | NodeKind::Collection(children) => Some(children),
        };
        children.into_iter().flat_map(|c| c.values().copied())
    }
}

/// Computes an attribute's value on every read
pub type AttributeSource = Box<dyn Fn() -> AttributeValue + Send>;

/// A leaf holding a timestamped value and, optionally, its history
#[derive(Default)]
pub struct Attribute {
    current: Option<TimestampedValue>,
    history: Vec<TimestampedValue>,
    retention: Option<RetentionPolicy>,
    value_type: Option<ValueType>,
    source: Option<AttributeSource>,
}

impl Attribute {
    /// The current value, computed when a source is bound
    pub fn get(&self) -> Option<AttributeValue> {
        match &self.source {
            Some(source) => Some(source()),
            None => self.current.as_ref().map(|current| current.value.clone()),
        }
    }

    /// The stored value with its timestamp. A bound source produces a value
    /// stamped with the current time.
    pub fn current(&self) -> Option<TimestampedValue> {
        match &self.source {
            Some(source) => Some(TimestampedValue {
                timestamp: Timestamp::now_or_zero(),
                value: source(),
            }),
            None => self.current.clone(),
        }
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.current.as_ref().map(|current| current.timestamp)
    }

    /// Replaced values, oldest first
    pub fn history(&self) -> &[TimestampedValue] {
        &self.history
    }

    /// Historical values narrowed by the selectors of an Oid
    pub fn select_history(
        &self,
        index: Option<IndexSelection>,
        timestamp: Option<TimestampSelection>,
    ) -> Vec<&TimestampedValue> {
        self.history
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                index.map_or(true, |range| {
                    i32::try_from(*i).map_or(false, |i| range.contains(i))
                })
            })
            .filter(|(_, value)| timestamp.map_or(true, |range| range.contains(value.timestamp)))
            .map(|(_, value)| value)
            .collect()
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.value_type
    }

    pub fn retention(&self) -> Option<RetentionPolicy> {
        self.retention
    }

    pub fn is_bound(&self) -> bool {
        self.source.is_some()
    }

    pub(crate) fn set_retention(&mut self, retention: Option<RetentionPolicy>) {
        self.retention = retention;
        if retention.is_none() {
            self.history.clear();
        }
        self.enforce_retention();
    }

    pub(crate) fn bind(&mut self, source: Option<AttributeSource>) {
        self.source = source;
    }

    /// Whether a value of `found` type may be stored here
    pub(crate) fn accepts(&self, found: ValueType) -> Result<(), ValueType> {
        match self.value_type {
            Some(expected) if expected != found => Err(expected),
            _ => Ok(()),
        }
    }

    /// Store a new value and return the one it replaced
    pub(crate) fn replace(&mut self, next: Option<TimestampedValue>) -> Option<TimestampedValue> {
        if let Some(next) = &next {
            self.value_type.get_or_insert(next.value.value_type());
        }
        let old = std::mem::replace(&mut self.current, next);
        if self.retention.is_some() {
            if let Some(old) = &old {
                self.history.push(old.clone());
            }
            self.enforce_retention();
        }
        old
    }

    /// Whether a record stamped `timestamp` should replace the current value
    pub(crate) fn is_newer(&self, timestamp: u64) -> bool {
        self.current
            .as_ref()
            .map_or(true, |current| timestamp > current.timestamp)
    }

    fn enforce_retention(&mut self) {
        match self.retention {
            Some(RetentionPolicy::ItemLimited(limit)) => {
                if self.history.len() > limit {
                    let excess = self.history.len() - limit;
                    self.history.drain(..excess);
                }
            }
            Some(RetentionPolicy::TimeLimited(window)) => {
                if let Some(now) = self.timestamp() {
                    let horizon = now.saturating_sub(window);
                    self.history.retain(|value| value.timestamp >= horizon);
                }
            }
            Some(RetentionPolicy::Unlimited) | None => {}
        }
    }
}
