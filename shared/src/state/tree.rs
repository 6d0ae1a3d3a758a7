use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::trace;

use crate::{
    backends::Timestamp,
    oid::{
        component::{is_valid_element, is_valid_id},
        Oid, PathComponent, DEFAULT_NAMESPACE, WILDCARD,
    },
};

use super::{
    delta::{Delta, DeltaKind},
    error::StateError,
    event::{Listener, ListenerKey, StateEvent},
    node::{Attribute, AttributeSource, Node, NodeId, NodeKind, NodeType},
    snapshot::{Snapshot, SnapshotConfig},
    value::{AttributeValue, RetentionPolicy, TimestampedValue},
};

/// A state tree shared between the local instance and its entanglements
pub type SharedStateTree = Arc<Mutex<StateTree>>;

/// Lock a shared tree. A listener that panicked leaves the tree itself
/// consistent, so a poisoned lock is recovered.
pub fn lock_tree(tree: &SharedStateTree) -> MutexGuard<'_, StateTree> {
    tree.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

struct Registration {
    node: NodeId,
    callback: Listener,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Leaf {
    Attribute,
    Document,
    Any,
}

/// Hierarchical store of documents, collections and attributes.
///
/// Nodes live in an arena owned by the tree. Parents own their children and
/// children refer back to their parent by [`NodeId`].
pub struct StateTree {
    namespace: String,
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    listeners: HashMap<ListenerKey, Registration>,
    next_listener: u64,
}

impl StateTree {
    pub fn new() -> Self {
        Self::with_root(Oid::from_parts(DEFAULT_NAMESPACE, Vec::new()))
    }

    pub fn with_namespace(namespace: &str) -> Result<Self, StateError> {
        Ok(Self::with_root(Oid::root(namespace)?))
    }

    fn with_root(oid: Oid) -> Self {
        let root = Node {
            oid,
            parent: None,
            listeners: BTreeSet::new(),
            kind: NodeKind::Document(BTreeMap::new()),
        };
        Self {
            namespace: root.oid.namespace().to_string(),
            slots: vec![Slot {
                generation: 0,
                node: Some(root),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            listeners: HashMap::new(),
            next_listener: 0,
        }
    }

    pub fn into_shared(self) -> SharedStateTree {
        Arc::new(Mutex::new(self))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn oid(&self, id: NodeId) -> Result<&Oid, StateError> {
        Ok(&self.node(id)?.oid)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, StateError> {
        Ok(self.node(id)?.parent)
    }

    pub fn node_type(&self, id: NodeId) -> Result<NodeType, StateError> {
        Ok(self.node(id)?.kind.node_type())
    }

    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>, StateError> {
        Ok(self.node(id)?.kind.children().collect())
    }

    // Structure

    /// Get or create a child document. On a collection this addresses the
    /// member document with the given id.
    pub fn document(&mut self, parent: NodeId, name: &str) -> Result<NodeId, StateError> {
        self.child(parent, name, NodeType::Document, true)
            .and_then(|child| self.expect_created(child, parent))
    }

    pub fn attribute(&mut self, parent: NodeId, name: &str) -> Result<NodeId, StateError> {
        self.child(parent, name, NodeType::Attribute, true)
            .and_then(|child| self.expect_created(child, parent))
    }

    pub fn collection(&mut self, parent: NodeId, name: &str) -> Result<NodeId, StateError> {
        self.child(parent, name, NodeType::Collection, true)
            .and_then(|child| self.expect_created(child, parent))
    }

    pub fn get_document(&mut self, parent: NodeId, name: &str) -> Result<Option<NodeId>, StateError> {
        self.child(parent, name, NodeType::Document, false)
    }

    pub fn get_attribute(&mut self, parent: NodeId, name: &str) -> Result<Option<NodeId>, StateError> {
        self.child(parent, name, NodeType::Attribute, false)
    }

    pub fn get_collection(
        &mut self,
        parent: NodeId,
        name: &str,
    ) -> Result<Option<NodeId>, StateError> {
        self.child(parent, name, NodeType::Collection, false)
    }

    /// Get or create the attribute at `oid`, creating intermediate documents
    pub fn attribute_at(&mut self, oid: &Oid) -> Result<NodeId, StateError> {
        self.check_namespace(oid)?;
        self.navigate(self.root, oid.path(), Leaf::Attribute, true)?
            .ok_or_else(|| invalid_path(oid.path(), "attribute could not be created"))
    }

    /// Get or create the document at `oid`, creating intermediate documents
    pub fn document_at(&mut self, oid: &Oid) -> Result<NodeId, StateError> {
        self.check_namespace(oid)?;
        self.navigate(self.root, oid.path(), Leaf::Document, true)?
            .ok_or_else(|| invalid_path(oid.path(), "document could not be created"))
    }

    /// Get or create the collection at `oid`, whose last component is an empty
    /// id slot such as `/profile()`
    pub fn collection_at(&mut self, oid: &Oid) -> Result<NodeId, StateError> {
        self.check_namespace(oid)?;
        let Some((last, parents)) = oid.path().split_last() else {
            return Err(invalid_path(oid.path(), "a collection path cannot be empty"));
        };
        if !last.is_unresolved() {
            return Err(invalid_path(oid.path(), "a collection ends in an empty id slot"));
        }
        let parent = self
            .navigate(self.root, parents, Leaf::Document, true)?
            .ok_or_else(|| invalid_path(oid.path(), "document could not be created"))?;
        self.child(parent, last.element(), NodeType::Collection, true)
            .map_err(|err| refine_path_error(err, oid.path()))?
            .ok_or_else(|| invalid_path(oid.path(), "collection could not be created"))
    }

    /// Look up whatever node lives at `oid` without creating anything
    pub fn find(&mut self, oid: &Oid) -> Result<Option<NodeId>, StateError> {
        self.check_namespace(oid)?;
        self.navigate(self.root, oid.path(), Leaf::Any, false)
    }

    /// Remove the named child of a document (or member of a collection)
    pub fn remove(&mut self, parent: NodeId, name: &str) -> Result<bool, StateError> {
        let child = match &self.node(parent)?.kind {
            NodeKind::Document(children) | NodeKind::Collection(children) => {
                children.get(name).copied()
            }
            NodeKind::Attribute(_) => return Err(self.wrong_kind(parent, NodeType::Document)),
        };
        match child {
            Some(child) => self.remove_node(child).map(|_| true),
            None => Ok(false),
        }
    }

    /// Announce the removal of a node and then destroy its subtree
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), StateError> {
        if id == self.root {
            return Err(StateError::RemoveRoot);
        }
        let node = self.node(id)?;
        let oid = node.oid.clone();
        let parent = node.parent;
        let event = match node.kind.node_type() {
            NodeType::Attribute => StateEvent::AttributeRemoved { oid },
            NodeType::Document | NodeType::Collection => StateEvent::DocumentRemoved { oid },
        };
        self.dispatch(id, &event);

        if let Some(parent) = parent {
            if let Ok(parent) = self.node_mut(parent) {
                if let NodeKind::Document(children) | NodeKind::Collection(children) =
                    &mut parent.kind
                {
                    children.retain(|_, child| *child != id);
                }
            }
        }

        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(node) = self.release(next) else {
                continue;
            };
            stack.extend(node.kind.children());
            for key in node.listeners {
                self.listeners.remove(&key);
            }
        }
        trace!("removed {}", event.oid());
        Ok(())
    }

    // Attributes

    pub fn attribute_ref(&self, id: NodeId) -> Result<&Attribute, StateError> {
        match &self.node(id)?.kind {
            NodeKind::Attribute(attribute) => Ok(attribute),
            _ => Err(self.wrong_kind(id, NodeType::Attribute)),
        }
    }

    pub fn get(&self, id: NodeId) -> Result<Option<AttributeValue>, StateError> {
        Ok(self.attribute_ref(id)?.get())
    }

    /// Set an attribute, stamped with the current time
    pub fn set(&mut self, id: NodeId, value: impl Into<AttributeValue>) -> Result<(), StateError> {
        let timestamp = Timestamp::try_now()?;
        self.set_at(id, value, timestamp)
    }

    /// Set an attribute with an explicit timestamp
    pub fn set_at(
        &mut self,
        id: NodeId,
        value: impl Into<AttributeValue>,
        timestamp: u64,
    ) -> Result<(), StateError> {
        let next = TimestampedValue::new(value, timestamp);
        let attribute = self.attribute_mut(id)?;
        if attribute.is_bound() {
            return Err(StateError::AttributeBound {
                oid: self.oid_string(id),
            });
        }
        self.store(id, next)
    }

    /// Drop the current value
    pub fn clear(&mut self, id: NodeId) -> Result<(), StateError> {
        let attribute = self.attribute_mut(id)?;
        if attribute.is_bound() {
            return Err(StateError::AttributeBound {
                oid: self.oid_string(id),
            });
        }
        let old = attribute.replace(None);
        if old.is_some() {
            let oid = self.node(id)?.oid.clone();
            self.dispatch(id, &StateEvent::AttributeChanged { oid, old, new: None });
        }
        Ok(())
    }

    pub fn set_retention(
        &mut self,
        id: NodeId,
        retention: Option<RetentionPolicy>,
    ) -> Result<(), StateError> {
        self.attribute_mut(id)?.set_retention(retention);
        Ok(())
    }

    /// Replace the attribute's getter with a computed value
    pub fn bind(&mut self, id: NodeId, source: AttributeSource) -> Result<(), StateError> {
        self.attribute_mut(id)?.bind(Some(source));
        Ok(())
    }

    pub fn unbind(&mut self, id: NodeId) -> Result<(), StateError> {
        self.attribute_mut(id)?.bind(None);
        Ok(())
    }

    /// Apply a delta addressed relative to `base`.
    ///
    /// Values are last-write-wins by timestamp: a record that is not strictly
    /// newer than the stored value changes nothing, so the first of two
    /// records with equal timestamps is kept. Returns whether the tree changed.
    ///
    /// Below a collection base the path starts with the member component
    /// (`/profile(alice)/name`); an attribute base takes values at the empty
    /// path.
    pub fn merge(&mut self, base: NodeId, delta: &Delta) -> Result<bool, StateError> {
        match &delta.kind {
            DeltaKind::Value(value) => {
                let id = self
                    .navigate(base, &delta.path, Leaf::Attribute, true)?
                    .ok_or_else(|| invalid_path(&delta.path, "attribute could not be created"))?;
                if !self.attribute_ref(id)?.is_newer(value.timestamp) {
                    trace!("ignoring stale value for {}", delta.path_string());
                    return Ok(false);
                }
                self.store(id, value.clone())?;
                Ok(true)
            }
            DeltaKind::Added => {
                let before = self.navigate(base, &delta.path, Leaf::Document, false)?;
                if before.is_some() {
                    return Ok(false);
                }
                self.navigate(base, &delta.path, Leaf::Document, true)?;
                Ok(true)
            }
            DeltaKind::Removed => {
                if delta.path.is_empty() {
                    return Err(invalid_path(&delta.path, "the merge base cannot be removed"));
                }
                match self.navigate(base, &delta.path, Leaf::Any, false)? {
                    Some(id) => self.remove_node(id).map(|_| true),
                    None => Ok(false),
                }
            }
        }
    }

    /// A lazy walk over the subtree at `base`, yielding one delta per
    /// document and per attribute holding a value
    pub fn snapshot(&self, base: NodeId, config: &SnapshotConfig) -> Result<Snapshot<'_>, StateError> {
        self.node(base)?;
        Ok(Snapshot::new(self, base, config.whitelist.clone()))
    }

    // Listeners

    /// Register a listener for events on `node` and its descendants
    pub fn add_listener(
        &mut self,
        node: NodeId,
        callback: impl FnMut(&StateEvent) + Send + 'static,
    ) -> Result<ListenerKey, StateError> {
        let key = ListenerKey(self.next_listener);
        self.node_mut(node)?.listeners.insert(key);
        self.next_listener += 1;
        self.listeners.insert(
            key,
            Registration {
                node,
                callback: Box::new(callback),
            },
        );
        Ok(key)
    }

    /// Unregister a listener. Returns false when it was already gone.
    pub fn remove_listener(&mut self, key: ListenerKey) -> bool {
        match self.listeners.remove(&key) {
            Some(registration) => {
                if let Ok(node) = self.node_mut(registration.node) {
                    node.listeners.remove(&key);
                }
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // Internals

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node, StateError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(StateError::NodeNotFound {
                index: id.index,
                generation: id.generation,
            })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, StateError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(StateError::NodeNotFound {
                index: id.index,
                generation: id.generation,
            })
    }

    fn attribute_mut(&mut self, id: NodeId) -> Result<&mut Attribute, StateError> {
        if self.node(id)?.kind.node_type() != NodeType::Attribute {
            return Err(self.wrong_kind(id, NodeType::Attribute));
        }
        match &mut self.node_mut(id)?.kind {
            NodeKind::Attribute(attribute) => Ok(attribute),
            _ => Err(StateError::NodeNotFound {
                index: id.index,
                generation: id.generation,
            }),
        }
    }

    fn store(&mut self, id: NodeId, next: TimestampedValue) -> Result<(), StateError> {
        let found = next.value.value_type();
        let attribute = self.attribute_mut(id)?;
        if let Err(expected) = attribute.accepts(found) {
            return Err(StateError::TypeMismatch {
                oid: self.oid_string(id),
                expected,
                found,
            });
        }
        let old = attribute.replace(Some(next.clone()));
        let oid = self.node(id)?.oid.clone();
        self.dispatch(
            id,
            &StateEvent::AttributeChanged {
                oid,
                old,
                new: Some(next),
            },
        );
        Ok(())
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    fn release(&mut self, id: NodeId) -> Option<Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(node)
    }

    /// Fire `event` on `origin` and every ancestor, innermost first
    fn dispatch(&mut self, origin: NodeId, event: &StateEvent) {
        let mut keys = Vec::new();
        let mut cursor = Some(origin);
        while let Some(id) = cursor {
            let Ok(node) = self.node(id) else {
                break;
            };
            keys.extend(node.listeners.iter().copied());
            cursor = node.parent;
        }
        if keys.is_empty() {
            return;
        }
        trace!("dispatching {:?} to {} listeners", event, keys.len());
        for key in keys {
            if let Some(registration) = self.listeners.get_mut(&key) {
                (registration.callback)(event);
            }
        }
    }

    /// Find or create the child of `parent` called `name` (a member id when
    /// `parent` is a collection)
    fn child(
        &mut self,
        parent: NodeId,
        name: &str,
        kind: NodeType,
        create: bool,
    ) -> Result<Option<NodeId>, StateError> {
        let parent_node = self.node(parent)?;
        let member = match &parent_node.kind {
            NodeKind::Document(_) => false,
            NodeKind::Collection(_) if kind == NodeType::Document => true,
            NodeKind::Collection(_) | NodeKind::Attribute(_) => {
                return Err(self.wrong_kind(parent, NodeType::Document))
            }
        };

        if member {
            if !is_valid_id(name) || name == WILDCARD {
                return Err(StateError::InvalidMemberId {
                    id: name.to_string(),
                });
            }
        } else if !is_valid_element(name) || name.contains('*') {
            return Err(StateError::InvalidName {
                name: name.to_string(),
            });
        }

        if let NodeKind::Document(children) | NodeKind::Collection(children) = &parent_node.kind
        {
            if let Some(&existing) = children.get(name) {
                let found = self.node(existing)?.kind.node_type();
                if found != kind {
                    return Err(StateError::WrongKind {
                        oid: self.oid_string(existing),
                        expected: kind,
                        found,
                    });
                }
                return Ok(Some(existing));
            }
        }
        if !create {
            return Ok(None);
        }

        let oid = if member {
            let mut path = parent_node.oid.path().to_vec();
            if let Some(last) = path.pop() {
                path.push(last.resolve(name));
            }
            Oid::from_parts(&self.namespace, path)
        } else {
            let component = PathComponent::new(name, None, kind == NodeType::Collection)?;
            parent_node.oid.extend(&[component])
        };
        let node_kind = match kind {
            NodeType::Attribute => NodeKind::Attribute(Attribute::default()),
            NodeType::Document => NodeKind::Document(BTreeMap::new()),
            NodeType::Collection => NodeKind::Collection(BTreeMap::new()),
        };

        let id = self.alloc(Node {
            oid: oid.clone(),
            parent: Some(parent),
            listeners: BTreeSet::new(),
            kind: node_kind,
        });
        if let NodeKind::Document(children) | NodeKind::Collection(children) =
            &mut self.node_mut(parent)?.kind
        {
            children.insert(name.to_string(), id);
        }
        if kind == NodeType::Document {
            self.dispatch(id, &StateEvent::DocumentAdded { oid });
        }
        Ok(Some(id))
    }

    fn navigate(
        &mut self,
        base: NodeId,
        path: &[PathComponent],
        leaf: Leaf,
        create: bool,
    ) -> Result<Option<NodeId>, StateError> {
        if let Some((first, rest)) = path.split_first() {
            if self.node(base)?.kind.node_type() == NodeType::Collection {
                return match self.member(base, first, path, create)? {
                    Some(member) => self.navigate(member, rest, leaf, create),
                    None => Ok(None),
                };
            }
        }
        let Some((last, intermediate)) = path.split_last() else {
            return match leaf {
                Leaf::Attribute => match self.node(base)?.kind.node_type() {
                    NodeType::Attribute => Ok(Some(base)),
                    _ => Err(invalid_path(path, "an attribute path cannot be empty")),
                },
                Leaf::Document => match self.node(base)?.kind.node_type() {
                    NodeType::Document => Ok(Some(base)),
                    _ => Err(self.wrong_kind(base, NodeType::Document)),
                },
                Leaf::Any => Ok(Some(base)),
            };
        };

        let mut cursor = base;
        for component in intermediate {
            match self.step(cursor, component, path, create)? {
                Some(next) => cursor = next,
                None => return Ok(None),
            }
        }

        match leaf {
            Leaf::Attribute => {
                if last.has_id() {
                    return Err(invalid_path(path, "an attribute cannot carry an id"));
                }
                self.child(cursor, last.element(), NodeType::Attribute, create)
                    .map_err(|err| refine_path_error(err, path))
            }
            Leaf::Document => self.step(cursor, last, path, create),
            Leaf::Any => {
                if last.has_id() {
                    match last.id() {
                        Some(_) => self.step(cursor, last, path, false),
                        None => self
                            .child(cursor, last.element(), NodeType::Collection, false)
                            .map_err(|err| refine_path_error(err, path)),
                    }
                } else {
                    let found = match &self.node(cursor)?.kind {
                        NodeKind::Document(children) => children.get(last.element()).copied(),
                        _ => return Err(invalid_path(path, "only documents have named children")),
                    };
                    Ok(found)
                }
            }
        }
    }

    /// Select a member of `collection` by a component such as `profile(alice)`
    fn member(
        &mut self,
        collection: NodeId,
        component: &PathComponent,
        path: &[PathComponent],
        create: bool,
    ) -> Result<Option<NodeId>, StateError> {
        let element = self
            .node(collection)?
            .oid
            .path()
            .last()
            .map(|last| last.element().to_string());
        if element.as_deref() != Some(component.element()) {
            return Err(invalid_path(path, "member does not belong to the collection"));
        }
        match component.id() {
            Some(id) if id != WILDCARD => self
                .child(collection, id, NodeType::Document, create)
                .map_err(|err| refine_path_error(err, path)),
            _ => Err(invalid_path(path, "every id-bearing component must be resolved")),
        }
    }

    /// Move one document-level step down `path`
    fn step(
        &mut self,
        cursor: NodeId,
        component: &PathComponent,
        path: &[PathComponent],
        create: bool,
    ) -> Result<Option<NodeId>, StateError> {
        if !component.has_id() {
            return self
                .child(cursor, component.element(), NodeType::Document, create)
                .map_err(|err| refine_path_error(err, path));
        }
        let id = match component.id() {
            Some(id) if id != WILDCARD => id,
            _ => return Err(invalid_path(path, "every id-bearing component must be resolved")),
        };
        let collection = self
            .child(cursor, component.element(), NodeType::Collection, create)
            .map_err(|err| refine_path_error(err, path))?;
        match collection {
            Some(collection) => self
                .child(collection, id, NodeType::Document, create)
                .map_err(|err| refine_path_error(err, path)),
            None => Ok(None),
        }
    }

    fn check_namespace(&self, oid: &Oid) -> Result<(), StateError> {
        if oid.namespace() != self.namespace {
            return Err(StateError::NamespaceMismatch {
                expected: self.namespace.clone(),
                found: oid.namespace().to_string(),
            });
        }
        Ok(())
    }

    fn expect_created(&self, child: Option<NodeId>, parent: NodeId) -> Result<NodeId, StateError> {
        child.ok_or_else(|| StateError::InvalidPath {
            path: self.oid_string(parent),
            reason: "child could not be created",
        })
    }

    fn wrong_kind(&self, id: NodeId, expected: NodeType) -> StateError {
        match self.node(id) {
            Ok(node) => StateError::WrongKind {
                oid: node.oid.to_string(),
                expected,
                found: node.kind.node_type(),
            },
            Err(err) => err,
        }
    }

    fn oid_string(&self, id: NodeId) -> String {
        self.node(id)
            .map(|node| node.oid.to_string())
            .unwrap_or_default()
    }
}

impl Default for StateTree {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_path(path: &[PathComponent], reason: &'static str) -> StateError {
    let mut text = String::new();
    for component in path {
        text.push('/');
        text.push_str(&component.to_string());
    }
    StateError::InvalidPath { path: text, reason }
}

/// Name errors raised while walking a delta path are reported against the
/// whole path
fn refine_path_error(err: StateError, path: &[PathComponent]) -> StateError {
    match err {
        StateError::InvalidName { .. } => invalid_path(path, "illegal path element"),
        StateError::InvalidMemberId { .. } => invalid_path(path, "illegal member id"),
        other => other,
    }
}
