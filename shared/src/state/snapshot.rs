use crate::oid::Oid;

use super::{
    delta::Delta,
    node::{NodeId, NodeKind},
    tree::StateTree,
};

/// Options for [`StateTree::snapshot`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// When non-empty, only nodes at or below one of these Oids are emitted
    /// (plus the documents leading to them)
    pub whitelist: Vec<Oid>,
}

impl SnapshotConfig {
    pub fn whitelist(whitelist: Vec<Oid>) -> Self {
        Self { whitelist }
    }
}

/// One-shot pre-order walk over a subtree.
///
/// A document is always yielded before anything below it, so replaying the
/// sequence through [`StateTree::merge`] rebuilds the structure top-down.
/// Paths are relative to the base in the form `merge` expects: members of a
/// collection base keep their own component, and an attribute base yields its
/// value at the empty path.
pub struct Snapshot<'a> {
    tree: &'a StateTree,
    depth: usize,
    whitelist: Vec<Oid>,
    stack: Vec<NodeId>,
}

impl<'a> Snapshot<'a> {
    pub(crate) fn new(tree: &'a StateTree, base: NodeId, whitelist: Vec<Oid>) -> Self {
        let (depth, stack) = match tree.node(base) {
            Ok(node) => {
                let depth = node.oid.path().len();
                match &node.kind {
                    NodeKind::Attribute(_) => (depth, vec![base]),
                    kind => {
                        let mut children: Vec<_> = kind.children().collect();
                        children.reverse();
                        // members share the collection's path length
                        let depth = match kind {
                            NodeKind::Collection(_) => depth.saturating_sub(1),
                            _ => depth,
                        };
                        (depth, children)
                    }
                }
            }
            Err(_) => (0, Vec::new()),
        };
        Self {
            tree,
            depth,
            whitelist,
            stack,
        }
    }

    /// Whether a node is inside the whitelist or on the way to an entry
    fn visible(&self, oid: &Oid) -> bool {
        self.whitelist.is_empty()
            || self
                .whitelist
                .iter()
                .any(|entry| oid.is_descendant_of(entry) || oid.is_ancestor_of(entry))
    }
}

impl Iterator for Snapshot<'_> {
    type Item = Delta;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        while let Some(id) = self.stack.pop() {
            let Ok(node) = tree.node(id) else {
                continue;
            };
            if !self.visible(&node.oid) {
                continue;
            }
            let start = self.stack.len();
            self.stack.extend(node.kind.children());
            self.stack[start..].reverse();

            let path = node.oid.path()[self.depth..].to_vec();
            match &node.kind {
                NodeKind::Document(_) => return Some(Delta::added(path)),
                NodeKind::Attribute(attribute) => {
                    if let Some(current) = attribute.current() {
                        return Some(Delta::value(path, current));
                    }
                }
                // members announce the collection implicitly
                NodeKind::Collection(_) => {}
            }
        }
        None
    }
}
