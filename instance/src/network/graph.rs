use std::collections::BTreeSet;

use meshnet_shared::{ConnectionId, Sid};

/// A live connection between two instances
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Link {
    pub a: Sid,
    pub b: Sid,
    pub connection: ConnectionId,
}

impl Link {
    pub fn touches(&self, sid: Sid) -> bool {
        self.a == sid || self.b == sid
    }

    pub fn joins(&self, a: Sid, b: Sid) -> bool {
        (self.a == a && self.b == b) || (self.a == b && self.b == a)
    }

    /// The end that is not `sid`
    pub fn other(&self, sid: Sid) -> Sid {
        if self.a == sid {
            self.b
        } else {
            self.a
        }
    }
}

/// Undirected multigraph of instances. Parallel links are allowed, loops
/// are not.
#[derive(Clone, Debug, Default)]
pub(crate) struct Graph {
    nodes: BTreeSet<Sid>,
    links: Vec<Link>,
}

impl Graph {
    pub(crate) fn add_node(&mut self, sid: Sid) -> bool {
        self.nodes.insert(sid)
    }

    /// Remove a node and every link touching it
    pub(crate) fn remove_node(&mut self, sid: Sid) -> bool {
        self.links.retain(|link| !link.touches(sid));
        self.nodes.remove(&sid)
    }

    pub(crate) fn contains(&self, sid: Sid) -> bool {
        self.nodes.contains(&sid)
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = Sid> + '_ {
        self.nodes.iter().copied()
    }

    /// Add a link, creating missing end nodes. Returns false for a loop.
    pub(crate) fn add_link(&mut self, link: Link) -> bool {
        if link.a == link.b {
            return false;
        }
        self.nodes.insert(link.a);
        self.nodes.insert(link.b);
        self.links.push(link);
        true
    }

    pub(crate) fn remove_link_by_connection(&mut self, connection: ConnectionId) -> Option<Link> {
        let index = self
            .links
            .iter()
            .position(|link| link.connection == connection)?;
        Some(self.links.swap_remove(index))
    }

    pub(crate) fn remove_link_between(&mut self, a: Sid, b: Sid) -> Option<Link> {
        let index = self.links.iter().position(|link| link.joins(a, b))?;
        Some(self.links.swap_remove(index))
    }

    pub(crate) fn links_of(&self, sid: Sid) -> impl Iterator<Item = &Link> + '_ {
        self.links.iter().filter(move |link| link.touches(sid))
    }

    pub(crate) fn links_between(&self, a: Sid, b: Sid) -> impl Iterator<Item = &Link> + '_ {
        self.links.iter().filter(move |link| link.joins(a, b))
    }

    pub(crate) fn neighbours(&self, sid: Sid) -> BTreeSet<Sid> {
        self.links_of(sid).map(|link| link.other(sid)).collect()
    }

    pub(crate) fn degree(&self, sid: Sid) -> usize {
        self.links_of(sid).count()
    }

    /// Drop every unlinked node except `keep`, returning the dropped ones
    pub(crate) fn prune(&mut self, keep: Sid) -> Vec<Sid> {
        let isolated: Vec<Sid> = self
            .nodes
            .iter()
            .copied()
            .filter(|sid| *sid != keep && self.degree(*sid) == 0)
            .collect();
        for sid in &isolated {
            self.nodes.remove(sid);
        }
        isolated
    }
}
