use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, trace};
use tokio::sync::oneshot;

use meshnet_shared::{Connection, ConnectionId, ConnectionRegistry, Message, Sid};

use super::{
    config::NetworkStoreConfig,
    error::NetworkError,
    event::NetworkEvent,
    graph::{Graph, Link},
};

type EventListener = Box<dyn FnMut(&NetworkEvent) + Send>;

struct Inner {
    sid: Sid,
    network: Graph,
    preferred_server: Option<Sid>,
}

impl Inner {
    /// Keep the cached server while it is still visible, otherwise pick any
    /// visible server
    fn preferred_server(&mut self) -> Option<Sid> {
        if let Some(server) = self.preferred_server {
            if server != self.sid && self.network.contains(server) {
                return Some(server);
            }
        }
        let sid = self.sid;
        let chosen = self
            .network
            .nodes()
            .find(|node| *node != sid && node.is_server());
        if chosen != self.preferred_server {
            debug!("preferred server changed from {:?} to {:?}", self.preferred_server, chosen);
        }
        self.preferred_server = chosen;
        chosen
    }
}

/// The network view of one instance.
///
/// Nodes are the session ids this instance can see (itself included) and
/// links are the live connections between them. Every mutation happens under
/// one lock; events are published to listeners after it is released.
pub struct NetworkStore {
    config: NetworkStoreConfig,
    registry: Arc<dyn ConnectionRegistry>,
    inner: Mutex<Inner>,
    listeners: Mutex<Vec<EventListener>>,
}

impl NetworkStore {
    pub fn new(config: NetworkStoreConfig, registry: Arc<dyn ConnectionRegistry>) -> Self {
        let mut network = Graph::default();
        if !config.initial_sid.is_none() {
            network.add_node(config.initial_sid);
        }
        let inner = Inner {
            sid: config.initial_sid,
            network,
            preferred_server: config.preferred_server,
        };
        Self {
            config,
            registry,
            inner: Mutex::new(inner),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback for [`NetworkEvent`]s. Callbacks run synchronously
    /// and must not register further listeners.
    pub fn add_listener(&self, listener: impl FnMut(&NetworkEvent) + Send + 'static) {
        self.listeners().push(Box::new(listener));
    }

    pub fn sid(&self) -> Sid {
        self.inner().sid
    }

    /// Replace this instance's session id. The old self node and its links
    /// are dropped.
    pub fn set_sid(&self, sid: Sid) {
        let event = {
            let mut inner = self.inner();
            let old = inner.sid;
            if old == sid {
                return;
            }
            if !old.is_none() {
                inner.network.remove_node(old);
                inner.network.prune(sid);
            }
            if !sid.is_none() {
                inner.network.add_node(sid);
            }
            inner.sid = sid;
            debug!("session id changed from {} to {}", old, sid);
            NetworkEvent::SidChanged { old, new: sid }
        };
        self.publish(&[event]);
    }

    /// Generate a session id from the configured instance type and flavor and
    /// take it
    pub fn assign_generated_sid(&self) -> Sid {
        let sid = Sid::generate(self.config.instance_type, self.config.instance_flavor);
        self.set_sid(sid);
        sid
    }

    /// Record a new connection between this instance and its remote end
    pub fn on_connection_established(&self, connection: &dyn Connection) -> Result<(), NetworkError> {
        let remote = connection.remote_sid();
        let mut events = Vec::new();
        {
            let mut inner = self.inner();
            let local = inner.sid;
            if local.is_none() {
                return Err(NetworkError::NoSid);
            }
            if remote == local {
                return Err(NetworkError::SelfLoop {
                    sid: local,
                    connection: connection.id().to_string(),
                });
            }
            if !inner.network.contains(remote) {
                debug!("{} joined the network view", remote);
            }
            inner.network.add_link(Link {
                a: local,
                b: remote,
                connection: connection.id(),
            });
            debug!("linked {} and {} over {}", local, remote, connection.id());
            if !local.is_server() && remote.is_server() {
                events.push(NetworkEvent::ServerEstablished { server: remote });
            }
        }
        self.publish(&events);
        Ok(())
    }

    /// Forget a connection. Falls back to any link with `remote` when no
    /// link carries the connection id.
    pub fn on_connection_lost(&self, connection: ConnectionId, remote: Sid) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner();
            let local = inner.sid;
            let removed = match inner.network.remove_link_by_connection(connection) {
                Some(link) => Some(link),
                None => inner.network.remove_link_between(local, remote),
            };
            let Some(link) = removed else {
                trace!("no link for lost connection {} to {}", connection, remote);
                return;
            };
            let lost = link.other(local);
            debug!("unlinked {} and {} ({})", local, lost, link.connection);
            for sid in inner.network.prune(local) {
                debug!("{} left the network view", sid);
            }
            if !local.is_server()
                && lost.is_server()
                && !inner
                    .network
                    .neighbours(local)
                    .iter()
                    .any(|sid| sid.is_server())
            {
                events.push(NetworkEvent::ServerLost { server: lost });
            }
        }
        self.publish(&events);
    }

    pub fn preferred_server(&self) -> Option<Sid> {
        self.inner().preferred_server()
    }

    /// Prefer `server` while it is visible
    pub fn set_preferred_server(&self, server: Option<Sid>) {
        self.inner().preferred_server = server;
    }

    /// Send directly when the destination is adjacent, otherwise through the
    /// preferred server. Returns the hop the message was handed to.
    pub fn route(&self, message: Message) -> Result<Sid, NetworkError> {
        let (hop, connection) = self.next_hop(message.to)?;
        trace!("routing message {} to {} via {}", message.id, message.to, hop);
        connection.send(message)?;
        Ok(hop)
    }

    /// Send through the preferred server and return it
    pub fn deliver(&self, message: Message) -> Result<Sid, NetworkError> {
        let server = {
            let mut inner = self.inner();
            if message.to == inner.sid {
                return Err(NetworkError::RouteToSelf { sid: message.to });
            }
            inner
                .preferred_server()
                .ok_or(NetworkError::NoRoute { to: message.to })?
        };
        let connection = self.connection_to(server)?;
        trace!("delivering message {} to {} via {}", message.id, message.to, server);
        connection.send(message)?;
        Ok(server)
    }

    /// Route a request and wait for its response
    pub async fn route_with_response(
        &self,
        message: Message,
        timeout: Duration,
    ) -> Result<Message, NetworkError> {
        let (_, connection) = self.next_hop(message.to)?;
        let id = message.id;
        // registered first so a fast response is not missed
        let response = connection.read(id)?;
        connection.send(message)?;
        await_response(response, id, Some(timeout)).await
    }

    /// Wait for the message with id `id` to arrive from the adjacent `from`
    pub async fn receive(
        &self,
        from: Sid,
        id: u32,
        timeout: Option<Duration>,
    ) -> Result<Message, NetworkError> {
        let connection = self.connection_to(from)?;
        let response = connection.read(id)?;
        await_response(response, id, timeout).await
    }

    /// Instances adjacent to `sid`
    pub fn direct(&self, sid: Sid) -> BTreeSet<Sid> {
        self.inner().network.neighbours(sid)
    }

    /// Every link touching `sid`
    pub fn direct_links(&self, sid: Sid) -> Vec<Link> {
        self.inner().network.links_of(sid).copied().collect()
    }

    pub fn direct_links_between(&self, a: Sid, b: Sid) -> Vec<Link> {
        self.inner().network.links_between(a, b).copied().collect()
    }

    pub fn nodes(&self) -> Vec<Sid> {
        self.inner().network.nodes().collect()
    }

    fn next_hop(&self, to: Sid) -> Result<(Sid, Arc<dyn Connection>), NetworkError> {
        let hop = {
            let mut inner = self.inner();
            if to == inner.sid {
                return Err(NetworkError::RouteToSelf { sid: to });
            }
            if inner.network.neighbours(inner.sid).contains(&to) {
                to
            } else {
                inner.preferred_server().ok_or(NetworkError::NoRoute { to })?
            }
        };
        Ok((hop, self.connection_to(hop)?))
    }

    fn connection_to(&self, sid: Sid) -> Result<Arc<dyn Connection>, NetworkError> {
        self.registry
            .get_by_sid(sid)
            .ok_or(NetworkError::NoConnection { sid })
    }

    fn publish(&self, events: &[NetworkEvent]) {
        if events.is_empty() {
            return;
        }
        let mut listeners = self.listeners();
        for event in events {
            debug!("network event {:?}", event);
            for listener in listeners.iter_mut() {
                listener(event);
            }
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<EventListener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn await_response(
    response: oneshot::Receiver<Message>,
    id: u32,
    timeout: Option<Duration>,
) -> Result<Message, NetworkError> {
    let received = match timeout {
        Some(after) => tokio::time::timeout(after, response)
            .await
            .map_err(|_| NetworkError::ResponseTimeout { id, after })?,
        None => response.await,
    };
    received.map_err(|_| NetworkError::ResponseDropped { id })
}
