use std::{
    ops::ControlFlow,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use log::{debug, trace, warn};
use tokio::sync::watch;

use crate::{
    connection::{Connection, Message},
    oid::{Oid, PathComponent},
    state::{
        lock_tree, Delta, ListenerKey, NodeId, NodeType, SharedStateTree, SnapshotConfig,
        StateError, StateEvent, StateTree,
    },
    stream::{InboundStreamAdapter, OutboundStreamAdapter, StreamSink, StreamSource, StreamStore},
};

use super::{
    direction::SyncDirection,
    error::EntangleError,
    request::{validate_root, SyncConfig, SyncRequest},
};

/// Fulfils the `inactive` signal once every started role has closed
struct RoleTracker {
    remaining: AtomicUsize,
    inactive: watch::Sender<bool>,
}

impl RoleTracker {
    fn role_closed(&self, stream_id: u32) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!("sync on stream {} is inactive", stream_id);
            self.inactive.send_replace(true);
        }
    }
}

struct SourceRole {
    source: StreamSource<Delta>,
    listener: Option<ListenerKey>,
}

struct SinkRole {
    sink: StreamSink<Delta>,
    inbound: InboundStreamAdapter<Delta>,
}

/// One side of a sync between a local state node and a remote instance.
///
/// The source half publishes a snapshot of the node followed by every change
/// below it. The sink half merges whatever the remote publishes. Dropping the
/// object closes both halves.
pub struct EntangledObject {
    tree: SharedStateTree,
    node: NodeId,
    oid: Oid,
    root_type: NodeType,
    stream_id: u32,
    direction: SyncDirection,
    initiator: bool,
    source: Option<SourceRole>,
    sink: Option<SinkRole>,
    tracker: Arc<RoleTracker>,
    inactive: watch::Receiver<bool>,
}

impl EntangledObject {
    /// Start a sync of the node at `oid` and ask the remote end of
    /// `connection` to join it. A missing node is created as a document, or
    /// as a collection when `oid` ends in an empty id slot.
    pub fn initiate(
        tree: &SharedStateTree,
        oid: &Oid,
        connection: Arc<dyn Connection>,
        streams: &StreamStore,
        config: SyncConfig,
    ) -> Result<Self, EntangleError> {
        let mut request = SyncRequest::new(oid.clone(), &config)?;
        {
            let mut tree = lock_tree(tree);
            if let Some(node) = tree.find(oid)? {
                request.root_type = tree.node_type(node)?;
            }
        }
        request.validate()?;
        let mut object = Self::build(tree, &request, true)?;
        let roles = request.direction.roles(true);

        // our inbound end must exist before the remote starts publishing
        if roles.sink {
            object.start_sink(connection.clone(), streams)?;
        }
        debug!(
            "requesting {:?} sync of {} on stream {} from {}",
            request.direction,
            request.oid,
            request.stream_id,
            connection.remote_sid()
        );
        connection.send(Message::request(
            connection.local_sid(),
            connection.remote_sid(),
            &request,
        ))?;
        if roles.source {
            object.start_source(connection, streams, &request)?;
        }
        Ok(object)
    }

    /// Build the non-initiating half of a sync requested by the remote end
    /// of `connection`
    pub fn accept(
        tree: &SharedStateTree,
        connection: Arc<dyn Connection>,
        streams: &StreamStore,
        request: &SyncRequest,
    ) -> Result<Self, EntangleError> {
        request.validate()?;
        let mut object = Self::build(tree, request, false)?;
        let roles = request.direction.roles(false);
        debug!(
            "accepting {:?} sync of {} on stream {} from {}",
            request.direction,
            request.oid,
            request.stream_id,
            connection.remote_sid()
        );
        if roles.sink {
            object.start_sink(connection.clone(), streams)?;
        }
        if roles.source {
            object.start_source(connection, streams, request)?;
        }
        Ok(object)
    }

    /// Pull a one-time copy of the remote node at `oid`. The returned
    /// object turns inactive once the copy has been merged.
    pub fn snapshot(
        tree: &SharedStateTree,
        oid: &Oid,
        connection: Arc<dyn Connection>,
        streams: &StreamStore,
        whitelist: Vec<Oid>,
    ) -> Result<Self, EntangleError> {
        let config = SyncConfig {
            direction: SyncDirection::Downstream,
            permanent: false,
            whitelist,
            ..SyncConfig::default()
        };
        Self::initiate(tree, oid, connection, streams, config)
    }

    fn build(
        tree: &SharedStateTree,
        request: &SyncRequest,
        initiator: bool,
    ) -> Result<Self, EntangleError> {
        validate_root(&request.oid)?;
        let node = resolve_root(&mut lock_tree(tree), &request.oid, request.root_type)?;
        let roles = request.direction.roles(initiator);
        let started = usize::from(roles.source) + usize::from(roles.sink);
        let (sender, inactive) = watch::channel(started == 0);
        Ok(Self {
            tree: tree.clone(),
            node,
            oid: request.oid.clone(),
            root_type: request.root_type,
            stream_id: request.stream_id,
            direction: request.direction,
            initiator,
            source: None,
            sink: None,
            tracker: Arc::new(RoleTracker {
                remaining: AtomicUsize::new(started),
                inactive: sender,
            }),
            inactive,
        })
    }

    fn start_source(
        &mut self,
        connection: Arc<dyn Connection>,
        streams: &StreamStore,
        request: &SyncRequest,
    ) -> Result<(), EntangleError> {
        let source = StreamSource::new(self.stream_id);
        let outbound = OutboundStreamAdapter::new(self.stream_id, connection);
        streams.add_outbound(&source, &outbound)?;
        let tracker = self.tracker.clone();
        let stream_id = self.stream_id;
        source.on_close(move || tracker.role_closed(stream_id));

        let mut tree = lock_tree(&self.tree);
        let publisher = source.clone();
        let root = self.oid.clone();
        let root_type = self.root_type;
        let whitelist = request.whitelist.clone();
        let listener = match tree.add_listener(self.node, move |event| {
            publish_event(&publisher, &root, root_type, &whitelist, event)
        }) {
            Ok(listener) => listener,
            Err(err) => {
                drop(tree);
                source.close();
                return Err(err.into());
            }
        };

        // the listener is in place first so no change slips between the
        // snapshot and the live deltas
        let config = SnapshotConfig::whitelist(request.whitelist.clone());
        let sent = tree.snapshot(self.node, &config).map_err(EntangleError::from).and_then(|snapshot| {
            let mut sent = 0;
            for delta in snapshot {
                source.submit(delta)?;
                sent += 1;
            }
            Ok(sent)
        });
        let sent = match sent {
            Ok(sent) => sent,
            Err(err) => {
                tree.remove_listener(listener);
                drop(tree);
                source.close();
                return Err(err);
            }
        };
        trace!("sent {} snapshot records of {} on stream {}", sent, self.oid, stream_id);

        let listener = if request.permanent {
            Some(listener)
        } else {
            tree.remove_listener(listener);
            None
        };
        drop(tree);
        if !request.permanent {
            source.close();
        }
        self.source = Some(SourceRole { source, listener });
        Ok(())
    }

    fn start_sink(
        &mut self,
        connection: Arc<dyn Connection>,
        streams: &StreamStore,
    ) -> Result<(), EntangleError> {
        let tree = self.tree.clone();
        let node = self.node;
        let stream_id = self.stream_id;
        // a record that does not fit our tree means the two sides disagree on
        // its shape, so the stream ends there
        let sink = StreamSink::until(stream_id, move |delta: &Delta| {
            match lock_tree(&tree).merge(node, delta) {
                Ok(true) => trace!("stream {} merged {}", stream_id, delta.path_string()),
                Ok(false) => {}
                Err(err @ (StateError::InvalidPath { .. } | StateError::WrongKind { .. })) => {
                    warn!(
                        "stream {} ended on {}: {}",
                        stream_id,
                        delta.path_string(),
                        err
                    );
                    return ControlFlow::Break(());
                }
                Err(err) => warn!(
                    "stream {} could not merge {}: {}",
                    stream_id,
                    delta.path_string(),
                    err
                ),
            }
            ControlFlow::Continue(())
        });
        let tracker = self.tracker.clone();
        sink.on_close(move || tracker.role_closed(stream_id));

        let inbound = InboundStreamAdapter::new(stream_id, connection);
        if let Err(err) = streams.add_inbound(&inbound, &sink) {
            sink.close();
            return Err(err.into());
        }
        self.sink = Some(SinkRole { sink, inbound });
        Ok(())
    }

    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn root_type(&self) -> NodeType {
        self.root_type
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn direction(&self) -> SyncDirection {
        self.direction
    }

    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Whether every started role has closed
    pub fn is_inactive(&self) -> bool {
        *self.inactive.borrow()
    }

    /// Resolves once every started role has closed
    pub async fn inactive(&self) {
        let mut inactive = self.inactive.clone();
        while !*inactive.borrow_and_update() {
            if inactive.changed().await.is_err() {
                return;
            }
        }
    }

    /// Stop publishing. Idempotent.
    pub fn close_source(&mut self) {
        if let Some(role) = self.source.as_mut() {
            if let Some(listener) = role.listener.take() {
                lock_tree(&self.tree).remove_listener(listener);
            }
            role.source.close();
        }
    }

    /// Stop consuming and tell the remote to stop publishing. Idempotent.
    pub fn close_sink(&mut self) {
        if let Some(role) = self.sink.as_ref() {
            role.inbound.close();
            role.sink.close();
        }
    }

    pub fn close(&mut self) {
        self.close_source();
        self.close_sink();
    }
}

impl Drop for EntangledObject {
    fn drop(&mut self) {
        self.close();
    }
}

/// Find the node at `oid`, or create one of `root_type`
fn resolve_root(
    tree: &mut StateTree,
    oid: &Oid,
    root_type: NodeType,
) -> Result<NodeId, EntangleError> {
    if let Some(node) = tree.find(oid)? {
        let found = tree.node_type(node)?;
        if found != root_type {
            return Err(StateError::WrongKind {
                oid: oid.to_string(),
                expected: root_type,
                found,
            }
            .into());
        }
        return Ok(node);
    }
    let node = match root_type {
        NodeType::Document => tree.document_at(oid)?,
        NodeType::Collection => tree.collection_at(oid)?,
        NodeType::Attribute => tree.attribute_at(oid)?,
    };
    Ok(node)
}

/// Path of `oid` as seen from the entangled root. Members of a collection
/// root keep their own component.
fn relative_path(root: &Oid, root_type: NodeType, oid: &Oid) -> Option<Vec<PathComponent>> {
    if oid == root {
        return Some(Vec::new());
    }
    if root_type != NodeType::Collection {
        return oid.relative_path_from(root);
    }
    if !oid.is_descendant_of(root) {
        return None;
    }
    Some(oid.path()[root.path().len() - 1..].to_vec())
}

fn publish_event(
    source: &StreamSource<Delta>,
    root: &Oid,
    root_type: NodeType,
    whitelist: &[Oid],
    event: &StateEvent,
) {
    if source.is_closed() {
        return;
    }
    let oid = event.oid();
    if !whitelist.is_empty()
        && !whitelist
            .iter()
            .any(|entry| oid.is_descendant_of(entry) || oid.is_ancestor_of(entry))
    {
        return;
    }
    let Some(path) = relative_path(root, root_type, oid) else {
        return;
    };
    let delta = match event {
        StateEvent::AttributeChanged {
            new: Some(value), ..
        } => Delta::value(path, value.clone()),
        StateEvent::DocumentAdded { .. } => Delta::added(path),
        StateEvent::AttributeChanged { new: None, .. } if path.is_empty() => {
            trace!("cleared root {} has no delta", root);
            return;
        }
        StateEvent::AttributeChanged { new: None, .. }
        | StateEvent::DocumentRemoved { .. }
        | StateEvent::AttributeRemoved { .. } => {
            if path.is_empty() {
                debug!("entangled root {} was removed", root);
                source.close();
                return;
            }
            Delta::removed(path)
        }
    };
    trace!("stream {} publishing {}", source.stream_id(), delta.path_string());
    if let Err(err) = source.submit(delta) {
        debug!("dropping change of {}: {}", oid, err);
    }
}
