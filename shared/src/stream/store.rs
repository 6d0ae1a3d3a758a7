use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use log::{debug, trace};

use crate::{
    codec::Codec,
    connection::{ConnectionId, Message},
};

use super::{
    adapter::{InboundStreamAdapter, OutboundStreamAdapter},
    error::StreamError,
    frame::{ClosedEnd, StreamClose, StreamData},
    sink::StreamSink,
    source::StreamSource,
};

/// The four kinds of stream endpoint the store wires together
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointRole {
    /// Local publisher
    Source,
    /// Local subscriber
    Sink,
    /// Publisher fed by a remote instance
    Inbound,
    /// Subscriber forwarding to a remote instance
    Outbound,
}

trait Endpoint: Send + Sync {
    fn stream_id(&self) -> u32;
    fn role(&self) -> EndpointRole;
    fn connection(&self) -> Option<ConnectionId>;
    fn identity(&self) -> usize;
    fn close(&self);
    fn is_closed(&self) -> bool;

    /// Close without telling the remote end, which is already gone
    fn close_quietly(&self) {
        self.close();
    }

    fn deliver(&self, _data: Bytes) -> Result<(), StreamError> {
        Ok(())
    }
}

impl<T: 'static> Endpoint for StreamSource<T> {
    fn stream_id(&self) -> u32 {
        StreamSource::stream_id(self)
    }

    fn role(&self) -> EndpointRole {
        EndpointRole::Source
    }

    fn connection(&self) -> Option<ConnectionId> {
        None
    }

    fn identity(&self) -> usize {
        StreamSource::identity(self)
    }

    fn close(&self) {
        StreamSource::close(self)
    }

    fn is_closed(&self) -> bool {
        StreamSource::is_closed(self)
    }
}

impl<T: 'static> Endpoint for StreamSink<T> {
    fn stream_id(&self) -> u32 {
        StreamSink::stream_id(self)
    }

    fn role(&self) -> EndpointRole {
        EndpointRole::Sink
    }

    fn connection(&self) -> Option<ConnectionId> {
        None
    }

    fn identity(&self) -> usize {
        StreamSink::identity(self)
    }

    fn close(&self) {
        StreamSink::close(self)
    }

    fn is_closed(&self) -> bool {
        StreamSink::is_closed(self)
    }
}

impl<T: Codec + Send + 'static> Endpoint for InboundStreamAdapter<T> {
    fn stream_id(&self) -> u32 {
        InboundStreamAdapter::stream_id(self)
    }

    fn role(&self) -> EndpointRole {
        EndpointRole::Inbound
    }

    fn connection(&self) -> Option<ConnectionId> {
        Some(InboundStreamAdapter::connection(self))
    }

    fn identity(&self) -> usize {
        InboundStreamAdapter::identity(self)
    }

    fn close(&self) {
        InboundStreamAdapter::close(self)
    }

    fn is_closed(&self) -> bool {
        InboundStreamAdapter::is_closed(self)
    }

    fn close_quietly(&self) {
        InboundStreamAdapter::close_quietly(self)
    }

    fn deliver(&self, data: Bytes) -> Result<(), StreamError> {
        InboundStreamAdapter::deliver(self, data)
    }
}

impl<T: Codec + 'static> Endpoint for OutboundStreamAdapter<T> {
    fn stream_id(&self) -> u32 {
        OutboundStreamAdapter::stream_id(self)
    }

    fn role(&self) -> EndpointRole {
        EndpointRole::Outbound
    }

    fn connection(&self) -> Option<ConnectionId> {
        Some(OutboundStreamAdapter::connection(self))
    }

    fn identity(&self) -> usize {
        OutboundStreamAdapter::identity(self)
    }

    fn close(&self) {
        OutboundStreamAdapter::close(self)
    }

    fn is_closed(&self) -> bool {
        OutboundStreamAdapter::is_closed(self)
    }

    fn close_quietly(&self) {
        OutboundStreamAdapter::close_quietly(self)
    }
}

struct Pairing {
    publisher: Arc<dyn Endpoint>,
    subscriber: Arc<dyn Endpoint>,
}

/// Registry of every live stream of an instance.
///
/// Each entry pairs a publisher (a local [`StreamSource`] or an
/// [`InboundStreamAdapter`]) with a subscriber (a local [`StreamSink`] or an
/// [`OutboundStreamAdapter`]).
#[derive(Default)]
pub struct StreamStore {
    pairings: Mutex<Vec<Pairing>>,
}

impl StreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relay items arriving on one connection out over another
    pub fn add_relay<T: Codec + Send + 'static>(
        &self,
        inbound: &InboundStreamAdapter<T>,
        outbound: &OutboundStreamAdapter<T>,
    ) -> Result<(), StreamError> {
        self.connect(Arc::new(inbound.clone()), Arc::new(outbound.clone()), || {
            inbound.subscribe(Box::new(outbound.clone()))
        })
    }

    /// Consume items arriving on a connection locally
    pub fn add_inbound<T: Codec + Send + 'static>(
        &self,
        inbound: &InboundStreamAdapter<T>,
        sink: &StreamSink<T>,
    ) -> Result<(), StreamError> {
        self.connect(Arc::new(inbound.clone()), Arc::new(sink.clone()), || {
            inbound.subscribe(Box::new(sink.clone()))
        })
    }

    /// Publish local items over a connection
    pub fn add_outbound<T: Codec + 'static>(
        &self,
        source: &StreamSource<T>,
        outbound: &OutboundStreamAdapter<T>,
    ) -> Result<(), StreamError> {
        self.connect(Arc::new(source.clone()), Arc::new(outbound.clone()), || {
            source.subscribe(Box::new(outbound.clone()))
        })
    }

    /// Feed a local sink from a local source
    pub fn add_local<T: 'static>(
        &self,
        source: &StreamSource<T>,
        sink: &StreamSink<T>,
    ) -> Result<(), StreamError> {
        self.connect(Arc::new(source.clone()), Arc::new(sink.clone()), || {
            source.subscribe(Box::new(sink.clone()))
        })
    }

    fn connect(
        &self,
        publisher: Arc<dyn Endpoint>,
        subscriber: Arc<dyn Endpoint>,
        subscribe: impl FnOnce() -> Result<(), StreamError>,
    ) -> Result<(), StreamError> {
        let mut pairings = self.pairings();
        prune(&mut pairings);
        if pairings.iter().any(|pairing| {
            pairing.publisher.identity() == publisher.identity()
                && pairing.subscriber.identity() == subscriber.identity()
        }) {
            return Err(StreamError::AlreadyConnected {
                stream_id: publisher.stream_id(),
            });
        }
        debug!(
            "connecting {:?} stream {} to {:?} stream {}",
            publisher.role(),
            publisher.stream_id(),
            subscriber.role(),
            subscriber.stream_id()
        );
        subscribe()?;
        pairings.push(Pairing {
            publisher,
            subscriber,
        });
        Ok(())
    }

    /// Hand raw stream data to the inbound adapter with the given id.
    /// Returns whether an adapter took it.
    pub fn stream_data(&self, stream_id: u32, data: Bytes) -> Result<bool, StreamError> {
        self.deliver(stream_id, None, data)
    }

    /// Route a message that belongs to the stream layer. Returns false for
    /// messages of any other type.
    pub fn handle(&self, connection: ConnectionId, message: &Message) -> Result<bool, StreamError> {
        if message.is::<StreamData>() {
            let frame: StreamData = message.payload()?;
            if !self.deliver(frame.stream_id, Some(connection), frame.data)? {
                trace!("no inbound stream {} on {}", frame.stream_id, connection);
            }
            return Ok(true);
        }
        if message.is::<StreamClose>() {
            let close: StreamClose = message.payload()?;
            // the remote's outbound end feeds our inbound end and vice versa
            let role = match close.closed {
                ClosedEnd::Outbound => EndpointRole::Inbound,
                ClosedEnd::Inbound => EndpointRole::Outbound,
            };
            debug!(
                "remote closed its {:?} end of stream {}",
                close.closed, close.stream_id
            );
            self.stop_matching(
                |endpoint| {
                    endpoint.role() == role
                        && endpoint.stream_id() == close.stream_id
                        && endpoint.connection() == Some(connection)
                },
                true,
            );
            return Ok(true);
        }
        Ok(false)
    }

    fn deliver(
        &self,
        stream_id: u32,
        connection: Option<ConnectionId>,
        data: Bytes,
    ) -> Result<bool, StreamError> {
        let inbound = {
            let mut pairings = self.pairings();
            prune(&mut pairings);
            pairings
                .iter()
                .map(|pairing| &pairing.publisher)
                .find(|publisher| {
                    publisher.role() == EndpointRole::Inbound
                        && publisher.stream_id() == stream_id
                        && connection.map_or(true, |c| publisher.connection() == Some(c))
                })
                .cloned()
        };
        let Some(inbound) = inbound else {
            return Ok(false);
        };
        inbound.deliver(data)?;
        self.close_if_abandoned(&inbound);
        Ok(true)
    }

    /// A subscriber may end itself while handling an item. Once none is left,
    /// the inbound end closes and the remote stops sending.
    fn close_if_abandoned(&self, inbound: &Arc<dyn Endpoint>) {
        let abandoned = {
            let mut pairings = self.pairings();
            let abandoned = !pairings.iter().any(|pairing| {
                pairing.publisher.identity() == inbound.identity()
                    && !pairing.subscriber.is_closed()
            });
            if abandoned {
                prune(&mut pairings);
            }
            abandoned
        };
        if abandoned {
            debug!(
                "every subscriber of inbound stream {} ended, closing it",
                inbound.stream_id()
            );
            inbound.close();
        }
    }

    /// Stop every pairing that involves stream `stream_id`.
    ///
    /// When the id names a subscriber, its publisher is closed only if no
    /// other subscriber remains attached to it.
    pub fn stop(&self, stream_id: u32) {
        self.stop_matching(|endpoint| endpoint.stream_id() == stream_id, false);
    }

    /// Stop every stream carried by a connection that went away
    pub fn on_connection_lost(&self, connection: ConnectionId) {
        let ids: HashSet<u32> = self
            .pairings()
            .iter()
            .flat_map(|pairing| [&pairing.publisher, &pairing.subscriber])
            .filter(|endpoint| endpoint.connection() == Some(connection))
            .map(|endpoint| endpoint.stream_id())
            .collect();
        if !ids.is_empty() {
            debug!("connection {} lost, stopping streams {:?}", connection, ids);
        }
        for stream_id in ids {
            self.stop(stream_id);
        }
    }

    fn stop_matching(&self, matches: impl Fn(&dyn Endpoint) -> bool, quiet: bool) {
        let mut closing: Vec<(Arc<dyn Endpoint>, bool)> = Vec::new();
        {
            let mut pairings = self.pairings();
            let mut fan_out: HashMap<usize, usize> = HashMap::new();
            for pairing in pairings.iter() {
                *fan_out.entry(pairing.publisher.identity()).or_default() += 1;
            }
            pairings.retain(|pairing| {
                if matches(pairing.publisher.as_ref()) {
                    trace!(
                        "stopping {:?} stream {} and its subscriber",
                        pairing.publisher.role(),
                        pairing.publisher.stream_id()
                    );
                    closing.push((pairing.publisher.clone(), quiet));
                    closing.push((pairing.subscriber.clone(), false));
                    false
                } else if matches(pairing.subscriber.as_ref()) {
                    let remaining = fan_out
                        .get_mut(&pairing.publisher.identity())
                        .map(|count| {
                            *count -= 1;
                            *count
                        })
                        .unwrap_or(0);
                    // the subscriber goes first so it does not see the
                    // publisher complete
                    closing.push((pairing.subscriber.clone(), quiet));
                    if remaining == 0 {
                        closing.push((pairing.publisher.clone(), false));
                    }
                    false
                } else {
                    true
                }
            });
        }
        for (endpoint, quiet) in closing {
            if quiet {
                endpoint.close_quietly();
            } else {
                endpoint.close();
            }
        }
    }

    pub fn source_count(&self) -> usize {
        self.count(EndpointRole::Source)
    }

    pub fn sink_count(&self) -> usize {
        self.count(EndpointRole::Sink)
    }

    pub fn inbound_count(&self) -> usize {
        self.count(EndpointRole::Inbound)
    }

    pub fn outbound_count(&self) -> usize {
        self.count(EndpointRole::Outbound)
    }

    fn count(&self, role: EndpointRole) -> usize {
        let mut pairings = self.pairings();
        prune(&mut pairings);
        pairings
            .iter()
            .flat_map(|pairing| [&pairing.publisher, &pairing.subscriber])
            .filter(|endpoint| endpoint.role() == role)
            .map(|endpoint| endpoint.identity())
            .collect::<HashSet<_>>()
            .len()
    }

    fn pairings(&self) -> MutexGuard<'_, Vec<Pairing>> {
        self.pairings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Forget pairings where either end has closed on its own
fn prune(pairings: &mut Vec<Pairing>) {
    pairings.retain(|pairing| {
        let open = !pairing.publisher.is_closed() && !pairing.subscriber.is_closed();
        if !open {
            trace!("pruning closed stream {}", pairing.publisher.stream_id());
        }
        open
    });
}
