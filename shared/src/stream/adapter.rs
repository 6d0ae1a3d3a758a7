use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use bytes::Bytes;
use log::{debug, trace, warn};

use crate::{
    codec::Codec,
    connection::{Connection, ConnectionId, Message},
};

use super::{
    error::StreamError,
    frame::{ClosedEnd, StreamClose, StreamData},
    source::{StreamSource, Subscriber},
};

fn notify_closed(connection: &Arc<dyn Connection>, stream_id: u32, closed: ClosedEnd) {
    if !connection.is_open() {
        return;
    }
    let message = Message::request(
        connection.local_sid(),
        connection.remote_sid(),
        &StreamClose { stream_id, closed },
    );
    if let Err(err) = connection.send(message) {
        debug!("could not announce close of stream {}: {}", stream_id, err);
    }
}

/// Publishes the items a remote outbound adapter sends over a connection
pub struct InboundStreamAdapter<T> {
    source: StreamSource<T>,
    connection: Arc<dyn Connection>,
}

impl<T> Clone for InboundStreamAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            connection: self.connection.clone(),
        }
    }
}

impl<T: Codec + Send + 'static> InboundStreamAdapter<T> {
    pub fn new(stream_id: u32, connection: Arc<dyn Connection>) -> Self {
        Self {
            source: StreamSource::new(stream_id),
            connection,
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.source.stream_id()
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) -> Result<(), StreamError> {
        self.source.subscribe(subscriber)
    }

    /// Decode one frame and publish it. A frame that fails to decode is
    /// dropped and the stream carries on.
    pub fn deliver(&self, data: Bytes) -> Result<(), StreamError> {
        match T::from_bytes(data) {
            Ok(item) => self.source.submit(item),
            Err(err) => {
                warn!(
                    "dropping malformed frame on stream {}: {}",
                    self.stream_id(),
                    err
                );
                Ok(())
            }
        }
    }

    /// Close and ask the remote end to stop sending
    pub fn close(&self) {
        if self.source.is_closed() {
            return;
        }
        self.source.close();
        notify_closed(&self.connection, self.stream_id(), ClosedEnd::Inbound);
    }

    /// Close because the remote end already stopped
    pub(crate) fn close_quietly(&self) {
        self.source.close();
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_closed()
    }

    pub(crate) fn identity(&self) -> usize {
        self.source.identity()
    }
}

/// Forwards the items of a local publisher to a remote inbound adapter
pub struct OutboundStreamAdapter<T> {
    inner: Arc<OutboundShared>,
    _item: std::marker::PhantomData<fn(&T)>,
}

struct OutboundShared {
    stream_id: u32,
    connection: Arc<dyn Connection>,
    closed: AtomicBool,
}

impl<T> Clone for OutboundStreamAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _item: std::marker::PhantomData,
        }
    }
}

impl<T: Codec + 'static> OutboundStreamAdapter<T> {
    pub fn new(stream_id: u32, connection: Arc<dyn Connection>) -> Self {
        Self {
            inner: Arc::new(OutboundShared {
                stream_id,
                connection,
                closed: AtomicBool::new(false),
            }),
            _item: std::marker::PhantomData,
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.inner.stream_id
    }

    pub fn connection(&self) -> ConnectionId {
        self.inner.connection.id()
    }

    /// Stop forwarding and tell the remote end no more items will come
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        notify_closed(&self.inner.connection, self.inner.stream_id, ClosedEnd::Outbound);
    }

    pub(crate) fn close_quietly(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl<T: Codec + 'static> Subscriber<T> for OutboundStreamAdapter<T> {
    fn on_next(&mut self, item: &T) {
        if self.is_closed() {
            return;
        }
        let connection = &self.inner.connection;
        let frame = StreamData {
            stream_id: self.inner.stream_id,
            data: item.to_bytes(),
        };
        trace!(
            "stream {} -> {}: {} bytes",
            frame.stream_id,
            connection.remote_sid(),
            frame.data.len()
        );
        let message = Message::request(connection.local_sid(), connection.remote_sid(), &frame);
        if let Err(err) = connection.send(message) {
            warn!("stream {} failed to send: {}", self.inner.stream_id, err);
        }
    }

    fn on_complete(&mut self) {
        self.close();
    }
}
