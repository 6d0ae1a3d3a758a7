use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use log::trace;
use tokio::sync::oneshot;

use super::{error::ConnectionError, message::Message};

/// Response readers waiting on a single connection, keyed by message id.
///
/// Connection implementations register a reader before the request goes out
/// and offer every inbound message here first.
#[derive(Default)]
pub struct PendingResponses {
    readers: Mutex<HashMap<u32, oneshot::Sender<Message>>>,
}

impl PendingResponses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the message answering `id`
    pub fn register(&self, id: u32) -> Result<oneshot::Receiver<Message>, ConnectionError> {
        let mut readers = self.readers.lock().unwrap_or_else(PoisonError::into_inner);
        // a reader whose receiver was dropped no longer counts
        if readers.get(&id).map_or(false, |sender| !sender.is_closed()) {
            return Err(ConnectionError::DuplicateResponseReader { id });
        }
        let (sender, receiver) = oneshot::channel();
        readers.insert(id, sender);
        Ok(receiver)
    }

    /// Hand `message` to its waiting reader. The message is returned when
    /// nobody was waiting for it.
    pub fn complete(&self, message: Message) -> Option<Message> {
        let reader = self
            .readers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&message.id);
        match reader {
            Some(reader) => {
                trace!("completing response {}", message.id);
                reader.send(message).err()
            }
            None => Some(message),
        }
    }

    /// Drop every reader. Their receivers observe a closed channel.
    pub fn clear(&self) {
        self.readers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.readers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
