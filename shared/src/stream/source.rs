use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use super::error::StreamError;

/// Receives the items of a stream
pub trait Subscriber<T>: Send {
    fn on_next(&mut self, item: &T);

    /// The publisher closed. Called at most once.
    fn on_complete(&mut self);
}

pub(crate) type CloseHook = Box<dyn FnOnce() + Send>;

/// A local publisher that fans items out to its subscribers.
///
/// Subscribers are invoked synchronously from [`StreamSource::submit`] while
/// the source is locked; a subscriber must not call back into the same source.
pub struct StreamSource<T> {
    inner: Arc<SourceShared<T>>,
}

struct SourceShared<T> {
    stream_id: u32,
    state: Mutex<SourceState<T>>,
}

struct SourceState<T> {
    subscribers: Vec<Box<dyn Subscriber<T>>>,
    closed: bool,
    on_close: Vec<CloseHook>,
}

impl<T> Clone for StreamSource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> StreamSource<T> {
    pub fn new(stream_id: u32) -> Self {
        Self {
            inner: Arc::new(SourceShared {
                stream_id,
                state: Mutex::new(SourceState {
                    subscribers: Vec::new(),
                    closed: false,
                    on_close: Vec::new(),
                }),
            }),
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.inner.stream_id
    }

    pub fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) -> Result<(), StreamError> {
        let mut state = self.state();
        if state.closed {
            return Err(StreamError::Closed {
                stream_id: self.inner.stream_id,
            });
        }
        state.subscribers.push(subscriber);
        Ok(())
    }

    /// Deliver an item to every subscriber, in subscription order
    pub fn submit(&self, item: T) -> Result<(), StreamError> {
        let mut state = self.state();
        if state.closed {
            return Err(StreamError::Closed {
                stream_id: self.inner.stream_id,
            });
        }
        for subscriber in state.subscribers.iter_mut() {
            subscriber.on_next(&item);
        }
        Ok(())
    }

    /// Close the source and complete its subscribers. Idempotent.
    pub fn close(&self) {
        let (subscribers, hooks) = {
            let mut state = self.state();
            if state.closed {
                return;
            }
            state.closed = true;
            (
                std::mem::take(&mut state.subscribers),
                std::mem::take(&mut state.on_close),
            )
        };
        debug!("closing stream source {}", self.inner.stream_id);
        for mut subscriber in subscribers {
            subscriber.on_complete();
        }
        for hook in hooks {
            hook();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    /// Run `hook` once the source closes (immediately if it already has)
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        let mut state = self.state();
        if state.closed {
            drop(state);
            hook();
        } else {
            state.on_close.push(Box::new(hook));
        }
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    fn state(&self) -> MutexGuard<'_, SourceState<T>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
