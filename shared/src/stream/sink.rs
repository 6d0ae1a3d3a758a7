use std::{
    ops::ControlFlow,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::debug;

use super::source::{CloseHook, Subscriber};

type Handler<T> = Box<dyn FnMut(&T) -> ControlFlow<()> + Send>;

/// A local subscriber that hands every item to a handler
pub struct StreamSink<T> {
    inner: Arc<SinkShared<T>>,
}

struct SinkShared<T> {
    stream_id: u32,
    state: Mutex<SinkState<T>>,
}

struct SinkState<T> {
    handler: Option<Handler<T>>,
    on_close: Vec<CloseHook>,
}

impl<T> Clone for StreamSink<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> StreamSink<T> {
    pub fn new(stream_id: u32, mut handler: impl FnMut(&T) + Send + 'static) -> Self {
        Self::until(stream_id, move |item| {
            handler(item);
            ControlFlow::Continue(())
        })
    }

    /// A sink whose handler can end the stream. Once it breaks, the sink
    /// closes and later items are ignored.
    pub fn until(
        stream_id: u32,
        handler: impl FnMut(&T) -> ControlFlow<()> + Send + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(SinkShared {
                stream_id,
                state: Mutex::new(SinkState {
                    handler: Some(Box::new(handler)),
                    on_close: Vec::new(),
                }),
            }),
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.inner.stream_id
    }

    /// Stop handling items. Idempotent.
    pub fn close(&self) {
        let hooks = {
            let mut state = self.state();
            if state.handler.take().is_none() {
                return;
            }
            std::mem::take(&mut state.on_close)
        };
        debug!("closing stream sink {}", self.inner.stream_id);
        for hook in hooks {
            hook();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state().handler.is_none()
    }

    /// Run `hook` once the sink closes (immediately if it already has)
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        let mut state = self.state();
        if state.handler.is_none() {
            drop(state);
            hook();
        } else {
            state.on_close.push(Box::new(hook));
        }
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    fn state(&self) -> MutexGuard<'_, SinkState<T>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: 'static> Subscriber<T> for StreamSink<T> {
    fn on_next(&mut self, item: &T) {
        let hooks = {
            let mut state = self.state();
            let Some(handler) = state.handler.as_mut() else {
                return;
            };
            if handler(item).is_continue() {
                return;
            }
            state.handler = None;
            std::mem::take(&mut state.on_close)
        };
        debug!("stream sink {} ended by its handler", self.inner.stream_id);
        for hook in hooks {
            hook();
        }
    }

    fn on_complete(&mut self) {
        self.close();
    }
}
