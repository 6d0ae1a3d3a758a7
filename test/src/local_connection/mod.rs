/// In-memory connection implementation for E2E testing
/// Queues messages between two instances without network I/O; nothing moves
/// until the test drains the queues

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use tokio::sync::oneshot;

use meshnet_shared::{
    Connection, ConnectionError, ConnectionId, ConnectionRegistry, Message, PendingResponses, Sid,
};

type Queue = Arc<Mutex<VecDeque<Message>>>;

/// One end of a [`LocalLink`]
pub struct LocalConnection {
    id: ConnectionId,
    local: Sid,
    remote: Sid,
    outbox: Queue,
    pending: PendingResponses,
    open: Arc<AtomicBool>,
}

impl LocalConnection {
    /// Hand a received message to a waiting reader. Returns the message
    /// back when nobody waits for it.
    pub fn complete(&self, message: Message) -> Option<Message> {
        self.pending.complete(message)
    }
}

impl Connection for LocalConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn local_sid(&self) -> Sid {
        self.local
    }

    fn remote_sid(&self) -> Sid {
        self.remote
    }

    fn send(&self, message: Message) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::Closed {
                connection: self.id,
            });
        }
        self.outbox.lock().unwrap().push_back(message);
        Ok(())
    }

    fn read(&self, response_id: u32) -> Result<oneshot::Receiver<Message>, ConnectionError> {
        self.pending.register(response_id)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Pair of connected endpoints for E2E testing
pub struct LocalLink {
    pub a: Arc<LocalConnection>,
    pub b: Arc<LocalConnection>,
}

impl LocalLink {
    pub fn new(a: Sid, b: Sid) -> Self {
        let id = ConnectionId::random();
        let open = Arc::new(AtomicBool::new(true));
        let a_to_b: Queue = Arc::new(Mutex::new(VecDeque::new()));
        let b_to_a: Queue = Arc::new(Mutex::new(VecDeque::new()));
        Self {
            a: Arc::new(LocalConnection {
                id,
                local: a,
                remote: b,
                outbox: a_to_b,
                pending: PendingResponses::new(),
                open: open.clone(),
            }),
            b: Arc::new(LocalConnection {
                id,
                local: b,
                remote: a,
                outbox: b_to_a,
                pending: PendingResponses::new(),
                open,
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.a.id
    }

    /// Messages queued by `a`, in send order
    pub fn take_for_b(&self) -> Vec<Message> {
        self.a.outbox.lock().unwrap().drain(..).collect()
    }

    /// Messages queued by `b`, in send order
    pub fn take_for_a(&self) -> Vec<Message> {
        self.b.outbox.lock().unwrap().drain(..).collect()
    }

    pub fn is_idle(&self) -> bool {
        self.a.outbox.lock().unwrap().is_empty() && self.b.outbox.lock().unwrap().is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.a.is_open()
    }

    /// Close both ends, dropping anything still queued
    pub fn close(&self) {
        self.a.open.store(false, Ordering::Release);
        self.a.outbox.lock().unwrap().clear();
        self.b.outbox.lock().unwrap().clear();
        self.a.pending.clear();
        self.b.pending.clear();
    }
}

/// Connection registry keyed by remote session id
#[derive(Default)]
pub struct LocalRegistry {
    connections: Mutex<HashMap<Sid, Arc<LocalConnection>>>,
}

impl LocalRegistry {
    pub fn insert(&self, connection: Arc<LocalConnection>) {
        self.connections
            .lock()
            .unwrap()
            .insert(connection.remote, connection);
    }

    pub fn remove(&self, remote: Sid) -> Option<Arc<LocalConnection>> {
        self.connections.lock().unwrap().remove(&remote)
    }

    pub fn get(&self, remote: Sid) -> Option<Arc<LocalConnection>> {
        self.connections.lock().unwrap().get(&remote).cloned()
    }
}

impl ConnectionRegistry for LocalRegistry {
    fn get_by_sid(&self, sid: Sid) -> Option<Arc<dyn Connection>> {
        self.connections
            .lock()
            .unwrap()
            .get(&sid)
            .map(|connection| connection.clone() as Arc<dyn Connection>)
    }
}
