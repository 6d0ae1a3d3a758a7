use meshnet_shared::Sid;

/// Changes of the local view of the network
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    /// This instance was given a new session id
    SidChanged { old: Sid, new: Sid },
    /// A non-server instance connected to a server
    ServerEstablished { server: Sid },
    /// A non-server instance lost its last direct link to any server
    ServerLost { server: Sid },
}
