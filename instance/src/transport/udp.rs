use std::{io, net::SocketAddr};

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::hole_punch::DatagramChannel;

/// A UDP socket bound to a single peer
#[derive(Debug)]
pub struct UdpChannel {
    socket: UdpSocket,
}

impl UdpChannel {
    /// Bind `local` and restrict traffic to `peer`
    pub async fn connect(local: SocketAddr, peer: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }

    pub fn into_inner(self) -> UdpSocket {
        self.socket
    }
}

impl From<UdpSocket> for UdpChannel {
    fn from(socket: UdpSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl DatagramChannel for UdpChannel {
    async fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        self.socket.send(datagram).await.map(|_| ())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf).await
    }
}
