//! UDP NAT traversal. Both peers punch at the same time: each sends a few
//! requests, answers the other's requests, and hands the channel on once a
//! response to its own latest request arrives and a short quiet period
//! passes without garbage.

mod config;
mod error;
mod packet;

use std::io;

use async_trait::async_trait;
use log::{debug, trace};
use tokio::time::{sleep_until, Instant};

pub use config::HolePunchConfig;
pub use error::HolePunchError;
pub use packet::{PunchPacket, RQ_MAGIC, RS_MAGIC};

/// A datagram pipe to exactly one peer
#[async_trait]
pub trait DatagramChannel: Send {
    async fn send(&mut self, datagram: &[u8]) -> io::Result<()>;

    /// Wait for the next datagram. Must be cancel safe.
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

enum Step {
    Timer,
    Received(io::Result<usize>),
}

/// ICMP unreachable surfaces as refused or reset on a connected socket; the
/// peer just has not bound yet, so the datagram counts as lost.
fn is_loss(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}

async fn send_packet<C: DatagramChannel>(
    channel: &mut C,
    packet: PunchPacket,
) -> Result<(), HolePunchError> {
    match channel.send(&packet.encode()).await {
        Ok(()) => Ok(()),
        Err(err) if is_loss(&err) => {
            trace!("hole punch datagram lost: {}", err);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Punch through to the peer on the other end of `channel`.
///
/// Resolves with the channel once the handshake succeeded, with `None` when
/// every request went unanswered, and with an error as soon as the peer sends
/// anything that is not part of the handshake.
pub async fn punch<C: DatagramChannel>(
    mut channel: C,
    config: &HolePunchConfig,
) -> Result<Option<C>, HolePunchError> {
    let mut buf = [0u8; 64];
    let mut sent = 0u32;
    let mut nonce = 0u32;
    let mut next_request = Instant::now();
    let mut quiet_until: Option<Instant> = None;

    loop {
        let deadline = quiet_until.unwrap_or(next_request);
        let step = tokio::select! {
            _ = sleep_until(deadline) => Step::Timer,
            received = channel.recv(&mut buf) => Step::Received(received),
        };

        match step {
            Step::Timer if quiet_until.is_some() => {
                debug!("hole punch succeeded after {} requests", sent);
                return Ok(Some(channel));
            }
            Step::Timer if sent < config.request_max => {
                nonce = fastrand::u32(..);
                sent += 1;
                trace!("hole punch request {} (nonce {:#010x})", sent, nonce);
                send_packet(&mut channel, PunchPacket::Request { nonce }).await?;
                next_request = Instant::now() + config.request_timeout;
            }
            Step::Timer => {
                debug!("hole punch got no response to {} requests", sent);
                return Ok(None);
            }
            Step::Received(Err(err)) if is_loss(&err) => {
                trace!("hole punch peer unreachable so far: {}", err);
            }
            Step::Received(Err(err)) => return Err(err.into()),
            Step::Received(Ok(len)) => {
                match PunchPacket::decode(&buf[..len]) {
                    Some(PunchPacket::Request { nonce: theirs }) => {
                        trace!("answering hole punch request {:#010x}", theirs);
                        send_packet(&mut channel, PunchPacket::Response { nonce: theirs })
                            .await?;
                    }
                    Some(PunchPacket::Response { nonce: echoed })
                        if sent > 0 && echoed == nonce =>
                    {
                        if quiet_until.is_none() {
                            trace!("hole punch answered, going quiet");
                            quiet_until = Some(Instant::now() + config.silent_time);
                        }
                    }
                    Some(PunchPacket::Response { nonce: echoed }) => {
                        trace!("ignoring stale hole punch response {:#010x}", echoed);
                    }
                    None => {
                        return Err(HolePunchError::Protocol {
                            reason: format!("{} byte datagram is not a request or response", len),
                        });
                    }
                }
            }
        }
    }
}
