//! # Meshnet Instance
//! One instance of the mesh: its view of the network, the connection loop
//! that finds peers, and the UDP hole punch that reaches them through NAT.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

pub use meshnet_shared as shared;

mod connection_loop;
mod hole_punch;
mod network;
pub mod transport;

pub use connection_loop::{
    AttemptError, ConnectionLoop, ConnectionLoopConfig, ConnectionLoopError,
    ConnectionLoopHandle, Connector, Target, DEFAULT_PORT,
};
pub use hole_punch::{
    punch, DatagramChannel, HolePunchConfig, HolePunchError, PunchPacket, RQ_MAGIC, RS_MAGIC,
};
pub use network::{Link, NetworkError, NetworkEvent, NetworkStore, NetworkStoreConfig};
