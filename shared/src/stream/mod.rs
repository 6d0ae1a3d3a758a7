//! Typed publish/subscribe streams, local or bridged over a connection.

mod adapter;
mod error;
mod frame;
mod sink;
mod source;
mod store;

pub use adapter::{InboundStreamAdapter, OutboundStreamAdapter};
pub use error::StreamError;
pub use frame::{ClosedEnd, StreamClose, StreamData};
pub use sink::StreamSink;
pub use source::{StreamSource, Subscriber};
pub use store::{EndpointRole, StreamStore};
