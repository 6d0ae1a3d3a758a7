use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    codec::{self, Codec, CodecError},
    sid::Sid,
};

use super::error::ConnectionError;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Stable 32-bit FNV-1a hash of a payload's logical name
pub const fn payload_type_of(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut hash = FNV_OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// A typed message body. The name identifies the payload on the wire so
/// receivers can dispatch without a shared registry.
pub trait Payload: Codec {
    const NAME: &'static str;

    fn payload_type() -> u32 {
        payload_type_of(Self::NAME)
    }
}

/// The routed unit exchanged between instances
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Pairs a response with its request
    pub id: u32,
    pub from: Sid,
    pub to: Sid,
    pub payload_type: u32,
    pub payload: Bytes,
}

impl Message {
    /// A new request with a random id
    pub fn request<P: Payload>(from: Sid, to: Sid, payload: &P) -> Self {
        Self {
            id: fastrand::u32(1..),
            from,
            to,
            payload_type: P::payload_type(),
            payload: payload.to_bytes(),
        }
    }

    /// A response to `request`, travelling back to its sender
    pub fn response<P: Payload>(request: &Message, payload: &P) -> Self {
        Self {
            id: request.id,
            from: request.to,
            to: request.from,
            payload_type: P::payload_type(),
            payload: payload.to_bytes(),
        }
    }

    pub fn is<P: Payload>(&self) -> bool {
        self.payload_type == P::payload_type()
    }

    /// Decode the payload as `P`
    pub fn payload<P: Payload>(&self) -> Result<P, ConnectionError> {
        if !self.is::<P>() {
            return Err(ConnectionError::UnexpectedPayload {
                expected: P::payload_type(),
                found: self.payload_type,
            });
        }
        Ok(P::from_bytes(self.payload.clone())?)
    }
}

impl Codec for Message {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.id);
        buf.put_u32(self.from.raw());
        buf.put_u32(self.to.raw());
        buf.put_u32(self.payload_type);
        codec::put_bytes(buf, &self.payload);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            id: codec::get_u32(buf, "message id")?,
            from: Sid::from_raw(codec::get_u32(buf, "from")?),
            to: Sid::from_raw(codec::get_u32(buf, "to")?),
            payload_type: codec::get_u32(buf, "payload type")?,
            payload: codec::get_bytes(buf, "payload")?,
        })
    }
}
