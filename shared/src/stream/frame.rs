use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    codec::{self, Codec, CodecError},
    connection::Payload,
};

/// One item of a stream, already encoded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamData {
    pub stream_id: u32,
    pub data: Bytes,
}

impl Codec for StreamData {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.stream_id);
        codec::put_bytes(buf, &self.data);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            stream_id: codec::get_u32(buf, "stream id")?,
            data: codec::get_bytes(buf, "stream data")?,
        })
    }
}

impl Payload for StreamData {
    const NAME: &'static str = "meshnet.stream.data";
}

/// Which end of a stream the sender closed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClosedEnd {
    /// The sender stopped publishing; the receiver should close its inbound end
    Outbound,
    /// The sender stopped consuming; the receiver should close its outbound end
    Inbound,
}

/// Tells the remote instance that one end of a stream went away
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamClose {
    pub stream_id: u32,
    pub closed: ClosedEnd,
}

impl Codec for StreamClose {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.stream_id);
        buf.put_u8(match self.closed {
            ClosedEnd::Outbound => 0,
            ClosedEnd::Inbound => 1,
        });
    }

    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        let stream_id = codec::get_u32(buf, "stream id")?;
        let closed = match codec::get_u8(buf, "closed end")? {
            0 => ClosedEnd::Outbound,
            1 => ClosedEnd::Inbound,
            tag => {
                return Err(CodecError::UnknownTag {
                    kind: "closed end",
                    tag,
                })
            }
        };
        Ok(Self { stream_id, closed })
    }
}

impl Payload for StreamClose {
    const NAME: &'static str = "meshnet.stream.close";
}
