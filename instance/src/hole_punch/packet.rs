use bytes::{Buf, BufMut, BytesMut};

/// Marks a hole punch request
pub const RQ_MAGIC: u32 = 0xC390_A7D5;
/// Marks a hole punch response
pub const RS_MAGIC: u32 = 0x5D7A_093C;

pub(crate) const PACKET_LEN: usize = 8;

/// One hole punch datagram: a magic number followed by a nonce
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PunchPacket {
    Request { nonce: u32 },
    Response { nonce: u32 },
}

impl PunchPacket {
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(PACKET_LEN);
        let (magic, nonce) = match self {
            PunchPacket::Request { nonce } => (RQ_MAGIC, *nonce),
            PunchPacket::Response { nonce } => (RS_MAGIC, *nonce),
        };
        buf.put_u32(magic);
        buf.put_u32(nonce);
        buf
    }

    /// `None` for anything that is not exactly a request or response
    pub fn decode(mut datagram: &[u8]) -> Option<Self> {
        if datagram.len() != PACKET_LEN {
            return None;
        }
        let magic = datagram.get_u32();
        let nonce = datagram.get_u32();
        match magic {
            RQ_MAGIC => Some(PunchPacket::Request { nonce }),
            RS_MAGIC => Some(PunchPacket::Response { nonce }),
            _ => None,
        }
    }
}
