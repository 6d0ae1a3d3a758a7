//! Length-prefixed big-endian binary encoding for the records exchanged over
//! connections: state tree deltas, sync requests and stream frames.

mod error;

pub use error::CodecError;

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A type with a binary wire representation
pub trait Codec: Sized {
    fn encode(&self, buf: &mut BytesMut);

    fn decode(buf: &mut Bytes) -> Result<Self, CodecError>;

    /// Encode into a fresh, frozen buffer
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a whole buffer, rejecting leftovers
    fn from_bytes(mut bytes: Bytes) -> Result<Self, CodecError> {
        let value = Self::decode(&mut bytes)?;
        if bytes.has_remaining() {
            return Err(CodecError::TrailingBytes {
                remaining: bytes.remaining(),
            });
        }
        Ok(value)
    }
}

pub(crate) fn ensure(buf: &Bytes, needed: usize, field: &'static str) -> Result<(), CodecError> {
    if buf.remaining() < needed {
        return Err(CodecError::UnexpectedEnd {
            field,
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

pub(crate) fn get_u8(buf: &mut Bytes, field: &'static str) -> Result<u8, CodecError> {
    ensure(buf, 1, field)?;
    Ok(buf.get_u8())
}

pub(crate) fn get_u32(buf: &mut Bytes, field: &'static str) -> Result<u32, CodecError> {
    ensure(buf, 4, field)?;
    Ok(buf.get_u32())
}

pub(crate) fn get_i32(buf: &mut Bytes, field: &'static str) -> Result<i32, CodecError> {
    ensure(buf, 4, field)?;
    Ok(buf.get_i32())
}

pub(crate) fn get_u64(buf: &mut Bytes, field: &'static str) -> Result<u64, CodecError> {
    ensure(buf, 8, field)?;
    Ok(buf.get_u64())
}

pub(crate) fn get_i64(buf: &mut Bytes, field: &'static str) -> Result<i64, CodecError> {
    ensure(buf, 8, field)?;
    Ok(buf.get_i64())
}

pub(crate) fn get_bool(buf: &mut Bytes, field: &'static str) -> Result<bool, CodecError> {
    match get_u8(buf, field)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CodecError::InvalidField {
            field,
            reason: format!("expected 0 or 1, found {}", other),
        }),
    }
}

pub(crate) fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

pub(crate) fn get_bytes(buf: &mut Bytes, field: &'static str) -> Result<Bytes, CodecError> {
    let len = get_u32(buf, field)? as usize;
    ensure(buf, len, field)?;
    Ok(buf.split_to(len))
}

pub(crate) fn put_str(buf: &mut BytesMut, value: &str) {
    put_bytes(buf, value.as_bytes());
}

pub(crate) fn get_string(buf: &mut Bytes, field: &'static str) -> Result<String, CodecError> {
    let bytes = get_bytes(buf, field)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8 { field })
}
