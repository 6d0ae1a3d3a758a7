use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    codec::{self, Codec, CodecError},
    oid::PathComponent,
};

use super::value::TimestampedValue;

/// One change to a subtree, addressed relative to the subtree's root
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delta {
    pub path: Vec<PathComponent>,
    pub kind: DeltaKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeltaKind {
    /// An attribute took a new value
    Value(TimestampedValue),
    /// A document exists at the path
    Added,
    /// The node at the path was removed
    Removed,
}

impl Delta {
    pub fn value(path: Vec<PathComponent>, value: TimestampedValue) -> Self {
        Self {
            path,
            kind: DeltaKind::Value(value),
        }
    }

    pub fn added(path: Vec<PathComponent>) -> Self {
        Self {
            path,
            kind: DeltaKind::Added,
        }
    }

    pub fn removed(path: Vec<PathComponent>) -> Self {
        Self {
            path,
            kind: DeltaKind::Removed,
        }
    }

    /// The path in `/a/b(1)` form
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for component in &self.path {
            out.push('/');
            out.push_str(&component.to_string());
        }
        out
    }
}

const TAG_VALUE: u8 = 0;
const TAG_ADDED: u8 = 1;
const TAG_REMOVED: u8 = 2;

impl Codec for Delta {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.path.len() as u32);
        for component in &self.path {
            codec::put_str(buf, &component.to_string());
        }
        match &self.kind {
            DeltaKind::Value(value) => {
                buf.put_u8(TAG_VALUE);
                value.encode(buf);
            }
            DeltaKind::Added => buf.put_u8(TAG_ADDED),
            DeltaKind::Removed => buf.put_u8(TAG_REMOVED),
        }
    }

    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        let len = codec::get_u32(buf, "path length")? as usize;
        // every component takes at least its four byte length prefix
        codec::ensure(buf, len.saturating_mul(4), "path")?;
        let mut path = Vec::with_capacity(len);
        for _ in 0..len {
            // validated when the delta is merged
            path.push(PathComponent::raw(&codec::get_string(buf, "path component")?));
        }
        let kind = match codec::get_u8(buf, "delta kind")? {
            TAG_VALUE => DeltaKind::Value(TimestampedValue::decode(buf)?),
            TAG_ADDED => DeltaKind::Added,
            TAG_REMOVED => DeltaKind::Removed,
            tag => {
                return Err(CodecError::UnknownTag {
                    kind: "delta kind",
                    tag,
                })
            }
        };
        Ok(Self { path, kind })
    }
}
