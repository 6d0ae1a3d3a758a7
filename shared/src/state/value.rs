use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    codec::{self, Codec, CodecError},
    sid::{InstanceFlavor, InstanceType},
};

/// The type of value an attribute holds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Boolean = 0,
    Integer = 1,
    Long = 2,
    String = 3,
    Bytes = 4,
    BooleanArray = 5,
    IntegerArray = 6,
    InstanceType = 7,
    InstanceFlavor = 8,
}

impl ValueType {
    fn from_tag(tag: u8) -> Result<Self, CodecError> {
        Ok(match tag {
            0 => ValueType::Boolean,
            1 => ValueType::Integer,
            2 => ValueType::Long,
            3 => ValueType::String,
            4 => ValueType::Bytes,
            5 => ValueType::BooleanArray,
            6 => ValueType::IntegerArray,
            7 => ValueType::InstanceType,
            8 => ValueType::InstanceFlavor,
            _ => {
                return Err(CodecError::UnknownTag {
                    kind: "value type",
                    tag,
                })
            }
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A value stored in an attribute
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    Boolean(bool),
    Integer(i32),
    Long(i64),
    String(String),
    Bytes(Bytes),
    BooleanArray(Vec<bool>),
    IntegerArray(Vec<i32>),
    InstanceType(InstanceType),
    InstanceFlavor(InstanceFlavor),
}

impl AttributeValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            AttributeValue::Boolean(_) => ValueType::Boolean,
            AttributeValue::Integer(_) => ValueType::Integer,
            AttributeValue::Long(_) => ValueType::Long,
            AttributeValue::String(_) => ValueType::String,
            AttributeValue::Bytes(_) => ValueType::Bytes,
            AttributeValue::BooleanArray(_) => ValueType::BooleanArray,
            AttributeValue::IntegerArray(_) => ValueType::IntegerArray,
            AttributeValue::InstanceType(_) => ValueType::InstanceType,
            AttributeValue::InstanceFlavor(_) => ValueType::InstanceFlavor,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            AttributeValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Integers widen to longs
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Long(value) => Some(*value),
            AttributeValue::Integer(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttributeValue::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_instance_type(&self) -> Option<InstanceType> {
        match self {
            AttributeValue::InstanceType(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_instance_flavor(&self) -> Option<InstanceFlavor> {
        match self {
            AttributeValue::InstanceFlavor(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Long(value)
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<Bytes> for AttributeValue {
    fn from(value: Bytes) -> Self {
        AttributeValue::Bytes(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        AttributeValue::Bytes(Bytes::from(value))
    }
}

impl From<Vec<bool>> for AttributeValue {
    fn from(value: Vec<bool>) -> Self {
        AttributeValue::BooleanArray(value)
    }
}

impl From<Vec<i32>> for AttributeValue {
    fn from(value: Vec<i32>) -> Self {
        AttributeValue::IntegerArray(value)
    }
}

impl From<InstanceType> for AttributeValue {
    fn from(value: InstanceType) -> Self {
        AttributeValue::InstanceType(value)
    }
}

impl From<InstanceFlavor> for AttributeValue {
    fn from(value: InstanceFlavor) -> Self {
        AttributeValue::InstanceFlavor(value)
    }
}

/// A value together with the time (milliseconds) it was set
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimestampedValue {
    pub timestamp: u64,
    pub value: AttributeValue,
}

impl TimestampedValue {
    pub fn new(value: impl Into<AttributeValue>, timestamp: u64) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }
}

impl Codec for TimestampedValue {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.timestamp);
        buf.put_u8(self.value.value_type() as u8);
        match &self.value {
            AttributeValue::Boolean(value) => buf.put_u8(u8::from(*value)),
            AttributeValue::Integer(value) => buf.put_i32(*value),
            AttributeValue::Long(value) => buf.put_i64(*value),
            AttributeValue::String(value) => codec::put_str(buf, value),
            AttributeValue::Bytes(value) => codec::put_bytes(buf, value),
            AttributeValue::BooleanArray(values) => {
                buf.put_u32(values.len() as u32);
                for value in values {
                    buf.put_u8(u8::from(*value));
                }
            }
            AttributeValue::IntegerArray(values) => {
                buf.put_u32(values.len() as u32);
                for value in values {
                    buf.put_i32(*value);
                }
            }
            AttributeValue::InstanceType(value) => buf.put_u8(value.bits() as u8),
            AttributeValue::InstanceFlavor(value) => buf.put_u8(value.value()),
        }
    }

    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        let timestamp = codec::get_u64(buf, "timestamp")?;
        let value = match ValueType::from_tag(codec::get_u8(buf, "value type")?)? {
            ValueType::Boolean => AttributeValue::Boolean(codec::get_bool(buf, "boolean")?),
            ValueType::Integer => AttributeValue::Integer(codec::get_i32(buf, "integer")?),
            ValueType::Long => AttributeValue::Long(codec::get_i64(buf, "long")?),
            ValueType::String => AttributeValue::String(codec::get_string(buf, "string")?),
            ValueType::Bytes => AttributeValue::Bytes(codec::get_bytes(buf, "bytes")?),
            ValueType::BooleanArray => {
                let len = codec::get_u32(buf, "boolean array length")? as usize;
                codec::ensure(buf, len, "boolean array")?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(codec::get_bool(buf, "boolean array")?);
                }
                AttributeValue::BooleanArray(values)
            }
            ValueType::IntegerArray => {
                let len = codec::get_u32(buf, "integer array length")? as usize;
                codec::ensure(buf, len.saturating_mul(4), "integer array")?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(codec::get_i32(buf, "integer array")?);
                }
                AttributeValue::IntegerArray(values)
            }
            ValueType::InstanceType => {
                let bits = codec::get_u8(buf, "instance type")?;
                let instance_type = InstanceType::from_bits(u32::from(bits)).ok_or_else(|| {
                    CodecError::InvalidField {
                        field: "instance type",
                        reason: format!("unknown instance type {}", bits),
                    }
                })?;
                AttributeValue::InstanceType(instance_type)
            }
            ValueType::InstanceFlavor => {
                let flavor = codec::get_u8(buf, "instance flavor")?;
                let flavor =
                    InstanceFlavor::new(flavor).map_err(|err| CodecError::InvalidField {
                        field: "instance flavor",
                        reason: err.to_string(),
                    })?;
                AttributeValue::InstanceFlavor(flavor)
            }
        };
        Ok(Self { timestamp, value })
    }
}

/// What an attribute does with the values it replaces
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep at most this many historical values
    ItemLimited(usize),
    /// Keep values set within this many milliseconds of the current one
    TimeLimited(u64),
    /// Keep every historical value
    Unlimited,
}
