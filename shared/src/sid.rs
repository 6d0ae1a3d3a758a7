use std::fmt;

use thiserror::Error;

const TYPE_BITS: u32 = 3;
const FLAVOR_BITS: u32 = 5;
const TYPE_MASK: u32 = (1 << TYPE_BITS) - 1;
const FLAVOR_MASK: u32 = (1 << FLAVOR_BITS) - 1;
const RANDOM_SHIFT: u32 = TYPE_BITS + FLAVOR_BITS;

/// Errors that can occur while decoding or building a session id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SidError {
    /// The three type bits do not name a known instance type
    #[error("Session id {sid:#x} encodes unknown instance type {bits}")]
    UnknownInstanceType { sid: u32, bits: u32 },

    /// A flavor does not fit into five bits
    #[error("Instance flavor {flavor} does not fit into {FLAVOR_BITS} bits")]
    FlavorOutOfRange { flavor: u8 },

    /// Zero is reserved to mean "no session id"
    #[error("Session id 0 is reserved")]
    Zero,
}

/// The role an instance plays in the network
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstanceType {
    Agent = 1,
    Client = 2,
    Deployer = 3,
    Bootagent = 4,
    Server = 5,
}

impl InstanceType {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(InstanceType::Agent),
            2 => Some(InstanceType::Client),
            3 => Some(InstanceType::Deployer),
            4 => Some(InstanceType::Bootagent),
            5 => Some(InstanceType::Server),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        self as u32
    }
}

/// Implementation variant of an instance type, five bits wide
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceFlavor(u8);

impl InstanceFlavor {
    pub const NONE: InstanceFlavor = InstanceFlavor(0);

    pub fn new(flavor: u8) -> Result<Self, SidError> {
        if u32::from(flavor) > FLAVOR_MASK {
            return Err(SidError::FlavorOutOfRange { flavor });
        }
        Ok(Self(flavor))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// A session identifier.
///
/// Bits 0-2 carry the [`InstanceType`], bits 3-7 the [`InstanceFlavor`] and
/// the remaining bits are random. A session id is always positive when read as
/// an `i32`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sid(u32);

impl Sid {
    /// The reserved "no session id" value
    pub const NONE: Sid = Sid(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Generate a random session id for an instance of the given type
    pub fn generate(instance_type: InstanceType, flavor: InstanceFlavor) -> Self {
        // one bit fewer than available so the sign bit stays clear
        let random = fastrand::u32(..) >> (RANDOM_SHIFT + 1);
        Self((random << RANDOM_SHIFT) | (u32::from(flavor.0) << TYPE_BITS) | instance_type.bits())
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn instance_type(self) -> Result<InstanceType, SidError> {
        if self.is_none() {
            return Err(SidError::Zero);
        }
        let bits = self.0 & TYPE_MASK;
        InstanceType::from_bits(bits).ok_or(SidError::UnknownInstanceType { sid: self.0, bits })
    }

    pub fn instance_flavor(self) -> InstanceFlavor {
        InstanceFlavor(((self.0 >> TYPE_BITS) & FLAVOR_MASK) as u8)
    }

    /// Whether this id decodes to a server instance
    pub fn is_server(self) -> bool {
        matches!(self.instance_type(), Ok(InstanceType::Server))
    }
}

impl From<u32> for Sid {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
