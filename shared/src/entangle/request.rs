use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    codec::{self, Codec, CodecError},
    connection::Payload,
    oid::{Oid, WILDCARD},
    state::NodeType,
};

use super::{direction::SyncDirection, error::EntangleError};

/// Options for starting a sync from the initiating side
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    pub direction: SyncDirection,
    /// Keep streaming deltas after the initial snapshot
    pub permanent: bool,
    /// Restrict the sync to these Oids (all below the entangled root)
    pub whitelist: Vec<Oid>,
    /// Hint for how often the publishing side should flush, carried to the
    /// remote as-is
    pub update_period: Duration,
    /// Stream id to use, or `None` to pick a random one
    pub stream_id: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            direction: SyncDirection::default(),
            permanent: true,
            whitelist: Vec::new(),
            update_period: Duration::ZERO,
            stream_id: None,
        }
    }
}

/// Asks a remote instance to build its half of a sync
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncRequest {
    pub stream_id: u32,
    pub oid: Oid,
    /// Direction as seen from the initiator
    pub direction: SyncDirection,
    pub permanent: bool,
    pub whitelist: Vec<Oid>,
    pub update_period: Duration,
    /// Kind of node at `oid` on the initiating side, so the other side
    /// creates the same kind when it has nothing there yet
    pub root_type: NodeType,
}

impl SyncRequest {
    pub fn new(oid: Oid, config: &SyncConfig) -> Result<Self, EntangleError> {
        let request = Self {
            stream_id: match config.stream_id {
                Some(stream_id) => stream_id,
                None => fastrand::u32(1..),
            },
            direction: config.direction,
            permanent: config.permanent,
            whitelist: config.whitelist.clone(),
            update_period: config.update_period,
            root_type: implied_root_type(&oid),
            oid,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), EntangleError> {
        if self.stream_id == 0 {
            return Err(EntangleError::ZeroStreamId);
        }
        validate_root(&self.oid)?;
        let ends_in_slot = self.oid.path().last().map_or(false, |last| last.is_unresolved());
        if ends_in_slot != (self.root_type == NodeType::Collection) {
            return Err(EntangleError::InvalidRoot {
                oid: self.oid.to_string(),
                reason: "only a collection ends in an empty id slot",
            });
        }
        if let Some(entry) = self
            .whitelist
            .iter()
            .find(|entry| !entry.is_descendant_of(&self.oid))
        {
            return Err(EntangleError::WhitelistOutsideRoot {
                entry: entry.to_string(),
                root: self.oid.to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn validate_root(oid: &Oid) -> Result<(), EntangleError> {
    let Some((last, parents)) = oid.path().split_last() else {
        return Err(EntangleError::InvalidRoot {
            oid: oid.to_string(),
            reason: "the tree root cannot be entangled",
        });
    };
    if parents.iter().any(|component| component.is_generic()) {
        return Err(EntangleError::InvalidRoot {
            oid: oid.to_string(),
            reason: "every id above the root must be resolved",
        });
    }
    if last.element() == WILDCARD || last.id() == Some(WILDCARD) {
        return Err(EntangleError::InvalidRoot {
            oid: oid.to_string(),
            reason: "wildcards cannot be entangled",
        });
    }
    Ok(())
}

/// A trailing empty id slot names a collection; anything else defaults to a
/// document until the tree says otherwise
pub(crate) fn implied_root_type(oid: &Oid) -> NodeType {
    match oid.path().last() {
        Some(last) if last.is_unresolved() => NodeType::Collection,
        _ => NodeType::Document,
    }
}

fn root_type_tag(root_type: NodeType) -> u8 {
    match root_type {
        NodeType::Document => 0,
        NodeType::Collection => 1,
        NodeType::Attribute => 2,
    }
}

fn root_type_from_tag(tag: u8) -> Option<NodeType> {
    match tag {
        0 => Some(NodeType::Document),
        1 => Some(NodeType::Collection),
        2 => Some(NodeType::Attribute),
        _ => None,
    }
}

fn get_oid(buf: &mut Bytes, field: &'static str) -> Result<Oid, CodecError> {
    let text = codec::get_string(buf, field)?;
    Oid::parse(&text).map_err(|err| CodecError::InvalidField {
        field,
        reason: err.to_string(),
    })
}

impl Codec for SyncRequest {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.stream_id);
        codec::put_str(buf, &self.oid.to_string());
        buf.put_u8(self.direction.tag());
        buf.put_u8(u8::from(self.permanent));
        buf.put_u32(self.whitelist.len() as u32);
        for entry in &self.whitelist {
            codec::put_str(buf, &entry.to_string());
        }
        buf.put_u64(self.update_period.as_millis() as u64);
        buf.put_u8(root_type_tag(self.root_type));
    }

    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        let stream_id = codec::get_u32(buf, "stream id")?;
        let oid = get_oid(buf, "sync oid")?;
        let tag = codec::get_u8(buf, "sync direction")?;
        let direction = SyncDirection::from_tag(tag).ok_or(CodecError::UnknownTag {
            kind: "sync direction",
            tag,
        })?;
        let permanent = codec::get_bool(buf, "permanent")?;
        let count = codec::get_u32(buf, "whitelist length")?;
        let mut whitelist = Vec::new();
        for _ in 0..count {
            whitelist.push(get_oid(buf, "whitelist entry")?);
        }
        let update_period = Duration::from_millis(codec::get_u64(buf, "update period")?);
        let tag = codec::get_u8(buf, "root type")?;
        let root_type = root_type_from_tag(tag).ok_or(CodecError::UnknownTag {
            kind: "root type",
            tag,
        })?;
        Ok(Self {
            stream_id,
            oid,
            direction,
            permanent,
            whitelist,
            update_period,
            root_type,
        })
    }
}

impl Payload for SyncRequest {
    const NAME: &'static str = "meshnet.entangle.sync_request";
}
