/// Which side of a sync publishes and which consumes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SyncDirection {
    /// Both sides publish and both consume
    Bidirectional,
    /// The initiator consumes what the other side publishes
    #[default]
    Downstream,
    /// The initiator publishes to the other side
    Upstream,
}

/// The stream roles one side of a sync runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncRoles {
    pub source: bool,
    pub sink: bool,
}

impl SyncDirection {
    pub fn roles(self, initiator: bool) -> SyncRoles {
        match self {
            SyncDirection::Bidirectional => SyncRoles {
                source: true,
                sink: true,
            },
            SyncDirection::Downstream => SyncRoles {
                source: !initiator,
                sink: initiator,
            },
            SyncDirection::Upstream => SyncRoles {
                source: initiator,
                sink: !initiator,
            },
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            SyncDirection::Bidirectional => 0,
            SyncDirection::Downstream => 1,
            SyncDirection::Upstream => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(SyncDirection::Bidirectional),
            1 => Some(SyncDirection::Downstream),
            2 => Some(SyncDirection::Upstream),
            _ => None,
        }
    }
}
