use meshnet_shared::{InstanceFlavor, InstanceType, Sid};

/// Contains config properties which will be used by a [`NetworkStore`](super::NetworkStore)
#[derive(Clone, Debug)]
pub struct NetworkStoreConfig {
    /// Session id to start with. [`Sid::NONE`] leaves the store unassigned
    /// until [`NetworkStore::set_sid`](super::NetworkStore::set_sid).
    pub initial_sid: Sid,
    /// Server to relay through while it is reachable
    pub preferred_server: Option<Sid>,
    /// Type used when the store generates its own session id
    pub instance_type: InstanceType,
    pub instance_flavor: InstanceFlavor,
}

impl Default for NetworkStoreConfig {
    fn default() -> Self {
        Self {
            initial_sid: Sid::NONE,
            preferred_server: None,
            instance_type: InstanceType::Client,
            instance_flavor: InstanceFlavor::NONE,
        }
    }
}
