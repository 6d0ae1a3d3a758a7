use std::time::Duration;

/// Contains config properties which will be used by [`punch`](super::punch)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HolePunchConfig {
    /// Requests sent before giving up
    pub request_max: u32,
    /// Spacing between requests
    pub request_timeout: Duration,
    /// Quiet period after a valid response before the channel is handed on
    pub silent_time: Duration,
}

impl Default for HolePunchConfig {
    fn default() -> Self {
        Self {
            request_max: 3,
            request_timeout: Duration::from_millis(800),
            silent_time: Duration::from_millis(800),
        }
    }
}
