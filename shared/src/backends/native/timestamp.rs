use std::time::SystemTime;

use thiserror::Error;

/// Error type for timestamp operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimeError {
    /// System time is before UNIX epoch
    #[error("System time is before UNIX epoch")]
    SystemTimeBeforeEpoch,
}

/// Wall-clock milliseconds since the UNIX epoch, the unit every state tree
/// value is stamped with
pub struct Timestamp;

impl Timestamp {
    /// Returns the current timestamp in milliseconds since UNIX epoch.
    ///
    /// # Errors
    /// Returns `TimeError::SystemTimeBeforeEpoch` if system time is before UNIX epoch.
    pub fn try_now() -> Result<u64, TimeError> {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .map_err(|_| TimeError::SystemTimeBeforeEpoch)
    }

    /// Like [`Timestamp::try_now`], but a clock set before the epoch reads as 0
    pub fn now_or_zero() -> u64 {
        Self::try_now().unwrap_or(0)
    }
}
