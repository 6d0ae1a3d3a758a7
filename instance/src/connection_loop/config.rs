use std::time::Duration;

use super::{error::ConnectionLoopError, target::Target};

/// Contains config properties which will be used by a
/// [`ConnectionLoop`](super::ConnectionLoop)
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionLoopConfig {
    /// Tried in order on every pass
    pub targets: Vec<Target>,
    /// Upper bound for a single attempt
    pub timeout: Duration,
    /// Pause after the first failed pass
    pub cooldown: Duration,
    /// Factor the cooldown grows by per pass. Values up to 1 keep it constant.
    pub growth: f64,
    /// Cooldown never grows beyond this. Zero means unbounded.
    pub ceiling: Duration,
    /// Number of passes before giving up. Zero means unbounded.
    pub iteration_limit: u32,
}

impl Default for ConnectionLoopConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            timeout: Duration::from_millis(1000),
            cooldown: Duration::from_millis(5000),
            growth: 1.0,
            ceiling: Duration::ZERO,
            iteration_limit: 0,
        }
    }
}

impl ConnectionLoopConfig {
    /// A default config connecting to the given `host[:port]` strings
    pub fn with_targets<S: AsRef<str>>(targets: &[S]) -> Result<Self, ConnectionLoopError> {
        let targets = targets
            .iter()
            .map(|target| Target::parse(target.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            targets,
            ..Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), ConnectionLoopError> {
        if self.targets.is_empty() {
            return Err(ConnectionLoopError::InvalidConfig {
                reason: "at least one target is required",
            });
        }
        if self.timeout.is_zero() {
            return Err(ConnectionLoopError::InvalidConfig {
                reason: "the attempt timeout must be positive",
            });
        }
        if !self.growth.is_finite() {
            return Err(ConnectionLoopError::InvalidConfig {
                reason: "the growth factor must be finite",
            });
        }
        Ok(())
    }

    /// Cooldown to wait after `passes` failed passes
    pub fn cooldown_after(&self, passes: u32) -> Duration {
        if passes <= 1 || self.growth <= 1.0 {
            return self.capped(self.cooldown);
        }
        let exponent = i32::try_from(passes - 1).unwrap_or(i32::MAX);
        let millis = self.cooldown.as_millis() as f64 * self.growth.powi(exponent);
        let grown = if millis.is_finite() && millis < u64::MAX as f64 {
            Duration::from_millis(millis as u64)
        } else {
            Duration::MAX
        };
        self.capped(grown)
    }

    fn capped(&self, cooldown: Duration) -> Duration {
        if self.ceiling.is_zero() {
            cooldown
        } else {
            cooldown.min(self.ceiling)
        }
    }
}
