use std::{fmt, str::FromStr};

use super::error::ConnectionLoopError;

/// Port assumed when a target does not name one
pub const DEFAULT_PORT: u16 = 8768;

/// A `host:port` pair to connect to
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port` or `[v6]:port`
    pub fn parse(input: &str) -> Result<Self, ConnectionLoopError> {
        let invalid = |reason| ConnectionLoopError::InvalidTarget {
            target: input.to_string(),
            reason,
        };
        let input = input.trim();

        let (host, port) = if let Some(rest) = input.strip_prefix('[') {
            let (host, rest) = rest.split_once(']').ok_or_else(|| invalid("missing ']'"))?;
            match rest.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if rest.is_empty() => (host, None),
                None => return Err(invalid("unexpected text after ']'")),
            }
        } else if input.matches(':').count() > 1 {
            // a bare IPv6 address
            (input, None)
        } else {
            match input.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (input, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        let port = match port {
            Some(port) => port.parse().map_err(|_| invalid("port is not a number"))?,
            None => DEFAULT_PORT,
        };
        if port == 0 {
            return Err(invalid("port 0 is not connectable"));
        }
        Ok(Self::new(host, port))
    }
}

impl FromStr for Target {
    type Err = ConnectionLoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
