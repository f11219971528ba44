//! Physical node addresses.

use std::fmt;
use std::str::FromStr;

use crate::ClientError;

/// A node's physical address (`host:port`).
///
/// Hosts are kept as strings rather than resolved IPs: cluster status output
/// may announce hostnames, and resolution is the connector's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Address {
    type Err = ClientError;

    /// Parses `host:port`. The port is the part after the *last* colon so
    /// that bracketed IPv6 hosts survive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ClientError::Protocol(format!("address '{s}' has no port")))?;
        if host.is_empty() {
            return Err(ClientError::Protocol(format!("address '{s}' has no host")));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| ClientError::Protocol(format!("address '{s}' has a bad port: {e}")))?;
        Ok(Self::new(host, port))
    }
}
