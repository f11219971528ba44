//! Node-level error classification.

use thiserror::Error;

/// Errors surfaced by a node client.
///
/// The cluster router does not care about most failure details, but it must
/// be able to classify them: a stale-routing redirect triggers a topology
/// refresh, a connect failure fails the affected bucket, everything else
/// propagates as-is.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not establish (or health-check) a connection to a node.
    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    /// The node no longer owns the slot; ownership moved permanently.
    #[error("slot {slot} moved to {addr}")]
    Moved { slot: u16, addr: String },

    /// The slot is mid-migration and temporarily served elsewhere.
    #[error("slot {slot} importing at {addr}")]
    Ask { slot: u16, addr: String },

    /// The node rejected or garbled a command.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// True for redirect-class failures: the caller's view of slot ownership
    /// is outdated and a topology refresh is warranted.
    pub fn is_stale_routing(&self) -> bool {
        matches!(self, ClientError::Moved { .. } | ClientError::Ask { .. })
    }

    /// True for failures worth retrying against the same topology.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Connect { .. } | ClientError::Io(_))
    }
}
