//! Cluster-level error taxonomy.

use slotwise_client::ClientError;
use thiserror::Error;

/// Result type alias for cluster routing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the routing layer.
///
/// `NodeNotFound` is the only soft kind: the dispatcher logs it per key and
/// keeps going. Stale-routing signals from nodes never appear here directly;
/// they drive the bounded refresh protocol and only surface wrapped inside
/// `ExhaustedRetries` once the bound is hit.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed topology text; fatal to the triggering call, never retried.
    #[error("topology parse error: {0}")]
    Parse(String),

    /// The cluster reports a non-ok state.
    #[error("cluster is not ready (state '{state}')")]
    NotReady { state: String },

    /// No group currently owns this slot (e.g. mid-migration).
    #[error("no node owns slot {slot}")]
    NodeNotFound { slot: u16 },

    /// A group had no eligible node for the requested access mode.
    #[error("no node available in group {master_id}")]
    NoNodeAvailable { master_id: String },

    /// Failure from the node-client boundary (connect, protocol, redirect).
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The refresh/retry protocol hit its bound without the routing settling.
    #[error("routing did not settle after {refreshes} topology refreshes: {source}")]
    ExhaustedRetries {
        refreshes: usize,
        #[source]
        source: Box<Error>,
    },

    /// Caller-supplied arguments rejected at the boundary.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The per-call deadline elapsed.
    #[error("operation timed out")]
    Timeout,
}

impl Error {
    /// Whether this failure indicates the local slot map is outdated and a
    /// topology refresh should be attempted.
    pub fn is_stale_routing(&self) -> bool {
        matches!(self, Error::Client(e) if e.is_stale_routing())
    }
}
