//! Typed commands and replies at the node boundary.
//!
//! The router only ever needs the handful of primitives it fans multi-key
//! calls out into. Keeping them as a closed enum (instead of untyped argument
//! bags) means a sub-operation is validated once when it is built, not on
//! every hop through the dispatcher.

use std::time::Duration;

/// One command against a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch one value.
    Get { key: String },
    /// Store one value, optionally with a time-to-live.
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    /// Delete a set of keys, returning how many existed.
    Del { keys: Vec<String> },
    /// Count whether one key exists (0 or 1).
    Exists { key: String },
    /// Liveness check; used once when a connection is first cached.
    Ping,
}

/// A node's reply to one [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Generic success status (e.g. for `Set`).
    Ok,
    /// Reply to `Ping`.
    Pong,
    /// Integer reply (`Del`, `Exists` counts).
    Int(i64),
    /// Value reply for `Get`; `None` when the key is absent.
    Value(Option<String>),
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok)
    }

    /// Integer payload, if this is an integer reply.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Value payload, if this is a value reply.
    pub fn into_value(self) -> Option<Option<String>> {
        match self {
            Reply::Value(v) => Some(v),
            _ => None,
        }
    }
}
