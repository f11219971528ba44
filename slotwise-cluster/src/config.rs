//! Routing-layer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`ClusterClient`](crate::ClusterClient).
///
/// Connection tuning (pool sizes, TLS, socket timeouts) belongs to the
/// concrete [`Connector`](slotwise_client::Connector) implementation, not
/// here.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Route read-mode lookups to replicas only, never the master.
    /// When false (the default) the master is part of the read candidate set.
    pub replica_reads_exclusive: bool,

    /// Optional deadline applied to each top-level multi-key operation,
    /// in milliseconds. `None` means no client-side deadline.
    pub op_timeout_ms: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { replica_reads_exclusive: false, op_timeout_ms: None }
    }
}

impl ClusterConfig {
    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClusterConfig::default();
        assert!(!config.replica_reads_exclusive);
        assert!(config.op_timeout().is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ClusterConfig =
            serde_json::from_str(r#"{"replica_reads_exclusive": true}"#).unwrap();
        assert!(config.replica_reads_exclusive);
        assert!(config.op_timeout_ms.is_none());
    }

    #[test]
    fn test_timeout_conversion() {
        let config = ClusterConfig { op_timeout_ms: Some(250), ..Default::default() };
        assert_eq!(config.op_timeout(), Some(Duration::from_millis(250)));
    }
}
