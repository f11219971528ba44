//! Topology-aware routing for a hash-slot sharded key-value store.
//!
//! The key space is split into 16384 hash slots (CRC-16 of the key, or of
//! its `{...}` hash tag when present). Each slot belongs to one master and
//! its replicas. This crate parses the cluster's textual topology replies
//! into an immutable slot map, routes single-key calls to the owning group,
//! and fans multi-key calls out across groups concurrently, merging the
//! partial results back into one answer.
//!
//! When a node signals that routing went stale (a redirect), the router
//! refreshes its slot map and retries, a bounded number of times per call.
//!
//! The transport is pluggable: callers supply a
//! [`Connector`](slotwise_client::Connector) for data connections and a
//! [`ClusterProbe`](slotwise_client::ClusterProbe) for topology text.

pub mod cache;
pub mod config;
pub mod crc16;
pub mod dispatcher;
pub mod error;
pub mod pairs;
pub mod slot;
pub mod status;
pub mod topology;

pub use cache::ClientCache;
pub use config::ClusterConfig;
pub use dispatcher::ClusterClient;
pub use error::{Error, Result};
pub use pairs::{strip_slot_tag, strip_slot_tags, tagged_key, KvPair};
pub use slot::{extract_hash_tag, hash_slot, hash_slot_str, label_for_range, CLUSTER_SLOTS};
pub use status::ClusterStatus;
pub use topology::{Node, NodeGroup, Role, SlotRange, Topology};
