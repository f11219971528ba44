//! Cluster topology: nodes, replica groups, slot ownership.
//!
//! Built from two textual replies: the `key:value` status summary and the
//! one-node-per-line node list, e.g.
//!
//! ```text
//! 25837095b1df96c37ffa96493e4bf2e693630be7 172.29.16.7:6379@1122 master - 0 1663066583000 1 connected 8192-11406 14138-16383
//! 7bc86a205acc548ffe415dc6649f636a273d655f 172.29.18.7:6379@1122 master - 0 1663066583895 2 connected 5462-8191 11407-14137
//! 8f3428825dcddfd603ad07bb6219fc756efc7102 172.29.19.4:6379@1122 myself,master - 0 1663066579000 0 connected 0-5461
//! 3c18de8b1b9a4b62b9c3e2354f2474a6e2e8f2a1 172.29.20.4:6379@1122 slave 8f3428825dcddfd603ad07bb6219fc756efc7102 0 1663066580000 0 connected
//! ```
//!
//! A parsed [`Topology`] is immutable; refreshes build a new one and swap it
//! wholesale so concurrent readers never observe a half-updated map.

use std::collections::HashMap;

use tracing::{debug, warn};

use slotwise_client::Address;

use crate::error::{Error, Result};
use crate::slot::{label_for_range, CLUSTER_SLOTS};
use crate::status::ClusterStatus;

/// An inclusive range of hash slots owned by one master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
}

impl SlotRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, slot: u16) -> bool {
        slot >= self.start && slot <= self.end
    }

    fn overlaps(&self, other: &SlotRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Parse a `start-end` token, checking bounds and ordering.
    fn parse_token(token: &str) -> Option<Self> {
        let (start, end) = token.split_once('-')?;
        let start = start.parse::<u16>().ok()?;
        let end = end.parse::<u16>().ok()?;
        if start > end || end >= CLUSTER_SLOTS {
            return None;
        }
        Some(Self { start, end })
    }
}

/// A node's role within its replica group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

/// One cluster node, parsed from a single node-list line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub addr: Address,
    pub role: Role,
    /// Owning master's id; slaves only.
    pub master_id: Option<String>,
    /// Owned slot ranges; masters only. May be empty, or disjoint and
    /// multiple after resharding.
    pub slot_ranges: Vec<SlotRange>,
    /// Canonical key tag guaranteed to hash into this node's first range.
    pub label: Option<String>,
}

impl Node {
    /// Parse one node-list line.
    ///
    /// A `" - "` separator marks the master form (front: id, address, flags;
    /// tail: timestamps, epoch, link state and slot tokens). Anything else
    /// must be a slave line with the literal `slave` between the front
    /// segment and the owning master's id.
    pub fn parse(line: &str) -> Result<Node> {
        if let Some((front, tail)) = line.split_once(" - ") {
            Self::parse_master(line, front, tail)
        } else {
            Self::parse_slave(line)
        }
    }

    fn parse_master(line: &str, front: &str, tail: &str) -> Result<Node> {
        let fields: Vec<&str> = front.split_whitespace().collect();
        if fields.len() < 3 || !fields[2].contains("master") {
            return Err(Error::Parse(format!("not a master line: '{line}'")));
        }

        let id = fields[0].to_string();
        let addr = parse_node_addr(fields[1])?;

        let mut slot_ranges = Vec::new();
        for token in tail.split_whitespace() {
            if token.starts_with('[') {
                // Migration annotation ([slot->-id] / [slot-<-id]); the slot
                // is in flight and intentionally not routed until it settles.
                debug!(token, id = %id, "skipping migration marker");
                continue;
            }
            if !token.contains('-') {
                continue;
            }
            match SlotRange::parse_token(token) {
                Some(range) => slot_ranges.push(range),
                None => warn!(token, id = %id, "skipping malformed slot token"),
            }
        }

        let label = slot_ranges.first().map(|r| label_for_range("n", r));

        Ok(Node { id, addr, role: Role::Master, master_id: None, slot_ranges, label })
    }

    fn parse_slave(line: &str) -> Result<Node> {
        let (front, tail) = line
            .split_once("slave")
            .ok_or_else(|| Error::Parse(format!("line matches neither node form: '{line}'")))?;

        let fields: Vec<&str> = front.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(Error::Parse(format!("truncated slave line: '{line}'")));
        }
        let id = fields[0].to_string();
        let addr = parse_node_addr(fields[1])?;

        let master_id = tail
            .split_whitespace()
            .next()
            .ok_or_else(|| Error::Parse(format!("slave line without master id: '{line}'")))?
            .to_string();

        Ok(Node {
            id,
            addr,
            role: Role::Slave,
            master_id: Some(master_id),
            slot_ranges: Vec::new(),
            label: None,
        })
    }

    /// Build a key guaranteed to hash into this node's slots, using the
    /// node's canonical label as a hash tag (`{label}:key`).
    pub fn co_located_key(&self, key: &str) -> Option<String> {
        self.label.as_deref().map(|label| crate::pairs::tagged_key(label, key))
    }
}

/// Strip the optional `@busport` suffix and parse `host:port`.
fn parse_node_addr(field: &str) -> Result<Address> {
    let addr = field.split('@').next().unwrap_or(field);
    addr.parse::<Address>().map_err(|e| Error::Parse(format!("bad node address '{field}': {e}")))
}

/// One master with its replicas.
#[derive(Debug, Clone)]
pub struct NodeGroup {
    pub master: Node,
    pub replicas: Vec<Node>,
}

impl NodeGroup {
    pub fn owns(&self, slot: u16) -> bool {
        self.master.slot_ranges.iter().any(|r| r.contains(slot))
    }
}

/// Immutable snapshot of slot ownership across the cluster.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    groups: HashMap<String, NodeGroup>,
}

impl Topology {
    /// Parse the two status replies into a topology.
    ///
    /// Fails with [`Error::NotReady`] unless `cluster_state` is `ok`, and
    /// with [`Error::Parse`] on any malformed node line (no partial topology
    /// is ever returned) or when two masters claim overlapping ranges.
    ///
    /// Grouping is line-order independent: a slave seen before its master
    /// creates a placeholder group that the master line later fills in.
    pub fn parse(status_text: &str, nodes_text: &str) -> Result<Topology> {
        let status = ClusterStatus::parse(status_text);
        if !status.is_ok() {
            return Err(Error::NotReady { state: status.state });
        }

        #[derive(Default)]
        struct PartialGroup {
            master: Option<Node>,
            replicas: Vec<Node>,
        }

        let mut partial: HashMap<String, PartialGroup> = HashMap::new();
        for line in nodes_text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let node = Node::parse(line)?;
            match node.role {
                Role::Master => {
                    let id = node.id.clone();
                    partial.entry(id).or_default().master = Some(node);
                }
                Role::Slave => {
                    // parse_slave always sets master_id.
                    if let Some(master_id) = node.master_id.clone() {
                        partial.entry(master_id).or_default().replicas.push(node);
                    }
                }
            }
        }

        let mut groups = HashMap::new();
        for (id, group) in partial {
            match group.master {
                Some(master) => {
                    groups.insert(id, NodeGroup { master, replicas: group.replicas });
                }
                None => {
                    // Replicas referencing a master we never saw cannot serve
                    // any slot; seen transiently during failover.
                    warn!(master_id = %id, replicas = group.replicas.len(),
                        "dropping group without a master line");
                }
            }
        }

        let topology = Topology { groups };
        topology.check_disjoint()?;
        Ok(topology)
    }

    fn check_disjoint(&self) -> Result<()> {
        let owned: Vec<(&str, &SlotRange)> = self
            .groups
            .values()
            .flat_map(|g| g.master.slot_ranges.iter().map(move |r| (g.master.id.as_str(), r)))
            .collect();
        // Pairwise is fine here: clusters have a handful of masters with a
        // handful of ranges each.
        for (i, (id_a, a)) in owned.iter().enumerate() {
            for (id_b, b) in &owned[i + 1..] {
                if id_a != id_b && a.overlaps(b) {
                    return Err(Error::Parse(format!(
                        "masters {id_a} and {id_b} claim overlapping slot ranges \
                         {}-{} and {}-{}",
                        a.start, a.end, b.start, b.end
                    )));
                }
            }
        }
        Ok(())
    }

    /// The group currently owning `slot`, if any. A `None` here is the soft
    /// `NodeNotFound` path: the slot may be mid-migration.
    pub fn group_for_slot(&self, slot: u16) -> Option<&NodeGroup> {
        self.groups.values().find(|g| g.owns(slot))
    }

    pub fn group(&self, master_id: &str) -> Option<&NodeGroup> {
        self.groups.get(master_id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &NodeGroup> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
