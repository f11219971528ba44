//! Cluster status summary parsing.
//!
//! The status reply is a set of `key:value` lines (CR-LF or LF delimited).
//! Only `cluster_state` gates anything; the remaining counters are parsed
//! best-effort and kept for diagnostics. Unknown fields are ignored so newer
//! server versions do not break the parser.

/// Parsed `key:value` status summary of the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterStatus {
    pub state: String,
    pub slots_assigned: u64,
    pub slots_ok: u64,
    pub slots_pfail: u64,
    pub slots_fail: u64,
    pub known_nodes: u64,
    pub size: u64,
    pub current_epoch: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
}

impl ClusterStatus {
    /// Parse a raw status reply. Never fails: missing fields keep their
    /// defaults, readiness is judged separately via [`ClusterStatus::is_ok`].
    pub fn parse(text: &str) -> Self {
        let mut status = Self::default();
        for line in text.lines() {
            let Some((field, value)) = line.trim_end_matches('\r').split_once(':') else {
                continue;
            };
            match field {
                "cluster_state" => status.state = value.to_string(),
                "cluster_slots_assigned" => status.slots_assigned = parse_counter(value),
                "cluster_slots_ok" => status.slots_ok = parse_counter(value),
                "cluster_slots_pfail" => status.slots_pfail = parse_counter(value),
                "cluster_slots_fail" => status.slots_fail = parse_counter(value),
                "cluster_known_nodes" => status.known_nodes = parse_counter(value),
                "cluster_size" => status.size = parse_counter(value),
                "cluster_current_epoch" | "cluster_my_epoch" => {
                    status.current_epoch = parse_counter(value)
                }
                "cluster_stats_messages_sent" => status.messages_sent = parse_counter(value),
                "cluster_stats_messages_received" => {
                    status.messages_received = parse_counter(value)
                }
                _ => {}
            }
        }
        status
    }

    /// Whether the cluster reports itself ready to serve.
    pub fn is_ok(&self) -> bool {
        self.state == "ok"
    }
}

fn parse_counter(value: &str) -> u64 {
    value.trim().parse().unwrap_or(0)
}
