//! In-memory cluster for integration tests.
//!
//! One shared backing store, several logical nodes. Each node enforces slot
//! ownership against the cluster's current layout and answers with a
//! redirect when it is asked about a slot it does not own, which is exactly
//! what drives the router's refresh protocol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use slotwise_client::{
    Address, ClientError, ClusterProbe, Command, Connector, NodeClient, Reply,
};
use slotwise_cluster::slot::hash_slot_str;

#[derive(Clone)]
pub struct MasterSpec {
    pub id: String,
    pub addr: Address,
    pub replicas: Vec<(String, Address)>,
    pub ranges: Vec<(u16, u16)>,
}

impl MasterSpec {
    pub fn new(id: &str, addr: Address, ranges: &[(u16, u16)]) -> Self {
        Self { id: id.into(), addr, replicas: Vec::new(), ranges: ranges.to_vec() }
    }

    pub fn with_replica(mut self, id: &str, addr: Address) -> Self {
        self.replicas.push((id.into(), addr));
        self
    }

    fn owns(&self, slot: u16) -> bool {
        self.ranges.iter().any(|&(s, e)| slot >= s && slot <= e)
    }

    fn serves(&self, addr: &Address) -> bool {
        &self.addr == addr || self.replicas.iter().any(|(_, a)| a == addr)
    }
}

struct Inner {
    store: Mutex<HashMap<String, String>>,
    layout: Mutex<Vec<MasterSpec>>,
    always_stale: AtomicBool,
    status_calls: AtomicUsize,
    /// (node address, operation name) in execution order.
    ops: Mutex<Vec<(String, &'static str)>>,
}

pub struct MockCluster(Arc<Inner>);

impl MockCluster {
    pub fn new(layout: Vec<MasterSpec>) -> Arc<Self> {
        Arc::new(Self(Arc::new(Inner {
            store: Mutex::new(HashMap::new()),
            layout: Mutex::new(layout),
            always_stale: AtomicBool::new(false),
            status_calls: AtomicUsize::new(0),
            ops: Mutex::new(Vec::new()),
        })))
    }

    /// Replace the layout; nodes start redirecting immediately, the probe
    /// reports the new layout on the next fetch.
    pub fn reshard(&self, layout: Vec<MasterSpec>) {
        *self.0.layout.lock().unwrap() = layout;
    }

    /// Make every node redirect every data command, forever.
    pub fn set_always_stale(&self, on: bool) {
        self.0.always_stale.store(on, Ordering::SeqCst);
    }

    pub fn status_calls(&self) -> usize {
        self.0.status_calls.load(Ordering::SeqCst)
    }

    /// How many operations named `op` ran on `addr`.
    pub fn ops_on(&self, addr: &Address, op: &str) -> usize {
        let addr = addr.to_string();
        self.0.ops.lock().unwrap().iter().filter(|(a, o)| *a == addr && *o == op).count()
    }

    /// Distinct node addresses that ran an operation named `op`.
    pub fn nodes_running(&self, op: &str) -> usize {
        let mut addrs: Vec<String> = self
            .0
            .ops
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, o)| *o == op)
            .map(|(a, _)| a.clone())
            .collect();
        addrs.sort();
        addrs.dedup();
        addrs.len()
    }
}

fn render_nodes(layout: &[MasterSpec]) -> String {
    let mut out = String::new();
    for master in layout {
        let ranges: Vec<String> =
            master.ranges.iter().map(|(s, e)| format!("{s}-{e}")).collect();
        out.push_str(&format!(
            "{} {}@1122 master - 0 1663066583000 1 connected {}\n",
            master.id,
            master.addr,
            ranges.join(" ")
        ));
        for (rid, raddr) in &master.replicas {
            out.push_str(&format!(
                "{rid} {raddr}@1122 slave {} 0 1663066583000 1 connected\n",
                master.id
            ));
        }
    }
    out
}

#[async_trait]
impl ClusterProbe for MockCluster {
    async fn cluster_status(&self) -> Result<String, ClientError> {
        self.0.status_calls.fetch_add(1, Ordering::SeqCst);
        let groups = self.0.layout.lock().unwrap().len();
        Ok(format!("cluster_state:ok\r\ncluster_size:{groups}\r\n"))
    }

    async fn cluster_nodes(&self) -> Result<String, ClientError> {
        let layout = self.0.layout.lock().unwrap();
        Ok(render_nodes(&layout))
    }
}

#[async_trait]
impl Connector for MockCluster {
    async fn connect(&self, addr: &Address) -> Result<Arc<dyn NodeClient>, ClientError> {
        Ok(Arc::new(MockNode { inner: self.0.clone(), addr: addr.clone() }))
    }
}

struct MockNode {
    inner: Arc<Inner>,
    addr: Address,
}

impl MockNode {
    /// Fail with a redirect unless this node's group owns the key's slot.
    fn check_route(&self, key: &str) -> Result<(), ClientError> {
        let slot = hash_slot_str(key);
        if self.inner.always_stale.load(Ordering::SeqCst) {
            return Err(ClientError::Moved { slot, addr: self.addr.to_string() });
        }
        let layout = self.inner.layout.lock().unwrap();
        let owner = layout
            .iter()
            .find(|m| m.owns(slot))
            .ok_or_else(|| ClientError::Protocol(format!("slot {slot} unowned")))?;
        if owner.serves(&self.addr) {
            Ok(())
        } else {
            Err(ClientError::Moved { slot, addr: owner.addr.to_string() })
        }
    }

    fn record(&self, op: &'static str) {
        self.inner.ops.lock().unwrap().push((self.addr.to_string(), op));
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn execute(&self, cmd: Command) -> Result<Reply, ClientError> {
        match cmd {
            Command::Ping => {
                self.record("ping");
                Ok(Reply::Pong)
            }
            Command::Get { key } => {
                self.check_route(&key)?;
                self.record("get");
                Ok(Reply::Value(self.inner.store.lock().unwrap().get(&key).cloned()))
            }
            Command::Set { key, value, .. } => {
                self.check_route(&key)?;
                self.record("set");
                self.inner.store.lock().unwrap().insert(key, value);
                Ok(Reply::Ok)
            }
            Command::Del { keys } => {
                for key in &keys {
                    self.check_route(key)?;
                }
                self.record("del");
                let mut store = self.inner.store.lock().unwrap();
                let removed = keys.iter().filter(|k| store.remove(*k).is_some()).count();
                Ok(Reply::Int(removed as i64))
            }
            Command::Exists { key } => {
                self.check_route(&key)?;
                self.record("exists");
                let present = self.inner.store.lock().unwrap().contains_key(&key);
                Ok(Reply::Int(present as i64))
            }
        }
    }

    async fn execute_pipeline(&self, cmds: Vec<Command>) -> Result<Vec<Reply>, ClientError> {
        let mut replies = Vec::with_capacity(cmds.len());
        for cmd in cmds {
            replies.push(self.execute(cmd).await?);
        }
        Ok(replies)
    }
}
