//! Per-address node-client cache.
//!
//! One connected client per physical address, created lazily on first use
//! and reused until [`ClientCache::invalidate_all`]. Creation is
//! single-flighted per address: two dispatch tasks racing on the same cold
//! address share one connect instead of opening duplicate connections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::seq::SliceRandom;
use tokio::sync::OnceCell;
use tracing::debug;

use slotwise_client::{Address, ClientError, Command, Connector, NodeClient, Reply};

use crate::error::{Error, Result};
use crate::topology::{Node, NodeGroup};

type ClientCell = Arc<OnceCell<Arc<dyn NodeClient>>>;

pub struct ClientCache {
    connector: Arc<dyn Connector>,
    /// When set, read-mode selection never considers the master.
    replica_reads_exclusive: bool,
    clients: Mutex<HashMap<Address, ClientCell>>,
}

impl ClientCache {
    pub fn new(connector: Arc<dyn Connector>, replica_reads_exclusive: bool) -> Self {
        Self { connector, replica_reads_exclusive, clients: Mutex::new(HashMap::new()) }
    }

    /// Pick a node from `group` per the access mode and return its client.
    ///
    /// Writes always target the master. Reads pick uniformly at random among
    /// the replicas, plus the master unless replica reads are exclusive.
    pub async fn get(&self, group: &NodeGroup, for_write: bool) -> Result<Arc<dyn NodeClient>> {
        let node = self.select_node(group, for_write)?;
        self.client_for(&node.addr).await
    }

    fn select_node<'a>(&self, group: &'a NodeGroup, for_write: bool) -> Result<&'a Node> {
        if for_write {
            return Ok(&group.master);
        }
        let mut candidates: Vec<&Node> = group.replicas.iter().collect();
        if !self.replica_reads_exclusive {
            candidates.push(&group.master);
        }
        candidates
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or_else(|| Error::NoNodeAvailable { master_id: group.master.id.clone() })
    }

    /// Get-or-create the client for one address.
    ///
    /// The first caller connects and health-checks the node with a ping;
    /// a failure surfaces as a connect error and is not cached, so the next
    /// caller retries from scratch. Later callers reuse the cached client
    /// without re-checking liveness.
    pub async fn client_for(&self, addr: &Address) -> Result<Arc<dyn NodeClient>> {
        let cell = {
            let mut clients = self.clients.lock().expect("client cache lock poisoned");
            clients.entry(addr.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let client = cell
            .get_or_try_init(|| async {
                debug!(%addr, "opening node client");
                let client = self.connector.connect(addr).await.map_err(Error::Client)?;
                match client.execute(Command::Ping).await {
                    Ok(Reply::Pong) => Ok(client),
                    Ok(other) => Err(Error::Client(ClientError::Connect {
                        addr: addr.to_string(),
                        reason: format!("unexpected ping reply: {other:?}"),
                    })),
                    Err(e) => Err(Error::Client(ClientError::Connect {
                        addr: addr.to_string(),
                        reason: format!("ping failed: {e}"),
                    })),
                }
            })
            .await?;
        Ok(client.clone())
    }

    /// Drop every cached entry. In-flight operations keep their handles
    /// through their own `Arc`s; only future reuse stops.
    pub fn invalidate_all(&self) {
        self.clients.lock().expect("client cache lock poisoned").clear();
    }

    #[cfg(test)]
    fn cached_len(&self) -> usize {
        self.clients.lock().unwrap().len()
    }
}
