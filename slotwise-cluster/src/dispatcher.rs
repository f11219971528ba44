//! Topology-aware dispatch of single- and multi-key operations.
//!
//! Multi-key calls are split into one bucket per owning master, fanned out
//! concurrently, and merged back into a single result. When a node signals
//! stale routing the dispatcher refreshes its topology snapshot and retries
//! the whole call, at most [`MAX_REFRESHES`] times.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use slotwise_client::{ClientError, ClusterProbe, Command, Connector, Pipeline, Reply};

use crate::cache::ClientCache;
use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use crate::pairs::KvPair;
use crate::slot::hash_slot_str;
use crate::topology::Topology;

/// Upper bound on topology refreshes within one top-level call.
const MAX_REFRESHES: usize = 3;

/// Routing front end over a sharded cluster.
///
/// Holds an immutable topology snapshot behind a lock; every operation
/// routes against the snapshot current at its attempt, and refreshes swap
/// in a whole new snapshot rather than patching the old one in place.
pub struct ClusterClient {
    probe: Arc<dyn ClusterProbe>,
    cache: Arc<ClientCache>,
    topology: RwLock<Arc<Topology>>,
    config: ClusterConfig,
}

impl ClusterClient {
    /// Load the initial topology and build a client.
    pub async fn connect(
        probe: Arc<dyn ClusterProbe>,
        connector: Arc<dyn Connector>,
        config: ClusterConfig,
    ) -> Result<Self> {
        let topology = Self::fetch_topology(probe.as_ref()).await?;
        info!(groups = topology.len(), "cluster topology loaded");
        Ok(Self {
            probe,
            cache: Arc::new(ClientCache::new(connector, config.replica_reads_exclusive)),
            topology: RwLock::new(Arc::new(topology)),
            config,
        })
    }

    /// Re-fetch and swap the topology snapshot.
    ///
    /// The fetch and parse happen outside the lock; readers keep routing
    /// against the old snapshot until the swap.
    pub async fn refresh(&self) -> Result<()> {
        let topology = Self::fetch_topology(self.probe.as_ref()).await?;
        debug!(groups = topology.len(), "topology refreshed");
        *self.topology.write().expect("topology lock poisoned") = Arc::new(topology);
        Ok(())
    }

    /// The current topology snapshot.
    pub fn topology(&self) -> Arc<Topology> {
        self.topology.read().expect("topology lock poisoned").clone()
    }

    /// Drop all cached node connections; they re-open lazily on next use.
    pub fn invalidate_connections(&self) {
        self.cache.invalidate_all();
    }

    async fn fetch_topology(probe: &dyn ClusterProbe) -> Result<Topology> {
        let status = probe.cluster_status().await?;
        let nodes = probe.cluster_nodes().await?;
        Topology::parse(&status, &nodes)
    }

    /// Fetch one value; reads may be served by a replica.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let cmd = Command::Get { key: key.to_string() };
        let reply = self
            .with_deadline(self.retrying(|topo| self.dispatch_one(topo, key, cmd.clone(), false)))
            .await?;
        reply.into_value().ok_or_else(|| unexpected_reply("GET"))
    }

    /// Store one value on the owning master.
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let cmd = Command::Set { key: key.to_string(), value: value.to_string(), ttl };
        let reply = self
            .with_deadline(self.retrying(|topo| self.dispatch_one(topo, key, cmd.clone(), true)))
            .await?;
        if reply.is_ok() {
            Ok(())
        } else {
            Err(unexpected_reply("SET"))
        }
    }

    /// Delete keys across the cluster, returning how many existed.
    pub async fn del(&self, keys: &[String]) -> Result<i64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.with_deadline(self.retrying(|topo| self.dispatch_del(topo, keys))).await
    }

    /// Count how many of `keys` exist.
    pub async fn exists(&self, keys: &[String]) -> Result<i64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.with_deadline(self.retrying(|topo| self.dispatch_exists(topo, keys))).await
    }

    /// Store many pairs, each on its owning master, all with the same
    /// optional time-to-live.
    ///
    /// Not atomic across groups: a failing bucket leaves other buckets'
    /// writes in place.
    pub async fn mset(&self, pairs: &[KvPair], ttl: Option<Duration>) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        self.with_deadline(self.retrying(|topo| self.dispatch_mset(topo, pairs, ttl))).await
    }

    /// Fetch many values, returned in the caller's key order with `None`
    /// for absent keys.
    pub async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.with_deadline(self.retrying(|topo| self.dispatch_mget(topo, keys))).await
    }

    /// Run one attempt per topology snapshot, refreshing on stale-routing
    /// failures until the bound is hit.
    async fn retrying<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut(Arc<Topology>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut refreshes = 0;
        loop {
            match attempt(self.topology()).await {
                Err(e) if e.is_stale_routing() => {
                    if refreshes == MAX_REFRESHES {
                        return Err(Error::ExhaustedRetries { refreshes, source: Box::new(e) });
                    }
                    refreshes += 1;
                    debug!(refreshes, "stale routing, refreshing topology");
                    self.refresh().await?;
                }
                other => return other,
            }
        }
    }

    async fn with_deadline<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.config.op_timeout() {
            Some(deadline) => {
                tokio::time::timeout(deadline, fut).await.map_err(|_| Error::Timeout)?
            }
            None => fut.await,
        }
    }

    async fn dispatch_one(
        &self,
        topo: Arc<Topology>,
        key: &str,
        cmd: Command,
        for_write: bool,
    ) -> Result<Reply> {
        let slot = hash_slot_str(key);
        let group = topo.group_for_slot(slot).ok_or(Error::NodeNotFound { slot })?;
        let client = self.cache.get(group, for_write).await?;
        Ok(client.execute(cmd).await?)
    }

    async fn dispatch_del(&self, topo: Arc<Topology>, keys: &[String]) -> Result<i64> {
        let mut tasks = JoinSet::new();
        for (master_id, bucket) in bucket_keys(&topo, keys) {
            let Some(group) = topo.group(&master_id).cloned() else { continue };
            let cache = self.cache.clone();
            tasks.spawn(async move {
                let client = cache.get(&group, true).await?;
                let reply = client.execute(Command::Del { keys: bucket }).await?;
                int_reply(reply)
            });
        }

        let mut total = 0;
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match flatten_join(joined) {
                Ok(n) => total += n,
                Err(e) => remember_failure(e, &mut failure),
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }

    async fn dispatch_exists(&self, topo: Arc<Topology>, keys: &[String]) -> Result<i64> {
        // A single key needs no fan-out machinery.
        if let [key] = keys {
            let slot = hash_slot_str(key);
            let Some(group) = topo.group_for_slot(slot) else {
                warn!(key = %key, slot, "no owner for slot, counting key as absent");
                return Ok(0);
            };
            let client = self.cache.get(group, true).await?;
            let reply = client.execute(Command::Exists { key: key.clone() }).await?;
            return int_reply(reply);
        }

        let mut tasks = JoinSet::new();
        for (master_id, bucket) in bucket_keys(&topo, keys) {
            let Some(group) = topo.group(&master_id).cloned() else { continue };
            let cache = self.cache.clone();
            tasks.spawn(async move {
                let client = cache.get(&group, true).await?;
                let mut pipe = Pipeline::new(client.as_ref());
                for key in bucket {
                    pipe.queue(Command::Exists { key });
                }
                let mut found = 0;
                for reply in pipe.exec().await? {
                    found += int_reply(reply)?;
                }
                Ok(found)
            });
        }

        let mut total = 0;
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match flatten_join(joined) {
                Ok(n) => total += n,
                Err(e) => remember_failure(e, &mut failure),
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }

    async fn dispatch_mset(
        &self,
        topo: Arc<Topology>,
        pairs: &[KvPair],
        ttl: Option<Duration>,
    ) -> Result<()> {
        let mut buckets: HashMap<String, Vec<KvPair>> = HashMap::new();
        for pair in pairs {
            let slot = hash_slot_str(&pair.key);
            match topo.group_for_slot(slot) {
                Some(group) => {
                    buckets.entry(group.master.id.clone()).or_default().push(pair.clone());
                }
                None => warn!(key = %pair.key, slot, "no owner for slot, skipping pair"),
            }
        }

        let mut tasks = JoinSet::new();
        for (master_id, bucket) in buckets {
            let Some(group) = topo.group(&master_id).cloned() else { continue };
            let cache = self.cache.clone();
            tasks.spawn(async move {
                let client = cache.get(&group, true).await?;
                let mut pipe = Pipeline::new(client.as_ref());
                for pair in bucket {
                    pipe.queue(Command::Set { key: pair.key, value: pair.value, ttl });
                }
                for reply in pipe.exec().await? {
                    if !reply.is_ok() {
                        return Err(unexpected_reply("SET"));
                    }
                }
                Ok(())
            });
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = flatten_join(joined) {
                remember_failure(e, &mut failure);
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn dispatch_mget(&self, topo: Arc<Topology>, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut tasks = JoinSet::new();
        for (master_id, bucket) in bucket_keys(&topo, keys) {
            let Some(group) = topo.group(&master_id).cloned() else { continue };
            let cache = self.cache.clone();
            tasks.spawn(async move {
                let client = cache.get(&group, true).await?;
                let mut pipe = Pipeline::new(client.as_ref());
                for key in &bucket {
                    pipe.queue(Command::Get { key: key.clone() });
                }
                let replies = pipe.exec().await?;
                let mut found = Vec::with_capacity(bucket.len());
                for (key, reply) in bucket.into_iter().zip(replies) {
                    let value = reply.into_value().ok_or_else(|| unexpected_reply("GET"))?;
                    found.push((key, value));
                }
                Ok(found)
            });
        }

        // Buckets finish in arbitrary order; merge by key, then lay the
        // values back out in the caller's order.
        let mut merged: HashMap<String, Option<String>> = HashMap::new();
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match flatten_join(joined) {
                Ok(found) => merged.extend(found),
                Err(e) => remember_failure(e, &mut failure),
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }
        Ok(keys.iter().map(|k| merged.get(k).cloned().flatten()).collect())
    }
}

/// Group keys by the id of the master owning their slot. Keys whose slot has
/// no owner are logged and dropped rather than failing the whole call.
fn bucket_keys(topo: &Topology, keys: &[String]) -> HashMap<String, Vec<String>> {
    let mut buckets: HashMap<String, Vec<String>> = HashMap::new();
    for key in keys {
        let slot = hash_slot_str(key);
        match topo.group_for_slot(slot) {
            Some(group) => buckets.entry(group.master.id.clone()).or_default().push(key.clone()),
            None => warn!(key = %key, slot, "no owner for slot, skipping key"),
        }
    }
    buckets
}

fn int_reply(reply: Reply) -> Result<i64> {
    reply
        .as_int()
        .ok_or_else(|| Error::Client(ClientError::Protocol(format!("non-integer reply: {reply:?}"))))
}

fn unexpected_reply(what: &str) -> Error {
    Error::Client(ClientError::Protocol(format!("unexpected {what} reply kind")))
}

fn flatten_join<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    joined.map_err(|e| Error::Client(ClientError::Protocol(format!("dispatch task failed: {e}"))))?
}

/// Record a bucket failure while the drain continues. A stale-routing error
/// displaces any other kind so the retry protocol gets to act on it.
fn remember_failure(err: Error, kept: &mut Option<Error>) {
    match kept {
        None => *kept = Some(err),
        Some(prev) if err.is_stale_routing() && !prev.is_stale_routing() => *kept = Some(err),
        _ => {}
    }
}
