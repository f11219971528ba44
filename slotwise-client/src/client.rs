//! Client, connector and probe traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Address, ClientError, Command, Reply};

/// A connected client for one store node.
///
/// Implementations own their transport and must be safe to share across
/// concurrent dispatch tasks (the router caches one client per address).
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Execute a single command.
    async fn execute(&self, cmd: Command) -> Result<Reply, ClientError>;

    /// Execute a batch of commands in order, returning one reply per command.
    ///
    /// A redirect for any queued command fails the whole batch with that
    /// redirect so the router can refresh and re-dispatch the bucket.
    async fn execute_pipeline(&self, cmds: Vec<Command>) -> Result<Vec<Reply>, ClientError>;
}

/// Batch builder over a [`NodeClient`].
///
/// # Example
///
/// ```ignore
/// let mut pipe = Pipeline::new(client.as_ref());
/// for key in keys {
///     pipe.queue(Command::Exists { key });
/// }
/// let replies = pipe.exec().await?;
/// ```
pub struct Pipeline<'a> {
    client: &'a dyn NodeClient,
    queued: Vec<Command>,
}

impl<'a> Pipeline<'a> {
    pub fn new(client: &'a dyn NodeClient) -> Self {
        Self { client, queued: Vec::new() }
    }

    /// Queue one command; commands execute in queue order.
    pub fn queue(&mut self, cmd: Command) -> &mut Self {
        self.queued.push(cmd);
        self
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Flush the batch and collect one reply per queued command.
    pub async fn exec(self) -> Result<Vec<Reply>, ClientError> {
        if self.queued.is_empty() {
            return Ok(Vec::new());
        }
        self.client.execute_pipeline(self.queued).await
    }
}

/// Opens node clients. One implementation per transport flavor.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, addr: &Address) -> Result<Arc<dyn NodeClient>, ClientError>;
}

/// Source of raw cluster-status text.
///
/// The two replies use the textual grammars the topology parser understands:
/// `key:value` lines for the status summary, one node description per line
/// for the node list.
#[async_trait]
pub trait ClusterProbe: Send + Sync {
    async fn cluster_status(&self) -> Result<String, ClientError>;
    async fn cluster_nodes(&self) -> Result<String, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the batches it receives, answers every command with `Ok`.
    struct RecordingClient {
        batches: Mutex<Vec<Vec<Command>>>,
    }

    #[async_trait]
    impl NodeClient for RecordingClient {
        async fn execute(&self, cmd: Command) -> Result<Reply, ClientError> {
            self.batches.lock().unwrap().push(vec![cmd]);
            Ok(Reply::Ok)
        }

        async fn execute_pipeline(&self, cmds: Vec<Command>) -> Result<Vec<Reply>, ClientError> {
            let n = cmds.len();
            self.batches.lock().unwrap().push(cmds);
            Ok(vec![Reply::Ok; n])
        }
    }

    #[tokio::test]
    async fn test_pipeline_preserves_queue_order() {
        let client = RecordingClient { batches: Mutex::new(Vec::new()) };

        let mut pipe = Pipeline::new(&client);
        pipe.queue(Command::Exists { key: "a".into() });
        pipe.queue(Command::Exists { key: "b".into() });
        pipe.queue(Command::Exists { key: "c".into() });
        assert_eq!(pipe.len(), 3);

        let replies = pipe.exec().await.unwrap();
        assert_eq!(replies.len(), 3);

        let batches = client.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let keys: Vec<_> = batches[0]
            .iter()
            .map(|c| match c {
                Command::Exists { key } => key.clone(),
                other => panic!("unexpected command {other:?}"),
            })
            .collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_pipeline_skips_the_node() {
        let client = RecordingClient { batches: Mutex::new(Vec::new()) };
        let replies = Pipeline::new(&client).exec().await.unwrap();
        assert!(replies.is_empty());
        assert!(client.batches.lock().unwrap().is_empty());
    }
}
