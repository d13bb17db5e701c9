// Persistence collaborator: receives Node snapshots after every mutation.
// Delivery is best-effort; a failed call is logged by the caller and not retried.

mod documents;
mod logger;
mod logstash;

pub use documents::{NodeDocument, StatDocument, stat_documents};
pub use logger::LogPersister;
pub use logstash::LogstashPersister;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{PersistenceConfig, PersistenceDriver};
use crate::models::Node;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("connecting to {addr} failed after {attempts} attempts: {source}")]
    Connect {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("encoding document: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PersistError>;

#[async_trait]
pub trait Persister: Send + Sync {
    /// Pushes the full current snapshot, computed deltas included.
    async fn update_node(&self, node: &Node) -> Result<()>;

    /// One-time registration of the node, after the startup discard pass.
    async fn create_node(&self, node: &Node) -> Result<()>;

    /// One-time provisioning, before `create_node`.
    async fn create_cluster(&self) -> Result<()>;

    async fn close(&self);
}

/// Builds the configured driver. Connection failures are startup-fatal.
pub async fn connect(config: &PersistenceConfig) -> Result<Arc<dyn Persister>> {
    match config.driver {
        PersistenceDriver::Logstash => {
            Ok(Arc::new(LogstashPersister::connect(&config.logstash).await?))
        }
        PersistenceDriver::Log => Ok(Arc::new(LogPersister)),
    }
}

/// Hands the snapshot to persistence, logging a failure instead of propagating it.
pub async fn update_or_log(persister: &dyn Persister, node: &Node) {
    if let Err(e) = persister.update_node(node).await {
        tracing::error!(
            node = %node.name,
            error = %e,
            operation = "update_node",
            "Error while updating node"
        );
    }
}
