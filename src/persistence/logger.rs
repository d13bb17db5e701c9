// Log driver: emits documents through tracing. Never fails.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{NodeDocument, Persister, Result, stat_documents};
use crate::models::Node;

pub struct LogPersister;

#[async_trait]
impl Persister for LogPersister {
    async fn update_node(&self, node: &Node) -> Result<()> {
        for doc in stat_documents(node) {
            info!(
                target: "netcollector::stats",
                container_id = %doc.container_docker_id,
                container = %doc.container_name,
                interface = %doc.network_interface_name,
                counter = %doc.name,
                value = doc.value,
                "stat"
            );
        }
        Ok(())
    }

    async fn create_node(&self, node: &Node) -> Result<()> {
        let doc = NodeDocument::from(node);
        info!(
            node = %doc.name,
            created_at = %doc.created_at,
            containers = node.containers.len(),
            "node registered"
        );
        Ok(())
    }

    async fn create_cluster(&self) -> Result<()> {
        debug!("log driver has nothing to provision");
        Ok(())
    }

    async fn close(&self) {}
}
