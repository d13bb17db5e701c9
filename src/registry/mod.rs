// Container registry: the Node tree and every lifecycle mutation on it.
// Callers hold the shared lock for the whole operation, persistence included.

pub(crate) mod discovery;

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::gateway::{CounterSource, GatewayError};
use crate::models::{Container, Node};
use crate::runtime::{ContainerRuntime, RuntimeError};

/// The one lock shared by event tasks and the sampling loop.
pub type SharedRegistry = Arc<Mutex<Registry>>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("inspecting container {id}: {source}")]
    Runtime {
        id: String,
        #[source]
        source: RuntimeError,
    },
    #[error("discovering interfaces of container {id}: {source}")]
    Discovery {
        id: String,
        #[source]
        source: GatewayError,
    },
}

pub struct Registry {
    node: Node,
    runtime: Arc<dyn ContainerRuntime>,
    gateway: Arc<dyn CounterSource>,
}

impl Registry {
    pub fn new(
        node_name: impl Into<String>,
        runtime: Arc<dyn ContainerRuntime>,
        gateway: Arc<dyn CounterSource>,
    ) -> Self {
        Self {
            node: Node::new(node_name),
            runtime,
            gateway,
        }
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub(crate) fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    pub(crate) fn gateway(&self) -> Arc<dyn CounterSource> {
        self.gateway.clone()
    }

    pub fn find_index(&self, docker_id: &str) -> Option<usize> {
        self.node.find_index(docker_id)
    }

    /// Starts tracking a container: inspects it, discovers its interfaces and
    /// appends it as active. Nothing is added on failure. A no-op when the ID
    /// is already tracked.
    #[instrument(skip(self), fields(operation = "create"))]
    pub async fn create(&mut self, docker_id: &str) -> Result<(), RegistryError> {
        if self.find_index(docker_id).is_some() {
            debug!("container already tracked");
            return Ok(());
        }
        let info = self
            .runtime
            .inspect(docker_id)
            .await
            .map_err(|source| RegistryError::Runtime {
                id: docker_id.to_string(),
                source,
            })?;
        let interfaces = discovery::discover(self.gateway.as_ref(), info.pid)
            .await
            .map_err(|source| RegistryError::Discovery {
                id: docker_id.to_string(),
                source,
            })?;
        let container = Container::new(
            docker_id,
            info.pid,
            info.name,
            self.node.name.clone(),
            interfaces,
        );
        self.node.containers.push(container);
        self.node.touch();
        Ok(())
    }

    /// Marks a known container active under its new PID after reconciling its
    /// interfaces; unknown IDs go through `create`. On discovery failure the
    /// container is left as it was.
    #[instrument(skip(self), fields(operation = "activate"))]
    pub async fn activate(&mut self, docker_id: &str, pid: u32) -> Result<(), RegistryError> {
        let Some(i) = self.find_index(docker_id) else {
            return self.create(docker_id).await;
        };
        let candidates = discovery::discover(self.gateway.as_ref(), pid)
            .await
            .map_err(|source| RegistryError::Discovery {
                id: docker_id.to_string(),
                source,
            })?;
        let container = &mut self.node.containers[i];
        discovery::merge(container, candidates);
        // counters restart with the new process
        container.request_baseline();
        container.is_active = true;
        container.pid = pid;
        self.node.touch();
        Ok(())
    }

    /// Returns whether anything changed: false for unknown or already inactive IDs.
    pub fn deactivate(&mut self, docker_id: &str) -> bool {
        let Some(i) = self.find_index(docker_id) else {
            return false;
        };
        let container = &mut self.node.containers[i];
        if !container.is_active {
            return false;
        }
        container.is_active = false;
        container.updated_at = chrono::Utc::now();
        self.node.touch();
        true
    }

    /// Removes the container at `index`, keeping the order of the others.
    pub fn remove(&mut self, index: usize) -> Option<Container> {
        if index >= self.node.containers.len() {
            return None;
        }
        let removed = self.node.containers.remove(index);
        self.node.touch();
        Some(removed)
    }

    pub fn active_count(&self) -> usize {
        self.node.active_count()
    }
}
