// Docker runtime via bollard

use async_trait::async_trait;
use bollard::Docker;
use bollard::models::EventMessage;
use bollard::query_parameters::{EventsOptions, InspectContainerOptions, ListContainersOptions};
use futures_util::StreamExt;
use std::collections::HashMap;
use tracing::{debug, instrument};

use super::{
    ContainerInfo, ContainerRuntime, ContainerSummary, EventStream, LifecycleEvent, Result,
    RuntimeError, normalize_name, pid_from_runtime,
};

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Honors DOCKER_HOST, falling back to the local unix socket.
    pub fn connect() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_defaults()?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<()> {
        self.docker.ping().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(runtime = "docker", operation = "inspect"))]
    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo> {
        let resp = match self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
        {
            Ok(r) => r,
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => return Err(RuntimeError::NotFound(container_id.to_string())),
            Err(e) => return Err(e.into()),
        };
        let pid = pid_from_runtime(resp.state.as_ref().and_then(|s| s.pid));
        let name = resp
            .name
            .as_deref()
            .map(normalize_name)
            .unwrap_or(container_id)
            .to_string();
        Ok(ContainerInfo { pid, name })
    }

    #[instrument(skip(self), fields(runtime = "docker", operation = "list_running"))]
    async fn list_running(&self) -> Result<Vec<ContainerSummary>> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);

        let filter = ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(filter)).await?;
        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id.filter(|id| !id.is_empty())?;
                let names = c
                    .names
                    .unwrap_or_default()
                    .iter()
                    .map(|n| normalize_name(n).to_string())
                    .collect();
                Some(ContainerSummary { id, names })
            })
            .collect())
    }

    fn events(&self) -> EventStream {
        let mut filters = HashMap::new();
        filters.insert("type".to_string(), vec!["container".to_string()]);
        let options = EventsOptions {
            filters: Some(filters),
            ..Default::default()
        };
        self.docker
            .events(Some(options))
            .filter_map(|res| async move {
                match res {
                    Ok(msg) => {
                        let event = lifecycle_event(&msg);
                        if event.is_none() {
                            debug!(action = ?msg.action, "ignoring runtime event");
                        }
                        event.map(Ok)
                    }
                    Err(e) => Some(Err(RuntimeError::from(e))),
                }
            })
            .boxed()
    }
}

fn lifecycle_event(msg: &EventMessage) -> Option<LifecycleEvent> {
    LifecycleEvent::from_parts(
        msg.action.as_deref(),
        msg.actor.as_ref().and_then(|a| a.id.as_deref()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::EventStatus;
    use bollard::models::EventActor;

    #[test]
    fn lifecycle_event_reads_action_and_actor_id() {
        let msg = EventMessage {
            action: Some("die".to_string()),
            actor: Some(EventActor {
                id: Some("abc123".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            lifecycle_event(&msg),
            Some(LifecycleEvent::new(EventStatus::Die, "abc123"))
        );
    }

    #[test]
    fn lifecycle_event_without_actor_is_dropped() {
        let msg = EventMessage {
            action: Some("start".to_string()),
            ..Default::default()
        };
        assert_eq!(lifecycle_event(&msg), None);
    }
}
