// Container runtime collaborator: inspection, enumeration and lifecycle events.

mod docker;

pub use docker::DockerRuntime;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("container {0} is unknown to the runtime")]
    NotFound(String),
    #[error("docker api: {0}")]
    Api(#[from] bollard::errors::Error),
    #[error("container runtime unreachable after {attempts} attempts")]
    Unreachable { attempts: u32 },
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// What the registry needs to know about one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub pid: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Create,
    Start,
    Stop,
    Destroy,
    Die,
}

impl EventStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(EventStatus::Create),
            "start" => Some(EventStatus::Start),
            "stop" => Some(EventStatus::Stop),
            "destroy" => Some(EventStatus::Destroy),
            "die" => Some(EventStatus::Die),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub status: EventStatus,
    pub container_id: String,
}

impl LifecycleEvent {
    pub fn new(status: EventStatus, container_id: impl Into<String>) -> Self {
        Self {
            status,
            container_id: container_id.into(),
        }
    }

    /// Builds an event from loosely typed runtime fields; `None` when either
    /// part is missing, empty or not a tracked lifecycle status.
    pub fn from_parts(status: Option<&str>, container_id: Option<&str>) -> Option<Self> {
        let status = EventStatus::parse(status?)?;
        let id = container_id.filter(|id| !id.is_empty())?;
        Some(Self::new(status, id))
    }
}

pub type EventStream = BoxStream<'static, Result<LifecycleEvent>>;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Fails with `RuntimeError::NotFound` when the ID is unknown.
    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo>;

    async fn list_running(&self) -> Result<Vec<ContainerSummary>>;

    /// Lifecycle notifications from now on. Malformed notifications are dropped.
    fn events(&self) -> EventStream;
}

/// Docker reports names with a leading '/'.
pub fn normalize_name(name: &str) -> &str {
    name.trim_start_matches('/')
}

/// Host PID as stored on a container: the runtime value when positive, 0 otherwise.
pub fn pid_from_runtime(raw: Option<i64>) -> u32 {
    match raw {
        Some(pid) if pid > 0 => u32::try_from(pid).unwrap_or(0),
        _ => 0,
    }
}

/// Pings the runtime up to `attempts` times, doubling the wait after each failure.
pub async fn wait_until_reachable(
    runtime: &dyn ContainerRuntime,
    attempts: u32,
    initial_backoff: Duration,
) -> Result<()> {
    let mut wait = initial_backoff;
    for attempt in 1..=attempts {
        info!(attempt, "checking container runtime");
        match runtime.ping().await {
            Ok(()) => {
                info!(attempt, "container runtime reachable");
                return Ok(());
            }
            Err(e) => warn!(attempt, error = %e, "container runtime not reachable"),
        }
        if attempt < attempts {
            tokio::time::sleep(wait).await;
            wait = wait.saturating_mul(2);
        }
    }
    Err(RuntimeError::Unreachable { attempts })
}
