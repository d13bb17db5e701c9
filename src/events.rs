// Event ingestion: runtime lifecycle notifications applied to the registry.
// Each notification runs as its own task and takes the registry lock first.

use futures_util::StreamExt;
use regex::Regex;
use std::future::poll_fn;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::persistence::{self, Persister};
use crate::registry::SharedRegistry;
use crate::runtime::{ContainerRuntime, ContainerSummary, EventStatus, EventStream, LifecycleEvent};

/// Containers whose display name matches are never tracked.
#[derive(Debug, Clone, Default)]
pub struct SkipFilter(Option<Regex>);

impl SkipFilter {
    /// An empty pattern disables filtering.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        if pattern.is_empty() {
            return Ok(Self(None));
        }
        Ok(Self(Some(Regex::new(pattern)?)))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.0.as_ref().is_some_and(|re| re.is_match(name))
    }

    pub fn matches_any<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        names.into_iter().any(|n| self.matches(n))
    }
}

#[derive(Clone)]
pub struct EventHandler {
    registry: SharedRegistry,
    runtime: Arc<dyn ContainerRuntime>,
    persister: Arc<dyn Persister>,
    skip: Arc<SkipFilter>,
}

impl EventHandler {
    pub fn new(
        registry: SharedRegistry,
        runtime: Arc<dyn ContainerRuntime>,
        persister: Arc<dyn Persister>,
        skip: SkipFilter,
    ) -> Self {
        Self {
            registry,
            runtime,
            persister,
            skip: Arc::new(skip),
        }
    }

    pub async fn handle(&self, event: LifecycleEvent) {
        debug!(?event, "event received");
        let id = event.container_id.as_str();
        let mut registry = self.registry.lock().await;
        match event.status {
            EventStatus::Create => {}
            EventStatus::Start => {
                let info = match self.runtime.inspect(id).await {
                    Ok(info) => info,
                    Err(e) => {
                        warn!(container_id = %id, error = %e, "inspect failed; start event dropped");
                        return;
                    }
                };
                if self.skip.matches(&info.name) {
                    debug!(container_id = %id, container = %info.name, "container skipped by pattern");
                    return;
                }
                if let Err(e) = registry.activate(id, info.pid).await {
                    warn!(container_id = %id, error = %e, "activation failed; start event dropped");
                    return;
                }
                info!(container_id = %id, container = %info.name, pid = info.pid, "container added to audit");
                persistence::update_or_log(self.persister.as_ref(), registry.node()).await;
            }
            EventStatus::Stop => {
                if registry.deactivate(id) {
                    info!(container_id = %id, "container paused from audit");
                    persistence::update_or_log(self.persister.as_ref(), registry.node()).await;
                }
            }
            EventStatus::Destroy | EventStatus::Die => {
                if let Some(removed) = registry.find_index(id).and_then(|i| registry.remove(i)) {
                    info!(container_id = %id, container = %removed.name, "container removed from audit");
                    persistence::update_or_log(self.persister.as_ref(), registry.node()).await;
                }
            }
        }
    }

    /// Startup enumeration: tracks every running container not matched by the
    /// skip pattern and not already tracked. Returns how many were added.
    /// Per-container failures are logged and skipped.
    pub async fn enroll(&self, running: Vec<ContainerSummary>) -> usize {
        let mut enrolled = 0;
        for summary in running {
            if self.skip.matches_any(summary.names.iter().map(String::as_str)) {
                debug!(container_id = %summary.id, names = ?summary.names, "container skipped by pattern");
                continue;
            }
            let mut registry = self.registry.lock().await;
            if registry.find_index(&summary.id).is_some() {
                debug!(container_id = %summary.id, "container already tracked");
                continue;
            }
            match registry.create(&summary.id).await {
                Ok(()) => {
                    enrolled += 1;
                    persistence::update_or_log(self.persister.as_ref(), registry.node()).await;
                }
                Err(e) => warn!(container_id = %summary.id, error = %e, "could not track running container"),
            }
        }
        enrolled
    }
}

/// Dispatches every notification to its own task. Resolves once the stream
/// has been polled, so the runtime subscription is open before the caller
/// enumerates running containers. The returned task finishes once the stream
/// ends and all dispatched tasks have finished.
pub async fn spawn_listener(
    mut events: EventStream,
    handler: EventHandler,
) -> tokio::task::JoinHandle<()> {
    let (subscribed_tx, subscribed_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let mut subscribed_tx = Some(subscribed_tx);
        let mut tasks = JoinSet::new();
        loop {
            let item = poll_fn(|cx| {
                let polled = events.poll_next_unpin(cx);
                if let Some(tx) = subscribed_tx.take() {
                    let _ = tx.send(());
                }
                polled
            })
            .await;
            let Some(item) = item else {
                break;
            };
            match item {
                Ok(event) => {
                    let handler = handler.clone();
                    tasks.spawn(async move { handler.handle(event).await });
                }
                Err(e) => error!(error = %e, "runtime event stream error"),
            }
            while tasks.try_join_next().is_some() {}
        }
        info!("runtime event stream ended");
        while tasks.join_next().await.is_some() {}
    });
    // an error means the task is already gone; the handle reports why
    let _ = subscribed_rx.await;
    handle
}
