// Sampling loop: reads every counter of every active interface of every active
// container, then runs the delta step. Holds the registry lock for the whole tick,
// persistence included.

use std::future::Future;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{Instrument, debug, error, warn};

use crate::persistence::{self, Persister};
use crate::registry::discovery;
use crate::registry::{Registry, SharedRegistry};

pub struct SamplerDeps {
    pub registry: SharedRegistry,
    pub persister: Arc<dyn Persister>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

pub struct SamplerConfig {
    pub refresh_interval: Duration,
}

/// Counts for one pass, used for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleReport {
    pub containers: usize,
    pub interfaces: usize,
    pub counters: usize,
    pub read_failures: usize,
    pub parse_failures: usize,
}

/// One sampling pass over the registry. A failed read counts as "0"; a value
/// that does not parse is skipped for this pass and keeps its previous delta.
pub async fn sample_once(registry: &mut Registry) -> SampleReport {
    let gateway = registry.gateway();
    let mut report = SampleReport::default();

    for container in registry
        .node_mut()
        .containers
        .iter_mut()
        .filter(|c| c.is_active)
    {
        discovery::refresh(gateway.as_ref(), container).await;
        report.containers += 1;
        let pid = container.pid;
        let docker_id = container.docker_id.clone();

        for iface in container.interfaces.iter_mut().filter(|i| i.is_active) {
            report.interfaces += 1;
            let names: Vec<String> = iface.stats.iter().map(|s| s.name.clone()).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let results = gateway.read_counters(pid, &iface.name, &refs).await;

            for (stat, result) in iface.stats.iter_mut().zip(results) {
                let raw = match result {
                    Ok(v) => v,
                    Err(e) => {
                        report.read_failures += 1;
                        warn!(
                            container_id = %docker_id,
                            interface = %iface.name,
                            counter = %stat.name,
                            error = %e,
                            "counter read failed; using 0"
                        );
                        "0".to_string()
                    }
                };
                match raw.trim().parse::<i64>() {
                    Ok(value) => {
                        stat.record(value);
                        report.counters += 1;
                        debug!(
                            container_id = %docker_id,
                            interface = %iface.name,
                            counter = %stat.name,
                            value,
                            "counter read"
                        );
                    }
                    Err(e) => {
                        report.parse_failures += 1;
                        error!(
                            container_id = %docker_id,
                            interface = %iface.name,
                            counter = %stat.name,
                            value = %raw,
                            error = %e,
                            "counter value is not an integer"
                        );
                    }
                }
            }
        }
    }

    let node = registry.node_mut();
    for container in &mut node.containers {
        container.apply_deltas();
    }
    node.touch();
    report
}

/// One steady-state tick: samples and persists, or does nothing when no
/// container is active.
pub async fn tick(registry: &SharedRegistry, persister: &dyn Persister) -> Option<SampleReport> {
    let mut registry = registry.lock().await;
    if registry.active_count() == 0 {
        return None;
    }
    let report = sample_once(&mut registry).await;
    persistence::update_or_log(persister, registry.node()).await;
    Some(report)
}

/// Startup: the discard pass that sets every baseline, then the one-time
/// provisioning calls.
pub async fn startup_pass(registry: &SharedRegistry, persister: &dyn Persister) -> SampleReport {
    let mut registry = registry.lock().await;
    let report = sample_once(&mut registry).await;
    debug!(?report, "discard pass complete");
    if let Err(e) = persister.create_cluster().await {
        error!(error = %e, operation = "create_cluster", "error while creating cluster");
    }
    if let Err(e) = persister.create_node(registry.node()).await {
        error!(error = %e, operation = "create_node", "error while creating node");
    }
    report
}

/// Runs a tick every `refresh_interval`, measured from the start of the previous
/// tick. A slow tick shortens the next wait to zero; ticks never overlap.
pub fn spawn(deps: SamplerDeps, config: SamplerConfig) -> tokio::task::JoinHandle<()> {
    let SamplerDeps {
        registry,
        persister,
        mut shutdown_rx,
    } = deps;
    let SamplerConfig { refresh_interval } = config;
    let span = tracing::span!(
        tracing::Level::DEBUG,
        "sampler",
        refresh_interval_secs = refresh_interval.as_secs()
    );

    tokio::spawn(
        async move {
            let mut wait = refresh_interval;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = &mut shutdown_rx => {
                        debug!("Sampler shutting down");
                        break;
                    }
                }
                let started = Instant::now();
                match tick(&registry, persister.as_ref()).await {
                    Some(report) => debug!(?report, "tick complete"),
                    None => debug!("no active containers; tick skipped"),
                }
                wait = refresh_interval.saturating_sub(started.elapsed());
            }
        }
        .instrument(span),
    )
}

/// Drives the sampler until `shutdown` resolves, then stops it and waits for
/// the last tick. Returns false, after logging, when the sampler task ended
/// on its own first.
pub async fn run_until(
    mut handle: tokio::task::JoinHandle<()>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    shutdown: impl Future<Output = ()>,
) -> bool {
    let ended = tokio::select! {
        _ = shutdown => None,
        res = &mut handle => Some(res),
    };
    match ended {
        None => {
            let _ = shutdown_tx.send(());
            if let Err(e) = handle.await {
                error!(error = %e, "sampler task failed during shutdown");
            }
            true
        }
        Some(Err(e)) => {
            error!(error = %e, "sampler task failed; sampling stopped");
            false
        }
        Some(Ok(())) => {
            error!("sampler task ended unexpectedly; sampling stopped");
            false
        }
    }
}
