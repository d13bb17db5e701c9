use anyhow::Result;
use netcollector::config::AppConfig;
use netcollector::events::{self, EventHandler, SkipFilter};
use netcollector::registry::Registry;
use netcollector::runtime::{self, ContainerRuntime, DockerRuntime};
use netcollector::sampler::{self, SamplerConfig, SamplerDeps};
use netcollector::{gateway, persistence, version};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();
    tracing::info!(name = version::NAME, version = version::VERSION, "starting");

    let app_config = AppConfig::load()?;
    let skip = SkipFilter::new(&app_config.collector.skip_pattern)?;

    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerRuntime::connect()?);
    runtime::wait_until_reachable(
        runtime.as_ref(),
        app_config.runtime.connect_attempts,
        Duration::from_millis(app_config.runtime.initial_backoff_ms),
    )
    .await?;

    let persister = persistence::connect(&app_config.persistence).await?;
    let gateway = gateway::from_config(&app_config.gateway);

    let node_name = sysinfo::System::host_name().unwrap_or_else(|| {
        tracing::warn!("could not resolve host name; node name left empty");
        String::new()
    });
    let registry = Registry::new(node_name, runtime.clone(), gateway).into_shared();
    let handler = EventHandler::new(registry.clone(), runtime.clone(), persister.clone(), skip);

    // subscribe first: a container started during enumeration still shows up as an event
    let listener_handle = events::spawn_listener(runtime.events(), handler.clone()).await;
    let running = runtime.list_running().await?;
    let enrolled = handler.enroll(running).await;
    tracing::info!(containers = enrolled, "collector has started");

    sampler::startup_pass(&registry, persister.as_ref()).await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let sampler_handle = sampler::spawn(
        SamplerDeps {
            registry: registry.clone(),
            persister: persister.clone(),
            shutdown_rx,
        },
        SamplerConfig {
            refresh_interval: Duration::from_secs(app_config.collector.refresh_interval_secs),
        },
    );

    if sampler::run_until(sampler_handle, shutdown_tx, shutdown_signal()).await {
        tracing::info!("Sampler stopped");
    }
    listener_handle.abort();
    persister.close().await;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
