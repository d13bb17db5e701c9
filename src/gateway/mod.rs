// Counter-Read Gateway: namespace-scoped reads of /sys/class/net as a container sees it.
// Stateless and read-only; callers decide how failures degrade.

mod error;
mod exec;
mod procfs;

pub use error::{GatewayError, Result};
pub use exec::ExecGateway;
pub use procfs::ProcfsGateway;

use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{GatewayConfig, GatewayMode};

const NET_CLASS_DIR: &str = "sys/class/net";
const STATISTICS_DIR: &str = "statistics";

#[async_trait]
pub trait CounterSource: Send + Sync {
    /// Interface names visible inside the network namespace of `pid`, sorted.
    /// `GatewayError::Unsupported` means the listing mechanism itself is missing,
    /// which is distinct from an empty listing.
    async fn list_interfaces(&self, pid: u32) -> Result<Vec<String>>;

    /// Raw text of one statistics file, trailing newline stripped.
    async fn read_counter(&self, pid: u32, interface: &str, counter: &str) -> Result<String>;

    /// Reads several counters of one interface; one result per requested name, in order.
    async fn read_counters(
        &self,
        pid: u32,
        interface: &str,
        counters: &[&str],
    ) -> Vec<Result<String>> {
        let mut out = Vec::with_capacity(counters.len());
        for counter in counters {
            out.push(self.read_counter(pid, interface, counter).await);
        }
        out
    }
}

pub fn from_config(config: &GatewayConfig) -> Arc<dyn CounterSource> {
    let timeout = Duration::from_millis(config.read_timeout_ms);
    match config.mode {
        GatewayMode::Procfs => Arc::new(ProcfsGateway::new(&config.proc_root, timeout)),
        GatewayMode::Exec => Arc::new(ExecGateway::new(&config.proc_root, timeout)),
    }
}

fn pid_root(proc_root: &Path, pid: u32) -> PathBuf {
    proc_root.join(pid.to_string()).join("root")
}

fn net_class_dir(proc_root: &Path, pid: u32) -> PathBuf {
    pid_root(proc_root, pid).join(NET_CLASS_DIR)
}

fn statistics_dir(proc_root: &Path, pid: u32, interface: &str) -> PathBuf {
    net_class_dir(proc_root, pid)
        .join(interface)
        .join(STATISTICS_DIR)
}

async fn bounded<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| GatewayError::Timeout(limit))?
}
