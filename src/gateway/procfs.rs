// Direct reads through /proc/<pid>/root: same view as the container, no process spawn.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::{CounterSource, GatewayError, Result, bounded, net_class_dir, pid_root, statistics_dir};

pub struct ProcfsGateway {
    proc_root: PathBuf,
    timeout: Duration,
}

impl ProcfsGateway {
    pub fn new(proc_root: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            proc_root: proc_root.as_ref().to_path_buf(),
            timeout,
        }
    }
}

#[async_trait]
impl CounterSource for ProcfsGateway {
    async fn list_interfaces(&self, pid: u32) -> Result<Vec<String>> {
        let dir = net_class_dir(&self.proc_root, pid);
        let root = pid_root(&self.proc_root, pid);
        bounded(self.timeout, async move {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    // process is alive but has no sysfs net class mounted
                    if tokio::fs::try_exists(&root).await.unwrap_or(false) {
                        return Err(GatewayError::Unsupported { pid });
                    }
                    return Err(GatewayError::io(&dir, e));
                }
                Err(e) => return Err(GatewayError::io(&dir, e)),
            };
            let mut names = Vec::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| GatewayError::io(&dir, e))?
            {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
            names.sort();
            debug!(pid, interfaces = ?names, "listed interfaces");
            Ok(names)
        })
        .await
    }

    async fn read_counter(&self, pid: u32, interface: &str, counter: &str) -> Result<String> {
        let path = statistics_dir(&self.proc_root, pid, interface).join(counter);
        bounded(self.timeout, async move {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| GatewayError::io(&path, e))?;
            let value = raw.trim_end_matches('\n');
            if value.is_empty() {
                return Err(GatewayError::Empty);
            }
            Ok(value.to_string())
        })
        .await
    }
}
