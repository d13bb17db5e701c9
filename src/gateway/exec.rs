// Shell-out reads via /bin/sh. Kept for hosts where the agent cannot traverse
// /proc/<pid>/root directly; counters of one interface share a single invocation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{CounterSource, GatewayError, Result, bounded, net_class_dir, statistics_dir};

/// Output fragments meaning the listing tool itself is missing in the container.
const UNSUPPORTED_MARKERS: [&str; 2] = ["executable file not found", "command not found"];

/// Output fragments meaning the exec mechanism failed rather than the file being read.
const FAILURE_MARKERS: [&str; 4] = [
    "Cannot run exec command",
    "No such exec",
    "Failed",
    "invalid argument",
];

const SHELL: &str = "/bin/sh";

pub struct ExecGateway {
    proc_root: PathBuf,
    timeout: Duration,
}

struct ShellOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl ExecGateway {
    pub fn new(proc_root: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            proc_root: proc_root.as_ref().to_path_buf(),
            timeout,
        }
    }

    async fn run(&self, script: String) -> Result<ShellOutput> {
        debug!(script = %script, "executing");
        let mut cmd = Command::new(SHELL);
        cmd.arg("-c").arg(&script).kill_on_drop(true);
        let output = bounded(self.timeout, async move {
            cmd.output().await.map_err(|e| GatewayError::io(SHELL, e))
        })
        .await?;
        Ok(ShellOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl CounterSource for ExecGateway {
    async fn list_interfaces(&self, pid: u32) -> Result<Vec<String>> {
        let dir = net_class_dir(&self.proc_root, pid);
        let out = self.run(format!("ls {}", shell_quote(&dir))).await?;
        if UNSUPPORTED_MARKERS
            .iter()
            .any(|m| out.stdout.contains(m) || out.stderr.contains(m))
        {
            return Err(GatewayError::Unsupported { pid });
        }
        if !out.success {
            return Err(GatewayError::ExecFailed(out.stderr.trim().to_string()));
        }
        Ok(parse_listing(&out.stdout))
    }

    async fn read_counter(&self, pid: u32, interface: &str, counter: &str) -> Result<String> {
        let path = statistics_dir(&self.proc_root, pid, interface).join(counter);
        let out = self.run(format!("cat {}", shell_quote(&path))).await?;
        if !out.success {
            return Err(GatewayError::ExecFailed(out.stderr.trim().to_string()));
        }
        parse_counter(&out.stdout)
    }

    async fn read_counters(
        &self,
        pid: u32,
        interface: &str,
        counters: &[&str],
    ) -> Vec<Result<String>> {
        let dir = statistics_dir(&self.proc_root, pid, interface);
        let names: Vec<String> = counters.iter().map(|c| shell_quote(Path::new(c))).collect();
        let script = format!(
            "cd {} || exit 1; for s in {}; do printf '%s=' \"$s\"; cat \"$s\" 2>/dev/null || echo; done",
            shell_quote(&dir),
            names.join(" ")
        );
        let out = match self.run(script).await {
            Ok(out) if out.success => out,
            Ok(out) => {
                let msg = out.stderr.trim().to_string();
                return counters
                    .iter()
                    .map(|_| Err(GatewayError::ExecFailed(msg.clone())))
                    .collect();
            }
            Err(e) => {
                let msg = e.to_string();
                return counters
                    .iter()
                    .map(|_| Err(GatewayError::ExecFailed(msg.clone())))
                    .collect();
            }
        };
        let values = parse_batch(&out.stdout);
        counters
            .iter()
            .map(|c| match values.get(c) {
                Some(v) => parse_counter(v),
                None => Err(GatewayError::Empty),
            })
            .collect()
    }
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

/// Interface names from `ls` output, sorted independently of the shell's locale.
fn parse_listing(stdout: &str) -> Vec<String> {
    let mut names: Vec<String> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    names.sort();
    names
}

/// Classifies the output of a single counter read.
fn parse_counter(output: &str) -> Result<String> {
    let value = output.trim_end_matches('\n');
    if let Some(marker) = FAILURE_MARKERS.iter().find(|m| value.contains(*m)) {
        return Err(GatewayError::ExecFailed((*marker).to_string()));
    }
    if value.is_empty() {
        return Err(GatewayError::Empty);
    }
    Ok(value.to_string())
}

/// `name=value` lines from the batched read script.
fn parse_batch(stdout: &str) -> HashMap<&str, &str> {
    stdout
        .lines()
        .filter_map(|line| line.split_once('='))
        .collect()
}
