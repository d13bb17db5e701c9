use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub collector: CollectorConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Target period between two sampling ticks.
    pub refresh_interval_secs: u64,
    /// Containers whose name matches are never tracked. Empty disables filtering.
    #[serde(default)]
    pub skip_pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Procfs,
    Exec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_mode")]
    pub mode: GatewayMode,
    #[serde(default = "default_proc_root")]
    pub proc_root: String,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: default_gateway_mode(),
            proc_root: default_proc_root(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

fn default_gateway_mode() -> GatewayMode {
    GatewayMode::Procfs
}

fn default_proc_root() -> String {
    "/proc".into()
}

fn default_read_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Wait after the first failed attempt; doubled after each further failure.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            connect_attempts: default_connect_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_connect_attempts() -> u32 {
    11
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceDriver {
    Logstash,
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_driver")]
    pub driver: PersistenceDriver,
    #[serde(default)]
    pub logstash: LogstashConfig,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            logstash: LogstashConfig::default(),
        }
    }
}

fn default_driver() -> PersistenceDriver {
    PersistenceDriver::Logstash
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogstashConfig {
    #[serde(default = "default_logstash_host")]
    pub host: String,
    #[serde(default = "default_logstash_port")]
    pub port: u16,
    #[serde(default = "default_logstash_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_logstash_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for LogstashConfig {
    fn default() -> Self {
        Self {
            host: default_logstash_host(),
            port: default_logstash_port(),
            connect_attempts: default_logstash_attempts(),
            retry_delay_secs: default_logstash_retry_delay_secs(),
        }
    }
}

fn default_logstash_host() -> String {
    "logstash".into()
}

fn default_logstash_port() -> u16 {
    8080
}

fn default_logstash_attempts() -> u32 {
    12
}

fn default_logstash_retry_delay_secs() -> u64 {
    5
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.collector.refresh_interval_secs > 0,
            "collector.refresh_interval_secs must be > 0, got {}",
            self.collector.refresh_interval_secs
        );
        if !self.collector.skip_pattern.is_empty() {
            Regex::new(&self.collector.skip_pattern).map_err(|e| {
                anyhow::anyhow!("collector.skip_pattern is not a valid regex: {}", e)
            })?;
        }
        anyhow::ensure!(
            !self.gateway.proc_root.is_empty(),
            "gateway.proc_root must be non-empty"
        );
        anyhow::ensure!(
            self.gateway.read_timeout_ms > 0,
            "gateway.read_timeout_ms must be > 0, got {}",
            self.gateway.read_timeout_ms
        );
        anyhow::ensure!(
            self.runtime.connect_attempts > 0,
            "runtime.connect_attempts must be > 0, got {}",
            self.runtime.connect_attempts
        );
        anyhow::ensure!(
            self.runtime.initial_backoff_ms > 0,
            "runtime.initial_backoff_ms must be > 0, got {}",
            self.runtime.initial_backoff_ms
        );
        if self.persistence.driver == PersistenceDriver::Logstash {
            let ls = &self.persistence.logstash;
            anyhow::ensure!(
                !ls.host.is_empty(),
                "persistence.logstash.host must be non-empty"
            );
            anyhow::ensure!(
                ls.port > 0,
                "persistence.logstash.port must be between 1 and 65535, got {}",
                ls.port
            );
            anyhow::ensure!(
                ls.connect_attempts > 0,
                "persistence.logstash.connect_attempts must be > 0, got {}",
                ls.connect_attempts
            );
        }
        Ok(())
    }
}
