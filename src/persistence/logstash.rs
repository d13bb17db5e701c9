// Logstash driver: newline-delimited JSON over one TCP connection.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use super::{NodeDocument, PersistError, Persister, Result, stat_documents};
use crate::config::LogstashConfig;
use crate::models::Node;

pub struct LogstashPersister {
    addr: String,
    conn: Mutex<Option<TcpStream>>,
}

impl LogstashPersister {
    /// Connects with up to `connect_attempts` tries spaced by `retry_delay_secs`.
    pub async fn connect(config: &LogstashConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let stream = connect_with_retry(
            &addr,
            config.connect_attempts,
            Duration::from_secs(config.retry_delay_secs),
        )
        .await?;
        Ok(Self {
            addr,
            conn: Mutex::new(Some(stream)),
        })
    }

    /// Writes the payload once. On failure, reconnects once and drops the payload.
    async fn send(&self, payload: &[u8]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let written = match conn.as_mut() {
            Some(stream) => match stream.write_all(payload).await {
                Ok(()) => stream.flush().await,
                Err(e) => Err(e),
            },
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "no logstash connection",
            )),
        };
        let Err(e) = written else {
            return Ok(());
        };
        warn!(addr = %self.addr, error = %e, "logstash write failed; reconnecting");
        *conn = None;
        match TcpStream::connect(&self.addr).await {
            Ok(stream) => {
                info!(addr = %self.addr, "reconnected to logstash");
                *conn = Some(stream);
            }
            Err(re) => error!(addr = %self.addr, error = %re, "logstash reconnect failed"),
        }
        Err(PersistError::Write(e))
    }
}

async fn connect_with_retry(addr: &str, attempts: u32, delay: Duration) -> Result<TcpStream> {
    let mut last_err = None;
    for attempt in 1..=attempts {
        info!(addr, attempt, "connecting to logstash");
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                info!(addr, "connected to logstash");
                return Ok(stream);
            }
            Err(e) => {
                warn!(addr, attempt, error = %e, "logstash connect failed");
                last_err = Some(e);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    Err(PersistError::Connect {
        addr: addr.to_string(),
        attempts,
        source: last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "no attempt made")
        }),
    })
}

fn encode_line<T: serde::Serialize>(doc: &T, out: &mut Vec<u8>) -> Result<()> {
    serde_json::to_writer(&mut *out, doc)?;
    out.push(b'\n');
    Ok(())
}

#[async_trait]
impl Persister for LogstashPersister {
    #[instrument(skip(self, node), fields(persister = "logstash", operation = "update_node"))]
    async fn update_node(&self, node: &Node) -> Result<()> {
        let docs = stat_documents(node);
        if docs.is_empty() {
            return Ok(());
        }
        let mut payload = Vec::with_capacity(docs.len() * 192);
        for doc in &docs {
            if let Err(e) = encode_line(doc, &mut payload) {
                error!(
                    container_id = %doc.container_docker_id,
                    interface = %doc.network_interface_name,
                    counter = %doc.name,
                    error = %e,
                    "encoding stat document failed"
                );
            }
        }
        self.send(&payload).await
    }

    async fn create_node(&self, node: &Node) -> Result<()> {
        let mut payload = Vec::new();
        encode_line(&NodeDocument::from(node), &mut payload)?;
        self.send(&payload).await
    }

    async fn create_cluster(&self) -> Result<()> {
        info!("logstash driver: dashboards are provisioned outside the agent");
        Ok(())
    }

    async fn close(&self) {
        if let Some(mut stream) = self.conn.lock().await.take()
            && let Err(e) = stream.shutdown().await
        {
            warn!(addr = %self.addr, error = %e, "closing logstash connection");
        }
    }
}
