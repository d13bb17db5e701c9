use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("network statistics are not readable inside pid {pid}")]
    Unsupported { pid: u32 },
    #[error("exec failed: {0}")]
    ExecFailed(String),
    #[error("counter read returned no value")]
    Empty,
    #[error("read timed out after {0:?}")]
    Timeout(Duration),
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl GatewayError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        GatewayError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
