//! Raw TCP connect probe.
//!
//! Used for TLS-wrapped endpoints (`https`, `mqtts`): it only proves that
//! something accepts TCP connections on the port, no handshake is attempted.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::{measure_time, Probe, ProbeOutcome};
use crate::catalog::Endpoint;
use crate::error::ProbeError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Connect to `host:port`, reachable as soon as the connection completes.
///
/// Name resolution counts against the timeout. Refusal, unreachable network,
/// DNS failure and timeout all yield an unreachable outcome. The socket is
/// closed before returning on every path.
pub async fn probe_tcp(host: &str, port: u16, connect_timeout: Duration) -> ProbeOutcome {
    let (result, duration_ms) =
        measure_time(timeout(connect_timeout, TcpStream::connect((host, port)))).await;

    match result {
        Ok(Ok(mut stream)) => {
            // graceful FIN; the drop below closes the descriptor either way
            let _ = stream.shutdown().await;
            drop(stream);
            debug!(host, port, duration_ms, "tcp connect succeeded");
            ProbeOutcome::reachable(duration_ms)
        }
        Ok(Err(e)) => {
            debug!(host, port, duration_ms, error = %e, "tcp connect failed");
            ProbeOutcome::unreachable(duration_ms).with_detail(e.to_string())
        }
        Err(_) => {
            debug!(host, port, duration_ms, "tcp connect timed out");
            ProbeOutcome::unreachable(duration_ms)
                .with_detail(format!("timed out after {}ms", connect_timeout.as_millis()))
        }
    }
}

/// TCP probe with a fixed connect timeout
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn probe(&self, endpoint: &Endpoint) -> Result<ProbeOutcome, ProbeError> {
        Ok(probe_tcp(endpoint.host(), endpoint.port, self.timeout).await)
    }
}
