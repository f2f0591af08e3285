pub mod http;
pub mod ntp;
pub mod tcp;

use crate::catalog::{Endpoint, ProbeKind};
use crate::config::GlobalConfig;
use crate::error::ProbeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

pub use http::{probe_http, HttpProbe};
pub use ntp::{probe_ntp, NtpProbe};
pub use tcp::{probe_tcp, TcpProbe};

/// Verdict of a single probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub reachable: bool,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// What the probe observed (status code, server time, connect error)
    pub detail: Option<String>,
}

impl ProbeOutcome {
    pub fn reachable(duration_ms: u64) -> Self {
        Self {
            reachable: true,
            duration_ms,
            detail: None,
        }
    }

    pub fn unreachable(duration_ms: u64) -> Self {
        Self {
            reachable: false,
            duration_ms,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A protocol-specific reachability check
#[async_trait]
pub trait Probe: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Probe one endpoint. `Err` means the check itself raised an error
    /// rather than reaching a verdict.
    async fn probe(&self, endpoint: &Endpoint) -> Result<ProbeOutcome, ProbeError>;
}

/// The probe used for each protocol family
#[derive(Clone)]
pub struct ProbeSet {
    pub tcp: Arc<dyn Probe>,
    pub http: Arc<dyn Probe>,
    pub ntp: Arc<dyn Probe>,
}

impl ProbeSet {
    /// Real network probes with the configured timeouts
    pub fn from_config(global: &GlobalConfig) -> Self {
        Self {
            tcp: Arc::new(TcpProbe::new(global.tcp_timeout())),
            http: Arc::new(HttpProbe::new(global.http_timeout())),
            ntp: Arc::new(NtpProbe::new(global.ntp_timeout())),
        }
    }

    pub fn for_endpoint(&self, endpoint: &Endpoint) -> Arc<dyn Probe> {
        match endpoint.protocol.probe_kind() {
            ProbeKind::Tcp => Arc::clone(&self.tcp),
            ProbeKind::Http => Arc::clone(&self.http),
            ProbeKind::Ntp => Arc::clone(&self.ntp),
        }
    }
}

impl Default for ProbeSet {
    fn default() -> Self {
        Self::from_config(&GlobalConfig::default())
    }
}

/// Helper function to measure execution time
pub async fn measure_time<F, T>(f: F) -> (T, u64)
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let result = f.await;
    let duration_ms = start.elapsed().as_millis() as u64;
    (result, duration_ms)
}
