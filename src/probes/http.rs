//! Plain HTTP GET probe.
//!
//! Any completed response counts, whatever its status. Transport failures
//! are returned as errors so the runner decides whether they end the run.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{measure_time, Probe, ProbeOutcome};
use crate::catalog::Endpoint;
use crate::error::ProbeError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Build the plain-HTTP target for an endpoint, `http://host[:port][/path]`
pub fn target_url(endpoint: &Endpoint) -> Result<Url, ProbeError> {
    let mut url = Url::parse(&format!("http://{}", endpoint.url))?;
    if endpoint.port != 80 {
        url.set_port(Some(endpoint.port))
            .map_err(|_| ProbeError::Client(format!("cannot set port on {}", endpoint.url)))?;
    }
    Ok(url)
}

/// Client with the probe timeout and no idle-connection pooling, so every
/// request opens and releases its own connection
pub fn build_client(request_timeout: Duration) -> Result<Client, ProbeError> {
    Client::builder()
        .timeout(request_timeout)
        .pool_max_idle_per_host(0)
        .build()
        .map_err(|e| ProbeError::Client(e.to_string()))
}

/// GET `url`; any completed response counts as reachable, whatever its status.
///
/// Connection errors and timeouts are returned as `Err`.
pub async fn probe_http(client: &Client, url: &Url) -> Result<ProbeOutcome, ProbeError> {
    let (result, duration_ms) = measure_time(client.get(url.clone()).send()).await;

    match result {
        Ok(response) => {
            let status = response.status();
            debug!(%url, status = status.as_u16(), duration_ms, "http request completed");
            Ok(ProbeOutcome::reachable(duration_ms).with_detail(format!("HTTP {}", status)))
        }
        Err(e) => {
            debug!(%url, duration_ms, error = %e, "http request failed");
            Err(ProbeError::Http(e))
        }
    }
}

/// HTTP probe with a fixed request timeout
pub struct HttpProbe {
    timeout: Duration,
    client: Option<Client>,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: None,
        }
    }

    /// Use a caller-built client instead of the default one
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn probe(&self, endpoint: &Endpoint) -> Result<ProbeOutcome, ProbeError> {
        let url = target_url(endpoint)?;
        match &self.client {
            Some(client) => probe_http(client, &url).await,
            None => probe_http(&build_client(self.timeout)?, &url).await,
        }
    }
}
