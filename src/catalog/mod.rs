use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Application protocol spoken by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Mqtts,
    Ntp,
    Tcp,
}

/// Which probe handles a protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Tcp,
    Http,
    Ntp,
}

impl Protocol {
    /// TLS-wrapped protocols are only checked for a listening TCP port.
    pub fn probe_kind(&self) -> ProbeKind {
        match self {
            Protocol::Https | Protocol::Mqtts | Protocol::Tcp => ProbeKind::Tcp,
            Protocol::Http => ProbeKind::Http,
            Protocol::Ntp => ProbeKind::Ntp,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
            Protocol::Mqtts => write!(f, "mqtts"),
            Protocol::Ntp => write!(f, "ntp"),
            Protocol::Tcp => write!(f, "tcp"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" | "tls" => Ok(Protocol::Https),
            "mqtts" | "mqtt-tls" => Ok(Protocol::Mqtts),
            "ntp" | "sntp" => Ok(Protocol::Ntp),
            "tcp" => Ok(Protocol::Tcp),
            _ => Err(AppError::InvalidInput(format!("Unknown protocol: {}", s))),
        }
    }
}

/// A remote endpoint to check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Whether an unreachable endpoint blocks deployment
    pub required: bool,
    /// Hostname, optionally followed by a URL path (`host/health`)
    pub url: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl Endpoint {
    pub fn new(required: bool, url: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            required,
            url: url.into(),
            port,
            protocol,
        }
    }

    pub fn required(url: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self::new(true, url, port, protocol)
    }

    pub fn optional(url: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self::new(false, url, port, protocol)
    }

    /// Host part of the URL, everything before the first `/`
    pub fn host(&self) -> &str {
        match self.url.find('/') {
            Some(idx) => &self.url[..idx],
            None => &self.url,
        }
    }

    /// Path part of the URL including its leading `/`
    pub fn path(&self) -> Option<&str> {
        self.url.find('/').map(|idx| &self.url[idx..])
    }

    /// `host:port` label used in logs and errors
    pub fn address(&self) -> String {
        format!("{}:{}", self.host(), self.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host(), self.port)?;
        if let Some(path) = self.path() {
            write!(f, "{}", path)?;
        }
        Ok(())
    }
}

/// Ordered, read-only list of endpoints for one run
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    endpoints: Vec<Endpoint>,
}

impl Catalog {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Keep only the required endpoints, preserving order
    pub fn required_only(&self) -> Self {
        Self {
            endpoints: self
                .endpoints
                .iter()
                .filter(|e| e.required)
                .cloned()
                .collect(),
        }
    }

    /// Distinct hosts in first-seen order
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = Vec::new();
        for endpoint in &self.endpoints {
            let host = endpoint.host();
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        hosts
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Endpoint;
    type IntoIter = std::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.iter()
    }
}

/// Endpoints an edge node needs for a deployment
pub fn default_endpoints() -> Vec<Endpoint> {
    use Protocol::*;

    vec![
        Endpoint::required("prod.bmq.barbaraiot.com", 9883, Mqtts),
        Endpoint::required("prod.bmq.barbaraiot.com", 7883, Mqtts),
        Endpoint::required("prod.bmq.barbaraiot.com/health", 80, Http),
        Endpoint::required("prod.ota.barbaraiot.com", 443, Https),
        Endpoint::required("prod.images.barbara.tech", 443, Https),
        Endpoint::required("prod.images.barbaraiot.com", 443, Https),
        Endpoint::required("de.icr.io", 443, Https),
        Endpoint::required("0.pool.ntp.org", 123, Ntp),
        Endpoint::required("1.pool.ntp.org", 123, Ntp),
        Endpoint::required("2.pool.ntp.org", 123, Ntp),
        Endpoint::required("3.pool.ntp.org", 123, Ntp),
        Endpoint::required("time1.google.com", 123, Ntp),
        Endpoint::required("time2.google.com", 123, Ntp),
        Endpoint::required("time3.google.com", 123, Ntp),
        Endpoint::required("time4.google.com", 123, Ntp),
        // Container registries, best-effort
        Endpoint::optional("auth.docker.io", 443, Https),
        Endpoint::optional("registry.docker.io", 443, Https),
        Endpoint::optional("registry-1.docker.io", 443, Https),
        Endpoint::optional("registry-2.docker.io", 443, Https),
        Endpoint::optional("index.docker.io", 443, Https),
        Endpoint::optional("dseasb33srnrn.cloudfront.net", 443, Https),
        Endpoint::optional("production.cloudflare.docker.com", 443, Https),
    ]
}
