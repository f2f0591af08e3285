use crate::catalog::Catalog;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// DNS resolution result
#[derive(Debug, Clone, Serialize)]
pub struct DnsResult {
    pub hostname: String,
    pub resolved: bool,
    pub addresses: Vec<String>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Name-resolution report for every host in a catalog
#[derive(Debug, Clone, Serialize)]
pub struct NetworkDiagnostics {
    pub dns: Vec<DnsResult>,
}

impl NetworkDiagnostics {
    pub fn has_failures(&self) -> bool {
        self.dns.iter().any(|r| !r.resolved)
    }
}

/// Perform DNS resolution check
pub async fn check_dns(hostname: &str, lookup_timeout: Duration) -> DnsResult {
    let start = Instant::now();

    // port is irrelevant for resolution
    let lookup = tokio::net::lookup_host((hostname, 0));
    match timeout(lookup_timeout, lookup).await {
        Ok(Ok(addrs)) => {
            let mut addresses: Vec<String> = Vec::new();
            for addr in addrs {
                let ip = addr.ip().to_string();
                if !addresses.contains(&ip) {
                    addresses.push(ip);
                }
            }
            debug!(hostname, count = addresses.len(), "dns lookup finished");
            DnsResult {
                hostname: hostname.to_string(),
                resolved: !addresses.is_empty(),
                addresses,
                duration_ms: start.elapsed().as_millis() as u64,
                error: None,
            }
        }
        Ok(Err(e)) => DnsResult {
            hostname: hostname.to_string(),
            resolved: false,
            addresses: vec![],
            duration_ms: start.elapsed().as_millis() as u64,
            error: Some(e.to_string()),
        },
        Err(_) => DnsResult {
            hostname: hostname.to_string(),
            resolved: false,
            addresses: vec![],
            duration_ms: start.elapsed().as_millis() as u64,
            error: Some(format!("lookup timed out after {}ms", lookup_timeout.as_millis())),
        },
    }
}

/// Resolve each distinct catalog host, in catalog order
pub async fn run_diagnostics(catalog: &Catalog, lookup_timeout: Duration) -> NetworkDiagnostics {
    let mut dns_results = Vec::new();
    for host in catalog.hosts() {
        dns_results.push(check_dns(host, lookup_timeout).await);
    }
    NetworkDiagnostics { dns: dns_results }
}

/// Format network diagnostics for human-readable output
pub fn format_diagnostics(diagnostics: &NetworkDiagnostics, use_colors: bool) -> String {
    use console::style;

    let mut output = String::new();

    output.push_str("\nNetwork Diagnostics\n");
    output.push_str("==================\n\n");
    output.push_str("DNS Resolution:\n");

    for result in &diagnostics.dns {
        let status = match (result.resolved, use_colors) {
            (true, true) => style("\u{2713}").green().force_styling(true).to_string(),
            (true, false) => "[OK]".to_string(),
            (false, true) => style("\u{2717}").red().force_styling(true).to_string(),
            (false, false) => "[FAIL]".to_string(),
        };

        output.push_str(&format!(
            "  {} {} ({}ms)\n",
            status, result.hostname, result.duration_ms
        ));

        if result.resolved {
            for addr in &result.addresses {
                if use_colors {
                    output.push_str(&format!("    {}\n", style(addr).dim().force_styling(true)));
                } else {
                    output.push_str(&format!("    {}\n", addr));
                }
            }
        } else if let Some(error) = &result.error {
            if use_colors {
                output.push_str(&format!("    {}\n", style(error).red().force_styling(true)));
            } else {
                output.push_str(&format!("    Error: {}\n", error));
            }
        }
    }

    output
}
