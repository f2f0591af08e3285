use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::catalog::{default_endpoints, Catalog, Endpoint};
use crate::error::{AppError, Result};

/// Output format for check results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Junit,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Human => write!(f, "human"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Junit => write!(f, "junit"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "human" | "text" | "console" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            "junit" | "xml" => Ok(OutputFormat::Junit),
            _ => Err(AppError::Config(format!("Unknown output format: {}", s))),
        }
    }
}

/// Global settings shared by every probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "default_tcp_timeout")]
    pub tcp_timeout_ms: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,
    #[serde(default = "default_ntp_timeout")]
    pub ntp_timeout_ms: u64,
    /// Probes in flight at once; 1 means strictly sequential
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Stop the run at the first probe error
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default)]
    pub output_format: OutputFormat,
}

fn default_tcp_timeout() -> u64 {
    5000
}

fn default_http_timeout() -> u64 {
    2000
}

fn default_ntp_timeout() -> u64 {
    5000
}

fn default_concurrency() -> usize {
    1
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            tcp_timeout_ms: default_tcp_timeout(),
            http_timeout_ms: default_http_timeout(),
            ntp_timeout_ms: default_ntp_timeout(),
            concurrency: default_concurrency(),
            fail_fast: false,
            output_format: OutputFormat::Human,
        }
    }
}

impl GlobalConfig {
    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn ntp_timeout(&self) -> Duration {
        Duration::from_millis(self.ntp_timeout_ms)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::FileNotFound(path.display().to_string())
            } else {
                AppError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Create a default configuration with the built-in catalog
    pub fn default_config() -> Self {
        Config {
            global: GlobalConfig::default(),
            endpoints: default_endpoints(),
        }
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Build the run catalog
    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.endpoints.clone())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_ms = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(ms) = parse_ms("REACHCHECK_TCP_TIMEOUT_MS") {
            self.global.tcp_timeout_ms = ms;
        }
        if let Some(ms) = parse_ms("REACHCHECK_HTTP_TIMEOUT_MS") {
            self.global.http_timeout_ms = ms;
        }
        if let Some(ms) = parse_ms("REACHCHECK_NTP_TIMEOUT_MS") {
            self.global.ntp_timeout_ms = ms;
        }

        if let Some(n) = lookup("REACHCHECK_CONCURRENCY").and_then(|v| v.trim().parse().ok()) {
            self.global.concurrency = n;
        }

        if let Some(flag) = lookup("REACHCHECK_FAIL_FAST") {
            self.global.fail_fast = matches!(
                flag.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        if let Some(format) = lookup("REACHCHECK_OUTPUT").and_then(|v| v.parse().ok()) {
            self.global.output_format = format;
        }
    }
}

/// Validate configuration, returning warnings for suspicious but usable settings
pub fn validate_config(config: &Config) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if config.endpoints.is_empty() {
        return Err(AppError::Config("No endpoints configured".to_string()));
    }

    for (idx, endpoint) in config.endpoints.iter().enumerate() {
        if endpoint.host().trim().is_empty() {
            return Err(AppError::Config(format!(
                "Endpoint #{} has an empty host",
                idx + 1
            )));
        }
        if endpoint.port == 0 {
            return Err(AppError::Config(format!(
                "Endpoint '{}' has invalid port 0",
                endpoint.url
            )));
        }
        if endpoint.path().is_some() && endpoint.protocol != crate::catalog::Protocol::Http {
            warnings.push(format!(
                "Endpoint '{}' has a path, which is ignored for {} probes",
                endpoint.url, endpoint.protocol
            ));
        }
    }

    for (idx, endpoint) in config.endpoints.iter().enumerate() {
        let seen_before = config.endpoints[..idx]
            .iter()
            .any(|e| e.url == endpoint.url && e.port == endpoint.port && e.protocol == endpoint.protocol);
        if seen_before {
            warnings.push(format!(
                "Endpoint '{}' port {} is listed more than once",
                endpoint.url, endpoint.port
            ));
        }
    }

    if !config.endpoints.iter().any(|e| e.required) {
        warnings.push("No endpoint is marked as required".to_string());
    }

    if config.global.concurrency == 0 {
        warnings.push("Concurrency 0 is treated as 1".to_string());
    }

    for (name, ms) in [
        ("tcp_timeout_ms", config.global.tcp_timeout_ms),
        ("http_timeout_ms", config.global.http_timeout_ms),
        ("ntp_timeout_ms", config.global.ntp_timeout_ms),
    ] {
        if ms == 0 {
            warnings.push(format!("{} is 0, every probe of that kind will fail", name));
        }
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Protocol;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert_eq!(config.global.tcp_timeout_ms, 5000);
        assert_eq!(config.global.http_timeout_ms, 2000);
        assert_eq!(config.global.ntp_timeout_ms, 5000);
        assert_eq!(config.global.concurrency, 1);
        assert!(!config.global.fail_fast);
        assert_eq!(config.endpoints.len(), 22);
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let config = Config::default_config();
        let toml = config.to_toml().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let loaded = Config::from_file(file.path()).unwrap();
        assert_eq!(loaded.endpoints, config.endpoints);
        assert_eq!(loaded.global.http_timeout_ms, 2000);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [[endpoints]]
            required = false
            url = "example.com"
            port = 8883
            protocol = "mqtts"
            "#,
        )
        .unwrap();

        assert_eq!(config.global.tcp_timeout_ms, 5000);
        assert_eq!(config.global.output_format, OutputFormat::Human);
        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.endpoints[0].protocol, Protocol::Mqtts);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/reachcheck.toml")).unwrap_err();
        assert!(matches!(err, AppError::FileNotFound(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("REACHCHECK_TCP_TIMEOUT_MS", "750"),
            ("REACHCHECK_CONCURRENCY", "4"),
            ("REACHCHECK_FAIL_FAST", "true"),
            ("REACHCHECK_OUTPUT", "json"),
            ("REACHCHECK_NTP_TIMEOUT_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default_config();
        config.apply_overrides_from(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.global.tcp_timeout_ms, 750);
        assert_eq!(config.global.concurrency, 4);
        assert!(config.global.fail_fast);
        assert_eq!(config.global.output_format, OutputFormat::Json);
        assert_eq!(config.global.ntp_timeout_ms, 5000);
    }

    #[test]
    fn test_validate_default_is_clean() {
        let warnings = validate_config(&Config::default_config()).unwrap();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn test_validate_rejects_port_zero() {
        let mut config = Config::default_config();
        config.endpoints[0].port = 0;
        assert!(matches!(validate_config(&config), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let config = Config {
            global: GlobalConfig::default(),
            endpoints: vec![Endpoint::required("/health", 80, Protocol::Http)],
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_warnings() {
        let config = Config {
            global: GlobalConfig {
                concurrency: 0,
                ..GlobalConfig::default()
            },
            endpoints: vec![
                Endpoint::optional("a.example.com", 443, Protocol::Https),
                Endpoint::optional("a.example.com", 443, Protocol::Https),
            ],
        };
        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().any(|w| w.contains("more than once")));
        assert!(warnings.iter().any(|w| w.contains("required")));
        assert!(warnings.iter().any(|w| w.contains("Concurrency")));
    }
}
