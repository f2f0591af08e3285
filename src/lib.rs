//! Network Reachability Checker
//!
//! A CLI tool that verifies, from the current network, that the endpoints a
//! deployment depends on are reachable.
//!
//! # Probes
//!
//! - **TCP** - raw connect, used for `https`, `mqtts` and `tcp` endpoints
//! - **HTTP** - plain GET, any completed response counts
//! - **NTP** - single SNTP exchange, a non-zero server time counts
//!
//! Required endpoints decide the exit code; optional ones are reported only.
//!
//! # Example Usage
//!
//! ```bash
//! # Check the built-in catalog
//! reachcheck check
//!
//! # Check a custom catalog, four probes at a time, JSON output
//! reachcheck --config site.toml check --concurrency 4 --output json
//!
//! # Resolve every catalog host
//! reachcheck diagnose
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod network;
pub mod output;
pub mod probes;
pub mod runner;

pub use catalog::{Catalog, Endpoint, Protocol};
pub use cli::{Cli, Commands};
pub use config::{Config, OutputFormat};
pub use error::{AppError, ExitCode, ProbeError, Result};
pub use output::{get_reporter, CheckReport, Reporter};
pub use probes::{Probe, ProbeOutcome, ProbeSet};
pub use runner::{EndpointResult, ProbeRunner, RunnerConfig};
