use crate::catalog::{Catalog, Endpoint};
use crate::config::Config;
use crate::error::{AppError, ProbeError, Result};
use crate::output::{CheckReport, Reporter};
use crate::probes::{ProbeOutcome, ProbeSet};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, info, warn};

/// Outcome of probing one catalog entry
#[derive(Debug, Clone, Serialize)]
pub struct EndpointResult {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
    /// Set when the probe raised an error instead of reaching a verdict
    pub error: Option<String>,
}

impl EndpointResult {
    pub fn new(endpoint: Endpoint, outcome: ProbeOutcome) -> Self {
        Self {
            endpoint,
            outcome,
            error: None,
        }
    }

    pub fn errored(endpoint: Endpoint, error: &ProbeError) -> Self {
        Self {
            endpoint,
            outcome: ProbeOutcome::unreachable(0),
            error: Some(error.to_string()),
        }
    }

    pub fn reachable(&self) -> bool {
        self.outcome.reachable
    }
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Probes in flight at once, 1 for strictly sequential
    pub concurrency: usize,
    /// Abort the whole run at the first probe error
    pub fail_fast: bool,
    /// Show a progress bar on stderr
    pub show_progress: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            fail_fast: false,
            show_progress: false,
        }
    }
}

impl RunnerConfig {
    /// Create from CLI args and config file
    pub fn from_config(
        config: &Config,
        concurrency: Option<usize>,
        fail_fast: bool,
        show_progress: bool,
    ) -> Self {
        Self {
            concurrency: concurrency.unwrap_or(config.global.concurrency).max(1),
            fail_fast: fail_fast || config.global.fail_fast,
            show_progress,
        }
    }
}

/// Walks a catalog, dispatching each entry to the probe for its protocol.
///
/// Results reach the reporter strictly in catalog order, whatever the
/// concurrency. With `fail_fast` the first probe error ends the run: nothing
/// new is dispatched, running probes are cancelled, no later entry is
/// reported, and the returned report is marked aborted.
pub struct ProbeRunner {
    config: RunnerConfig,
    probes: ProbeSet,
}

impl ProbeRunner {
    pub fn new(config: RunnerConfig, probes: ProbeSet) -> Self {
        Self { config, probes }
    }

    fn progress_bar(&self, len: usize) -> Option<ProgressBar> {
        if !self.config.show_progress {
            return None;
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .map(|s| s.progress_chars("##-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        Some(pb)
    }

    pub async fn run(&self, catalog: &Catalog, reporter: &mut dyn Reporter) -> Result<CheckReport> {
        let start = Instant::now();
        let endpoints = catalog.endpoints();
        let concurrency = self.config.concurrency.max(1);

        info!(
            endpoints = endpoints.len(),
            concurrency,
            fail_fast = self.config.fail_fast,
            "starting reachability check"
        );

        let progress = self.progress_bar(endpoints.len());

        let mut in_flight: JoinSet<(usize, ProbeResult)> = JoinSet::new();
        let mut probe_tasks: Vec<AbortHandle> = Vec::with_capacity(endpoints.len());
        let mut finished: BTreeMap<usize, ProbeResult> = BTreeMap::new();
        let mut results = Vec::with_capacity(endpoints.len());
        let mut next_dispatch = 0;
        let mut next_report = 0;
        // set once a fail-fast run has seen an error; nothing new is dispatched
        let mut halted = false;

        while next_report < endpoints.len() {
            while !halted && in_flight.len() < concurrency && next_dispatch < endpoints.len() {
                let idx = next_dispatch;
                let endpoint = endpoints[idx].clone();
                let probe = self.probes.for_endpoint(&endpoint);
                debug!(endpoint = %endpoint, probe = probe.name(), "dispatching probe");

                // own task so a panicking probe only fails its own entry
                let handle = tokio::spawn(async move { probe.probe(&endpoint).await });
                probe_tasks.push(handle.abort_handle());
                in_flight.spawn(async move {
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(ProbeError::Task(e.to_string())),
                    };
                    (idx, result)
                });
                next_dispatch += 1;
            }

            match in_flight.join_next().await {
                Some(Ok((idx, result))) => {
                    if self.config.fail_fast && result.is_err() && !halted {
                        debug!(index = idx, "probe error, no further dispatch");
                        halted = true;
                    }
                    finished.insert(idx, result);
                }
                Some(Err(e)) => {
                    cancel(&mut in_flight, &probe_tasks);
                    return Err(AppError::Network(format!("probe runner task failed: {}", e)));
                }
                None => break,
            }

            while let Some(result) = finished.remove(&next_report) {
                let endpoint = endpoints[next_report].clone();
                let result = match result {
                    Ok(outcome) => EndpointResult::new(endpoint, outcome),
                    Err(e) if self.config.fail_fast => {
                        warn!(endpoint = %endpoint, error = %e, "probe failed, aborting run");
                        cancel(&mut in_flight, &probe_tasks);
                        if let Some(pb) = &progress {
                            pb.abandon_with_message("Aborted");
                        }

                        let error = e.to_string();
                        reporter.abort(&endpoint, &error)?;
                        let report = CheckReport::new(results, start.elapsed().as_millis() as u64)
                            .into_aborted(endpoint, error);
                        reporter.finish(&report)?;
                        return Ok(report);
                    }
                    Err(e) => {
                        warn!(endpoint = %endpoint, error = %e, "probe failed");
                        EndpointResult::errored(endpoint, &e)
                    }
                };

                reporter.report(&result)?;
                results.push(result);
                next_report += 1;

                if let Some(pb) = &progress {
                    pb.set_message(endpoints[next_report - 1].url.clone());
                    pb.inc(1);
                }
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let report = CheckReport::new(results, start.elapsed().as_millis() as u64);
        info!(
            total = report.summary.total,
            passed = report.summary.passed,
            required_failed = report.summary.required_failed,
            optional_failed = report.summary.optional_failed,
            duration_ms = report.total_duration_ms,
            "reachability check finished"
        );
        reporter.finish(&report)?;

        Ok(report)
    }
}

type ProbeResult = std::result::Result<ProbeOutcome, ProbeError>;

/// Stop every probe still running, releasing its socket
fn cancel(in_flight: &mut JoinSet<(usize, ProbeResult)>, probe_tasks: &[AbortHandle]) {
    in_flight.abort_all();
    for task in probe_tasks {
        task.abort();
    }
}
