use crate::catalog::Endpoint;
use crate::config::OutputFormat;
use crate::error::{ExitCode, Result};
use crate::runner::EndpointResult;
use chrono::{DateTime, Utc};
use console::{style, Style};
use serde::Serialize;
use std::io::Write;
use uuid::Uuid;

/// Summary of all endpoint results
#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub required_failed: usize,
    pub optional_failed: usize,
}

/// Probe error that stopped a fail-fast run
#[derive(Debug, Clone, Serialize)]
pub struct AbortCause {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    pub error: String,
}

/// Complete check report
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub summary: CheckSummary,
    pub total_duration_ms: u64,
    /// Set when the run stopped early; `results` then only holds the
    /// entries reported before the failing one
    pub aborted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_cause: Option<AbortCause>,
    pub results: Vec<EndpointResult>,
}

impl CheckReport {
    pub fn new(results: Vec<EndpointResult>, total_duration_ms: u64) -> Self {
        let mut passed = 0;
        let mut required_failed = 0;
        let mut optional_failed = 0;

        for result in &results {
            if result.reachable() {
                passed += 1;
            } else if result.endpoint.required {
                required_failed += 1;
            } else {
                optional_failed += 1;
            }
        }

        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            summary: CheckSummary {
                total: results.len(),
                passed,
                failed: required_failed + optional_failed,
                required_failed,
                optional_failed,
            },
            total_duration_ms,
            aborted: false,
            abort_cause: None,
            results,
        }
    }

    /// Mark the report as cut short by `endpoint` failing with `error`
    pub fn into_aborted(mut self, endpoint: Endpoint, error: impl Into<String>) -> Self {
        self.aborted = true;
        self.abort_cause = Some(AbortCause {
            endpoint,
            error: error.into(),
        });
        self
    }

    /// Optional endpoints never fail the run
    pub fn all_required_reachable(&self) -> bool {
        self.summary.required_failed == 0
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.aborted {
            ExitCode::Aborted
        } else if self.all_required_reachable() {
            ExitCode::Success
        } else {
            ExitCode::RequiredUnreachable
        }
    }
}

/// Receives results as the runner produces them, in catalog order
pub trait Reporter {
    /// Called once per endpoint
    fn report(&mut self, result: &EndpointResult) -> Result<()>;

    /// Called at most once, when a fail-fast run stops at `endpoint`.
    /// `finish` still follows with the partial report.
    fn abort(&mut self, endpoint: &Endpoint, error: &str) -> Result<()>;

    /// Called once at the end of the run
    fn finish(&mut self, report: &CheckReport) -> Result<()>;

    /// Whether nothing is written until `finish`
    fn buffers_output(&self) -> bool {
        false
    }
}

/// Human-readable console reporter, one line per endpoint as it completes
pub struct HumanReporter<W: Write> {
    use_colors: bool,
    verbose: bool,
    out: W,
}

impl<W: Write> HumanReporter<W> {
    pub fn new(use_colors: bool, out: W) -> Self {
        Self {
            use_colors,
            verbose: false,
            out,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Required failures are the loudest: red and bold
    fn line_style(&self, required: bool, reachable: bool) -> Style {
        let style = if reachable {
            Style::new().green()
        } else {
            Style::new().red()
        };
        let style = if required { style.bold() } else { style };
        style.force_styling(self.use_colors)
    }

    pub fn render_line(&self, result: &EndpointResult) -> String {
        let endpoint = &result.endpoint;
        let kind = if endpoint.required {
            "Required"
        } else {
            "Optional"
        };
        let state = if result.reachable() { "open" } else { "CLOSED" };
        let text = format!(
            "{} url: {} is {} at port: {}",
            kind, endpoint.url, state, endpoint.port
        );

        let mut line = if self.use_colors {
            self.line_style(endpoint.required, result.reachable())
                .apply_to(text)
                .to_string()
        } else {
            text
        };

        if let Some(error) = &result.error {
            if self.use_colors {
                line.push_str(&format!(
                    " {}",
                    style(format!("({})", error)).dim().force_styling(true)
                ));
            } else {
                line.push_str(&format!(" ({})", error));
            }
        } else if self.verbose {
            if let Some(detail) = &result.outcome.detail {
                line.push_str(&format!(" [{}ms, {}]", result.outcome.duration_ms, detail));
            }
        }

        line
    }
}

impl<W: Write> Reporter for HumanReporter<W> {
    fn report(&mut self, result: &EndpointResult) -> Result<()> {
        let line = self.render_line(result);
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }

    fn abort(&mut self, endpoint: &Endpoint, error: &str) -> Result<()> {
        let line = format!(
            "Error: check of {} failed, run aborted ({})",
            endpoint.address(),
            error
        );
        if self.use_colors {
            writeln!(self.out, "{}", style(line).red().bold().force_styling(true))?;
        } else {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn finish(&mut self, report: &CheckReport) -> Result<()> {
        // the abort line is the last thing an aborted run prints
        if report.aborted {
            return Ok(());
        }

        let summary = &report.summary;
        writeln!(self.out)?;
        writeln!(self.out, "Summary")?;
        if self.use_colors {
            writeln!(
                self.out,
                "  Total: {} | {} | {} | {}",
                style(summary.total).bold().force_styling(true),
                style(format!("Open: {}", summary.passed))
                    .green()
                    .force_styling(true),
                style(format!("Required closed: {}", summary.required_failed))
                    .red()
                    .bold()
                    .force_styling(true),
                style(format!("Optional closed: {}", summary.optional_failed))
                    .red()
                    .force_styling(true)
            )?;
        } else {
            writeln!(
                self.out,
                "  Total: {} | Open: {} | Required closed: {} | Optional closed: {}",
                summary.total, summary.passed, summary.required_failed, summary.optional_failed
            )?;
        }
        writeln!(self.out, "  Duration: {}ms", report.total_duration_ms)?;
        self.out.flush()?;
        Ok(())
    }
}

/// JSON reporter, emits the whole report at the end
pub struct JsonReporter<W: Write> {
    pretty: bool,
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(pretty: bool, out: W) -> Self {
        Self { pretty, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn format(&self, report: &CheckReport) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(json)
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn report(&mut self, _result: &EndpointResult) -> Result<()> {
        Ok(())
    }

    fn abort(&mut self, _endpoint: &Endpoint, _error: &str) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self, report: &CheckReport) -> Result<()> {
        let json = self.format(report)?;
        writeln!(self.out, "{}", json)?;
        self.out.flush()?;
        Ok(())
    }

    fn buffers_output(&self) -> bool {
        true
    }
}

/// JUnit XML reporter for CI pipelines.
///
/// Closed required endpoints are failures, closed optional ones are skipped.
pub struct JunitReporter<W: Write> {
    out: W,
}

impl<W: Write> JunitReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn escape_xml(s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;")
    }

    fn testcase_open(endpoint: &Endpoint, duration_ms: u64) -> String {
        let classname = if endpoint.required {
            "required"
        } else {
            "optional"
        };
        format!(
            "    <testcase name=\"{}\" classname=\"{}.{}\" time=\"{:.3}\"",
            Self::escape_xml(&format!("{}:{}", endpoint.url, endpoint.port)),
            classname,
            endpoint.protocol,
            duration_ms as f64 / 1000.0
        )
    }

    /// The entry that aborted a fail-fast run is an `<error>` testcase
    pub fn format(report: &CheckReport) -> String {
        let mut xml = String::new();
        let errors = usize::from(report.abort_cause.is_some());
        let tests = report.summary.total + errors;

        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<testsuites tests=\"{}\" failures=\"{}\" errors=\"{}\" time=\"{:.3}\">\n",
            tests,
            report.summary.required_failed,
            errors,
            report.total_duration_ms as f64 / 1000.0
        ));
        xml.push_str(&format!(
            "  <testsuite name=\"reachability\" tests=\"{}\" failures=\"{}\" skipped=\"{}\" errors=\"{}\" time=\"{:.3}\">\n",
            tests,
            report.summary.required_failed,
            report.summary.optional_failed,
            errors,
            report.total_duration_ms as f64 / 1000.0
        ));

        for result in &report.results {
            let endpoint = &result.endpoint;
            xml.push_str(&Self::testcase_open(endpoint, result.outcome.duration_ms));

            if result.reachable() {
                xml.push_str(" />\n");
                continue;
            }

            xml.push_str(">\n");
            let message = result
                .error
                .as_deref()
                .or(result.outcome.detail.as_deref())
                .unwrap_or("unreachable");

            if endpoint.required {
                xml.push_str(&format!(
                    "      <failure message=\"{}\" type=\"Unreachable\" />\n",
                    Self::escape_xml(message)
                ));
            } else {
                xml.push_str(&format!(
                    "      <skipped message=\"{}\" />\n",
                    Self::escape_xml(message)
                ));
            }
            xml.push_str("    </testcase>\n");
        }

        if let Some(cause) = &report.abort_cause {
            xml.push_str(&Self::testcase_open(&cause.endpoint, 0));
            xml.push_str(">\n");
            xml.push_str(&format!(
                "      <error message=\"{}\" type=\"ProbeError\" />\n",
                Self::escape_xml(&cause.error)
            ));
            xml.push_str("    </testcase>\n");
        }

        xml.push_str("  </testsuite>\n");
        xml.push_str("</testsuites>\n");
        xml
    }
}

impl<W: Write> Reporter for JunitReporter<W> {
    fn report(&mut self, _result: &EndpointResult) -> Result<()> {
        Ok(())
    }

    fn abort(&mut self, _endpoint: &Endpoint, _error: &str) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self, report: &CheckReport) -> Result<()> {
        self.out.write_all(Self::format(report).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn buffers_output(&self) -> bool {
        true
    }
}

/// Get reporter based on output format
pub fn get_reporter(
    format: OutputFormat,
    use_colors: bool,
    verbose: bool,
    out: Box<dyn Write>,
) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Human => Box::new(HumanReporter::new(use_colors, out).with_verbose(verbose)),
        OutputFormat::Json => Box::new(JsonReporter::new(true, out)),
        OutputFormat::Junit => Box::new(JunitReporter::new(out)),
    }
}

/// Open the output destination, a file or stdout
pub fn open_output(file_path: Option<&std::path::Path>) -> std::io::Result<Box<dyn Write>> {
    match file_path {
        Some(path) => Ok(Box::new(std::fs::File::create(path)?)),
        None => Ok(Box::new(std::io::stdout())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Endpoint, Protocol};
    use crate::probes::ProbeOutcome;

    fn result(required: bool, reachable: bool) -> EndpointResult {
        let outcome = if reachable {
            ProbeOutcome::reachable(40)
        } else {
            ProbeOutcome::unreachable(5000).with_detail("timed out after 5000ms")
        };
        EndpointResult::new(Endpoint::new(required, "x", 1, Protocol::Https), outcome)
    }

    fn create_report() -> CheckReport {
        CheckReport::new(
            vec![
                result(true, true),
                result(true, false),
                result(false, true),
                result(false, false),
            ],
            5100,
        )
    }

    #[test]
    fn test_report_summary() {
        let report = create_report();
        assert_eq!(report.summary.total, 4);
        assert_eq!(report.summary.passed, 2);
        assert_eq!(report.summary.failed, 2);
        assert_eq!(report.summary.required_failed, 1);
        assert_eq!(report.summary.optional_failed, 1);
        assert_eq!(report.exit_code(), ExitCode::RequiredUnreachable);
    }

    #[test]
    fn test_optional_failures_do_not_fail_run() {
        let report = CheckReport::new(vec![result(true, true), result(false, false)], 10);
        assert!(report.all_required_reachable());
        assert_eq!(report.exit_code(), ExitCode::Success);
    }

    #[test]
    fn test_plain_lines() {
        let reporter = HumanReporter::new(false, Vec::new());
        assert_eq!(
            reporter.render_line(&result(true, true)),
            "Required url: x is open at port: 1"
        );
        assert_eq!(
            reporter.render_line(&result(true, false)),
            "Required url: x is CLOSED at port: 1"
        );
        assert_eq!(
            reporter.render_line(&result(false, true)),
            "Optional url: x is open at port: 1"
        );
        assert_eq!(
            reporter.render_line(&result(false, false)),
            "Optional url: x is CLOSED at port: 1"
        );
    }

    #[test]
    fn test_required_failure_renders_differently_from_optional() {
        let reporter = HumanReporter::new(true, Vec::new());
        let required = reporter.render_line(&result(true, false));
        let optional = reporter.render_line(&result(false, false));
        assert_ne!(required, optional);
        // bold red vs plain red
        assert!(required.contains("\u{1b}[1m"));
        assert!(!optional.contains("\u{1b}[1m"));
        assert!(optional.contains("\u{1b}[31m"));
    }

    #[test]
    fn test_error_and_verbose_detail() {
        let mut failed = result(true, false);
        failed.error = Some("HTTP request failed: connection refused".to_string());
        let reporter = HumanReporter::new(false, Vec::new()).with_verbose(true);
        assert!(reporter
            .render_line(&failed)
            .ends_with("(HTTP request failed: connection refused)"));

        let line = reporter.render_line(&result(false, false));
        assert!(line.contains("[5000ms, timed out after 5000ms]"));
    }

    #[test]
    fn test_human_reporter_streams_and_summarizes() {
        let report = create_report();
        let mut reporter = HumanReporter::new(false, Vec::new());
        for r in &report.results {
            reporter.report(r).unwrap();
        }
        reporter.finish(&report).unwrap();

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(output.lines().next(), Some("Required url: x is open at port: 1"));
        assert!(output.contains("Total: 4 | Open: 2 | Required closed: 1 | Optional closed: 1"));
        assert!(output.contains("Duration: 5100ms"));
    }

    #[test]
    fn test_json_reporter() {
        let report = create_report();
        let mut reporter = JsonReporter::new(true, Vec::new());
        reporter.report(&report.results[0]).unwrap();
        reporter.finish(&report).unwrap();

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["summary"]["total"], 4);
        assert_eq!(parsed["results"][0]["url"], "x");
        assert_eq!(parsed["results"][0]["protocol"], "https");
        assert_eq!(parsed["results"][1]["reachable"], false);
        assert_eq!(parsed["aborted"], false);
        assert!(parsed.get("abort_cause").is_none());
    }

    fn aborted_report() -> CheckReport {
        CheckReport::new(vec![result(true, true)], 60).into_aborted(
            Endpoint::required("b.example.com/health", 80, Protocol::Http),
            "HTTP request failed: connection refused",
        )
    }

    #[test]
    fn test_aborted_report_exit_code() {
        let report = aborted_report();
        assert!(report.aborted);
        assert!(report.all_required_reachable());
        assert_eq!(report.exit_code(), ExitCode::Aborted);
        assert!(!create_report().aborted);
    }

    #[test]
    fn test_human_abort_prints_one_error_line() {
        let report = aborted_report();
        let cause = report.abort_cause.clone().unwrap();
        let mut reporter = HumanReporter::new(false, Vec::new());
        reporter.report(&report.results[0]).unwrap();
        reporter.abort(&cause.endpoint, &cause.error).unwrap();
        reporter.finish(&report).unwrap();

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Required url: x is open at port: 1");
        assert_eq!(
            lines[1],
            "Error: check of b.example.com:80 failed, run aborted (HTTP request failed: connection refused)"
        );
    }

    #[test]
    fn test_json_reporter_flushes_partial_report_on_abort() {
        let report = aborted_report();
        let cause = report.abort_cause.clone().unwrap();
        let mut reporter = JsonReporter::new(false, Vec::new());
        reporter.report(&report.results[0]).unwrap();
        reporter.abort(&cause.endpoint, &cause.error).unwrap();
        reporter.finish(&report).unwrap();

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["aborted"], true);
        assert_eq!(parsed["results"].as_array().unwrap().len(), 1);
        assert_eq!(parsed["abort_cause"]["url"], "b.example.com/health");
        assert_eq!(
            parsed["abort_cause"]["error"],
            "HTTP request failed: connection refused"
        );
    }

    #[test]
    fn test_junit_reports_abort_as_error() {
        let output = JunitReporter::<Vec<u8>>::format(&aborted_report());
        assert!(output.contains("tests=\"2\" failures=\"0\" errors=\"1\""));
        assert_eq!(output.matches("<error message=").count(), 1);
        assert!(output.contains("name=\"b.example.com/health:80\""));
    }

    #[test]
    fn test_junit_reporter() {
        let output = JunitReporter::<Vec<u8>>::format(&create_report());

        assert!(output.contains("<?xml"));
        assert!(output.contains("<testsuite name=\"reachability\""));
        assert_eq!(output.matches("<failure").count(), 1);
        assert_eq!(output.matches("<skipped").count(), 1);
    }
}
