use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Network reachability checker for required and optional endpoints
#[derive(Parser, Debug)]
#[command(name = "reachcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (built-in catalog if omitted)
    #[arg(short, long, global = true, env = "REACHCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Suppress progress indicators and status banners
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe every catalog endpoint and report reachability
    Check(CheckArgs),

    /// Resolve every catalog host through DNS
    Diagnose(DiagnoseArgs),

    /// Write the built-in catalog to a configuration file
    Init(InitArgs),

    /// Validate a configuration file
    Validate(ValidateArgs),

    /// List the endpoints of the catalog
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Output format (defaults to the configured one)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormatArg>,

    /// Number of probes in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Stop at the first probe error instead of recording it and continuing
    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,

    /// TCP connect timeout in milliseconds
    #[arg(long)]
    pub tcp_timeout: Option<u64>,

    /// HTTP request timeout in milliseconds
    #[arg(long)]
    pub http_timeout: Option<u64>,

    /// NTP exchange timeout in milliseconds
    #[arg(long)]
    pub ntp_timeout: Option<u64>,

    /// Only check required endpoints
    #[arg(long, default_value_t = false)]
    pub required_only: bool,

    /// Disable colored output
    #[arg(long, default_value_t = false)]
    pub no_color: bool,

    /// Write output to file
    #[arg(long)]
    pub output_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DiagnoseArgs {
    /// DNS lookup timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub timeout: u64,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormatArg::Human)]
    pub output: OutputFormatArg,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Output path for the configuration file
    #[arg(short, long, default_value = "./reachcheck.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(default_value = "./reachcheck.toml")]
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list required endpoints
    #[arg(long, default_value_t = false)]
    pub required_only: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormatArg {
    #[default]
    Human,
    Json,
    Junit,
}

impl From<OutputFormatArg> for crate::config::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => crate::config::OutputFormat::Human,
            OutputFormatArg::Json => crate::config::OutputFormat::Json,
            OutputFormatArg::Junit => crate::config::OutputFormat::Junit,
        }
    }
}

impl CheckArgs {
    /// Colors only go to a terminal, and never with `--no-color`
    pub fn use_colors(&self, stdout_is_term: bool) -> bool {
        stdout_is_term && self.output_file.is_none() && !self.no_color
    }

    /// Fold command-line overrides into the loaded configuration
    pub fn apply_to(&self, config: &mut crate::config::Config) {
        if let Some(ms) = self.tcp_timeout {
            config.global.tcp_timeout_ms = ms;
        }
        if let Some(ms) = self.http_timeout {
            config.global.http_timeout_ms = ms;
        }
        if let Some(ms) = self.ntp_timeout {
            config.global.ntp_timeout_ms = ms;
        }
        if let Some(n) = self.concurrency {
            config.global.concurrency = n;
        }
        if self.fail_fast {
            config.global.fail_fast = true;
        }
        if let Some(format) = self.output {
            config.global.output_format = format.into();
        }
    }
}
