use clap::Parser;
use console::style;
use reachcheck::{
    cli::{CheckArgs, Cli, Commands, DiagnoseArgs, InitArgs, ListArgs, OutputFormatArg, ValidateArgs},
    config::{validate_config, Config, OutputFormat},
    error::ExitCode,
    network::{format_diagnostics, run_diagnostics},
    output::{get_reporter, open_output},
    probes::ProbeSet,
    runner::{ProbeRunner, RunnerConfig},
    AppError,
};
use std::path::Path;
use std::process::ExitCode as StdExitCode;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> StdExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            e.exit_code()
        }
    };

    StdExitCode::from(exit_code as u8)
}

/// Logs go to stderr so report output on stdout stays parseable
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "reachcheck=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> reachcheck::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default_config(),
    };

    // Apply environment variable overrides
    config.apply_env_overrides();
    Ok(config)
}

async fn run(cli: Cli) -> reachcheck::Result<ExitCode> {
    match cli.command {
        Commands::Check(args) => run_check(args, cli.config.as_deref(), cli.verbose, cli.quiet).await,
        Commands::Diagnose(args) => run_diagnose(args, cli.config.as_deref(), cli.quiet).await,
        Commands::Init(args) => run_init(args),
        Commands::Validate(args) => run_validate(args),
        Commands::List(args) => run_list(args, cli.config.as_deref()),
    }
}

async fn run_check(
    args: CheckArgs,
    config_path: Option<&Path>,
    verbose: bool,
    quiet: bool,
) -> reachcheck::Result<ExitCode> {
    let mut config = load_config(config_path)?;
    args.apply_to(&mut config);

    for warning in validate_config(&config)? {
        warn!("{}", warning);
    }

    let catalog = if args.required_only {
        config.catalog().required_only()
    } else {
        config.catalog()
    };

    let format = config.global.output_format;
    let use_colors = args.use_colors(console::Term::stdout().is_term());

    if format == OutputFormat::Human && args.output_file.is_none() && !quiet {
        let required = catalog.iter().filter(|e| e.required).count();
        println!(
            "{} Checking {} endpoints ({} required, {} optional)...",
            style("[*]").cyan(),
            catalog.len(),
            required,
            catalog.len() - required
        );
    }

    let out = open_output(args.output_file.as_deref())?;
    let mut reporter = get_reporter(format, use_colors, verbose, out);
    let show_progress = !quiet && reporter.buffers_output();

    let runner = ProbeRunner::new(
        RunnerConfig::from_config(&config, None, false, show_progress),
        ProbeSet::from_config(&config.global),
    );
    let report = runner.run(&catalog, reporter.as_mut()).await?;

    Ok(report.exit_code())
}

async fn run_diagnose(
    args: DiagnoseArgs,
    config_path: Option<&Path>,
    quiet: bool,
) -> reachcheck::Result<ExitCode> {
    let config = load_config(config_path)?;
    let catalog = config.catalog();

    if !quiet && args.output == OutputFormatArg::Human {
        println!(
            "{} Resolving {} hosts...",
            style("[*]").cyan(),
            catalog.hosts().len()
        );
    }

    let diagnostics = run_diagnostics(&catalog, Duration::from_millis(args.timeout)).await;

    match args.output {
        OutputFormatArg::Json => {
            let json = serde_json::to_string_pretty(&diagnostics)?;
            println!("{}", json);
        }
        _ => {
            let use_colors = console::Term::stdout().is_term();
            print!("{}", format_diagnostics(&diagnostics, use_colors));
        }
    }

    if diagnostics.has_failures() {
        Ok(ExitCode::NetworkFailure)
    } else {
        Ok(ExitCode::Success)
    }
}

fn run_init(args: InitArgs) -> reachcheck::Result<ExitCode> {
    let output_path = &args.output;

    // Check if file exists
    if output_path.exists() && !args.force {
        return Err(AppError::Config(format!(
            "File already exists: {}. Use --force to overwrite.",
            output_path.display()
        )));
    }

    let config = Config::default_config();
    let toml = config.to_toml()?;
    std::fs::write(output_path, toml)?;

    println!(
        "{} Configuration file created: {}",
        style("[+]").green(),
        output_path.display()
    );
    println!("Edit the file to adjust the endpoint catalog and timeouts.");

    Ok(ExitCode::Success)
}

fn run_validate(args: ValidateArgs) -> reachcheck::Result<ExitCode> {
    let config_path = &args.path;

    if !config_path.exists() {
        return Err(AppError::FileNotFound(config_path.display().to_string()));
    }

    let config = Config::from_file(config_path)?;
    let warnings = validate_config(&config)?;

    println!(
        "{} Configuration file is valid: {}",
        style("[+]").green(),
        config_path.display()
    );

    if !warnings.is_empty() {
        println!("\n{}", style("Warnings:").yellow());
        for warning in &warnings {
            println!("  {} {}", style("!").yellow(), warning);
        }
    }

    let required = config.endpoints.iter().filter(|e| e.required).count();
    println!("\n{}", style("Configuration Summary:").bold());
    println!(
        "  Timeouts: tcp {}ms, http {}ms, ntp {}ms",
        config.global.tcp_timeout_ms, config.global.http_timeout_ms, config.global.ntp_timeout_ms
    );
    println!("  Concurrency: {}", config.global.concurrency);
    println!("  Fail fast: {}", config.global.fail_fast);
    println!("  Output: {}", config.global.output_format);
    println!(
        "  Endpoints: {} ({} required, {} optional)",
        config.endpoints.len(),
        required,
        config.endpoints.len() - required
    );

    if warnings.is_empty() {
        Ok(ExitCode::Success)
    } else {
        Ok(ExitCode::ConfigError)
    }
}

fn run_list(args: ListArgs, config_path: Option<&Path>) -> reachcheck::Result<ExitCode> {
    let config = load_config(config_path)?;
    let catalog = if args.required_only {
        config.catalog().required_only()
    } else {
        config.catalog()
    };

    println!("\nEndpoint Catalog");
    println!("================\n");

    for endpoint in &catalog {
        let kind = if endpoint.required {
            style("required").bold()
        } else {
            style("optional").dim()
        };
        println!(
            "  {:<8} {:<6} {}:{}{}",
            kind,
            style(endpoint.protocol).cyan(),
            endpoint.host(),
            endpoint.port,
            endpoint.path().unwrap_or("")
        );
    }

    Ok(ExitCode::Success)
}
