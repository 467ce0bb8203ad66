//! Public S3 Bucket Auditor
//!
//! Runs one audit of a single account/region:
//! 1. Load configuration and AWS credentials
//! 2. List buckets (fatal on failure)
//! 3. Query IAM Access Analyzer for public bucket findings
//! 4. Probe each bucket with a throwaway object and an anonymous read
//! 5. Print one line per public bucket (or a JSON report)

use anyhow::{Context, Result};
use bucket_auditor::analyzer::AccessAnalyzerSource;
use bucket_auditor::config::{load_config, load_config_from_env, validate_config};
use bucket_auditor::public_endpoint::HttpPublicReader;
use bucket_auditor::store::S3Store;
use bucket_auditor::types::{EndpointStyle, OutputFormat};
use bucket_auditor::{session, Auditor, AuditorConfig, ExitStatus, ReportMode, RunControl};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// Find publicly accessible S3 buckets by probing and IAM Access Analyzer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// AWS region to audit
    #[arg(short, long)]
    region: Option<String>,

    /// Named profile from the shared AWS config
    #[arg(short, long)]
    profile: Option<String>,

    /// Reporting mode (analyzer-assisted, probe-only)
    #[arg(short, long)]
    mode: Option<ReportMode>,

    /// Output format (text, json)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Number of buckets probed concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    /// Timeout for each remote call in seconds
    #[arg(long)]
    call_timeout: Option<u64>,

    /// Stop starting new probes after this many seconds
    #[arg(long)]
    deadline: Option<u64>,

    /// Use a fixed probe object key instead of a random one
    #[arg(long)]
    probe_key: Option<String>,

    /// Anonymous read endpoint (default: https://s3.<region>.amazonaws.com)
    #[arg(long)]
    endpoint: Option<String>,

    /// Anonymous read URL style (virtual-host, path)
    #[arg(long)]
    endpoint_style: Option<EndpointStyle>,

    /// Only print fatal errors to stderr
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.quiet { "error" } else { args.log_level.as_str() };
    init_logging(level);

    let code = match run(args).await {
        Ok(status) => status.code(),
        Err(err) => {
            error!("{:#}", err);
            ExitStatus::Aborted.code()
        }
    };

    std::process::exit(code);
}

/// Initialize logging system (stderr, so stdout only carries the report)
fn init_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("Unknown log level: {}, using INFO", log_level);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

async fn run(args: Args) -> Result<ExitStatus> {
    let config = resolve_config(&args)?;

    info!(
        "Starting bucket audit v{} (region: {}, profile: {}, mode: {})",
        env!("CARGO_PKG_VERSION"),
        config.region,
        config.profile.as_deref().unwrap_or("default"),
        config.mode
    );

    let sdk_config = session::load_sdk_config(&config.region, config.profile.as_deref()).await;
    session::verify_credentials(&sdk_config, Duration::from_secs(config.call_timeout_secs))
        .await
        .context("Unable to load AWS config")?;

    let reader = HttpPublicReader::new(
        &config.public_endpoint_url(),
        config.endpoint_style,
        config.call_timeout_secs,
    )
    .context("Unable to build anonymous HTTP client")?;

    let auditor = Auditor::new(
        Arc::new(S3Store::new(&sdk_config)),
        Arc::new(reader),
        Arc::new(AccessAnalyzerSource::new(&sdk_config)),
        &config,
    );

    let mut control = RunControl::new();
    if let Some(secs) = config.run_deadline_secs {
        control = control.with_deadline(Duration::from_secs(secs));
    }
    setup_shutdown_handler(control.clone());

    let report = auditor.run(&control).await.context("Audit aborted")?;

    let mut stdout = std::io::stdout().lock();
    report
        .write_to(&mut stdout, config.output_format)
        .context("Unable to write report")?;

    info!(
        "{} public bucket(s) out of {} listed",
        report.public_count(),
        report.buckets_listed
    );

    Ok(report.exit_status())
}

/// Load, apply command line overrides, then validate once
fn resolve_config(args: &Args) -> Result<AuditorConfig> {
    let mut config = load_configuration(args.config.as_ref())?;
    apply_overrides(&mut config, args);
    validate_config(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Load configuration file, or environment only when no file is given
fn load_configuration(config_path: Option<&PathBuf>) -> Result<AuditorConfig> {
    match config_path {
        Some(path) => {
            info!("Loading configuration: {}", path.display());
            load_config(path).context("Failed to load configuration")
        }
        None => load_config_from_env().context("Failed to load configuration from environment"),
    }
}

/// Command line arguments override config file and environment
fn apply_overrides(config: &mut AuditorConfig, args: &Args) {
    if let Some(region) = &args.region {
        config.region = region.clone();
    }
    if let Some(profile) = &args.profile {
        config.profile = Some(profile.clone());
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(format) = args.format {
        config.output_format = format;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(timeout) = args.call_timeout {
        config.call_timeout_secs = timeout;
    }
    if let Some(deadline) = args.deadline {
        config.run_deadline_secs = Some(deadline);
    }
    if let Some(key) = &args.probe_key {
        config.probe_key = Some(key.clone());
    }
    if let Some(endpoint) = &args.endpoint {
        config.public_endpoint = Some(endpoint.clone());
    }
    if let Some(style) = args.endpoint_style {
        config.endpoint_style = style;
    }
}

/// Ctrl+C stops new probes; in-flight probes still clean up
fn setup_shutdown_handler(control: RunControl) {
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received Ctrl+C, finishing in-flight probes...");
                control.cancel();
            }
            Err(err) => {
                error!("Cannot listen to shutdown signal: {}", err);
            }
        }
    });
}
