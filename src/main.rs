//! CLI entry point for the Ara loopback bench tooling.
//!
//! Provides subcommands for retrieving a raw loopback capture from the AP,
//! compiling it into per-device averages, generating the chart report, and
//! listing the power modes a campaign steps through.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ara_loopback::aggregator::{self, AggregateOutput, AggregateRequest};
use ara_loopback::command::{LoopbackCommand, TestType};
use ara_loopback::modes::POWER_MODES;
use ara_loopback::output::{self, RunSummary};
use ara_loopback::registry::{Bridge, Registry, loopback_mask};
use ara_loopback::report::{self, ChartScenario};
use ara_loopback::transfer::{RemoteCapture, ScpTransfer, fetch_capture};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "ara_loopback")]
#[command(about = "Compile Greybus loopback captures into per-device tables and charts", long_about = None)]
struct Cli {
    /// Log debug output on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Campaign {
    /// Loopback operation type (sink, transfer, ping)
    #[arg(short, long, default_value = "sink")]
    test: TestType,

    /// Operation payload size in bytes
    #[arg(short, long, default_value_t = 512)]
    size: u32,

    /// Number of operations per run
    #[arg(short, long, default_value_t = 10)]
    iterations: u32,

    /// Bridges under test (APB2, APB3, GPB1, ALL)
    #[arg(short, long, num_args = 1.., default_value = "APB2")]
    bridge: Vec<String>,
}

impl Campaign {
    fn bridges(&self) -> Result<Vec<Bridge>> {
        Ok(Bridge::parse_list(&self.bridge)?)
    }
}

#[derive(Args, Clone)]
struct Charts {
    /// Chart layout (T1: one bridge, T2: two bridges); picked from the bridge count if omitted
    #[arg(short, long)]
    charts: Option<ChartScenario>,

    /// Explicit template file, overriding the scenario's template
    #[arg(long, value_name = "ODS")]
    template: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a raw capture per device and average the trials of each power mode
    Process {
        /// Raw capture written by loopback_test
        #[arg(value_name = "CSV")]
        csv: PathBuf,

        #[command(flatten)]
        campaign: Campaign,

        /// Directory for the derived CSV files (defaults to the capture's directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// JSON file overriding device id to name mapping
        #[arg(long)]
        registry: Option<PathBuf>,
    },
    /// Process a raw capture and fill a chart template with the results
    Report {
        #[arg(value_name = "CSV")]
        csv: PathBuf,

        #[command(flatten)]
        campaign: Campaign,

        #[command(flatten)]
        charts: Charts,

        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        #[arg(long)]
        registry: Option<PathBuf>,
    },
    /// Copy a capture from the AP and prefix it with its capture date
    Fetch {
        /// IP/hostname of the AP
        host: String,

        #[command(flatten)]
        campaign: Campaign,

        /// Login user on the AP
        #[arg(short, long, default_value = "root")]
        user: String,

        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Also process the capture and generate charts
        #[arg(long)]
        report: bool,

        #[command(flatten)]
        charts: Charts,

        #[arg(long)]
        registry: Option<PathBuf>,
    },
    /// List the power modes with the SVC and AP commands a campaign runs for each
    Modes {
        #[command(flatten)]
        campaign: Campaign,

        /// Only print the SVC commands for this port
        #[arg(short, long)]
        port: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let cli = Cli::parse();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/ara_loopback.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ara_loopback.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(stderr_level.into()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    match cli.command {
        Commands::Process {
            csv,
            campaign,
            out_dir,
            registry,
        } => {
            let registry = load_registry(registry.as_deref())?;
            let out_dir = out_dir.unwrap_or_else(|| parent_dir(&csv));
            let aggregate = process(&csv, &campaign, &out_dir, &registry)?;
            finish(
                RunSummary {
                    raw: csv,
                    aggregate,
                    report: None,
                },
                cli.json,
            )?;
        }
        Commands::Report {
            csv,
            campaign,
            charts,
            out_dir,
            registry,
        } => {
            let registry = load_registry(registry.as_deref())?;
            let out_dir = out_dir.unwrap_or_else(|| parent_dir(&csv));
            let summary = process_and_report(csv, &campaign, &charts, &out_dir, &registry)?;
            finish(summary, cli.json)?;
        }
        Commands::Fetch {
            host,
            campaign,
            user,
            out_dir,
            report,
            charts,
            registry,
        } => {
            let remote = RemoteCapture {
                host,
                user,
                test: campaign.test,
                size: campaign.size,
                iterations: campaign.iterations,
            };
            let csv = fetch_capture(&ScpTransfer::new(), &remote, &out_dir).await?;
            info!(path = %csv.display(), "All measurement data logged");

            if report {
                let registry = load_registry(registry.as_deref())?;
                let summary = process_and_report(csv, &campaign, &charts, &out_dir, &registry)?;
                finish(summary, cli.json)?;
            }
        }
        Commands::Modes { campaign, port } => list_modes(&campaign, port)?,
    }

    Ok(())
}

fn load_registry(path: Option<&Path>) -> Result<Registry> {
    match path {
        Some(path) => Ok(Registry::load(path)?),
        None => Ok(Registry::builtin()),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Runs the aggregator for the bridges of `campaign`.
fn process(csv: &Path, campaign: &Campaign, out_dir: &Path, registry: &Registry) -> Result<AggregateOutput> {
    let request = AggregateRequest {
        test: campaign.test,
        size: campaign.size,
        iterations: campaign.iterations,
        device_ids: campaign
            .bridges()?
            .into_iter()
            .map(Bridge::device_id)
            .collect(),
        out_dir: out_dir.to_path_buf(),
    };

    aggregator::aggregate(csv, &request, registry)
        .with_context(|| format!("post-processing {}", csv.display()))
}

fn process_and_report(
    csv: PathBuf,
    campaign: &Campaign,
    charts: &Charts,
    out_dir: &Path,
    registry: &Registry,
) -> Result<RunSummary> {
    let aggregate = process(&csv, campaign, out_dir, registry)?;

    let template = match &charts.template {
        Some(path) => path.clone(),
        None => {
            let scenario = charts
                .charts
                .unwrap_or_else(|| ChartScenario::for_device_count(aggregate.devices.len()));
            info!(%scenario, "Generating charts");
            scenario.template_path(&report::template::template_dir())
        }
    };

    let report_path = aggregate.capture.charts_file(out_dir);
    report::fill_report(
        &template,
        &aggregate.aggregate,
        &report::sheet_sources(&aggregate),
        &csv,
        &report_path,
    )
    .with_context(|| format!("generating charts into {}", report_path.display()))?;

    Ok(RunSummary {
        raw: csv,
        aggregate,
        report: Some(report_path),
    })
}

fn finish(summary: RunSummary, json: bool) -> Result<()> {
    output::print_pretty(&summary);
    if json {
        output::print_json(&summary)?;
    } else {
        output::log_summary(&summary);
    }
    Ok(())
}

/// Prints, for each power mode, the SVC link commands (APB1 on port 0, then
/// each bridge on port `id - 1`) and the AP command run three times.
///
/// With `port`, only that port's SVC commands are listed.
fn list_modes(campaign: &Campaign, port: Option<u32>) -> Result<()> {
    let bridges = campaign.bridges()?;
    let mask = loopback_mask(&bridges);

    for (count, mode) in POWER_MODES.iter().enumerate() {
        println!("Test ({}) - {}", count + 1, mode.name);
        if let Some(port) = port {
            for cmd in mode.commands_for(port) {
                println!("  svc> {}", cmd);
            }
            continue;
        }
        let ports = std::iter::once(0).chain(bridges.iter().map(|b| b.device_id() - 1));
        for port in ports {
            for cmd in mode.commands_for(port) {
                println!("  svc> {}", cmd);
            }
        }

        let command = LoopbackCommand {
            test: campaign.test,
            size: campaign.size,
            iterations: campaign.iterations,
            mask,
            label: mode.name.to_string(),
        };
        for _ in 0..aggregator::TRIALS_PER_CONFIGURATION {
            println!("  ap>  {}", command);
        }
    }

    Ok(())
}
