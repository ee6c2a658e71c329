//! NetZero data collector
//!
//! Collects energy usage, solar production, heat pump power draw and outdoor
//! temperature into a local SQLite database, and exports the per-day
//! aggregates as one CSV for comparison.
//!
//! # Commands
//!
//! - **collect**: fetches the selected sources concurrently, chunk by chunk.
//!   A source that keeps failing gives up without stopping its siblings.
//! - **format** (alias **export**): joins the daily aggregates by date.
//! - **list**: shows the built-in sources and the fields they need.
//! - **info**: shows the first and last stored day of every source.
//!
//! Ctrl-C or SIGTERM stops every source after its current chunk is committed,
//! so an interrupted run can simply be started again.

mod aggregate;
mod chunker;
mod collector;
mod config;
mod error;
mod export;
mod model;
mod sources;
mod store;

#[cfg(test)]
mod test_utils;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tokio::signal::ctrl_c;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::collector::{Collector, RangeRequest, RetryPolicy, SourceReport};
use crate::config::Settings;
use crate::error::StoreError;
use crate::export::Exporter;
use crate::model::SourceId;
use crate::store::Store;

const DEFAULT_DATABASE: &str = "netzero.sqlite3";

#[derive(Parser, Debug)]
#[command(name = "netzero", version, about = "Collects and formats data from multiple sources")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect data into the local database
    Collect(CollectArgs),
    /// Export daily aggregates as CSV
    #[command(visible_alias = "export")]
    Format(FormatArgs),
    /// List the available sources
    List,
    /// Show the stored date range of every source
    Info(InfoArgs),
}

/// One flag per built-in source.
#[derive(Args, Debug, Default)]
struct SourceFlags {
    /// Pepco Green Button files
    #[arg(long)]
    pepco: bool,
    /// SolarEdge monitoring API
    #[arg(long)]
    solar: bool,
    /// NOAA weather stations
    #[arg(long)]
    weather: bool,
    /// Symphony geothermal heat pump
    #[arg(long, visible_alias = "gshp")]
    heat_pump: bool,
}

impl SourceFlags {
    /// Selected sources in column order.
    fn selected(&self) -> Vec<SourceId> {
        SourceId::ALL
            .into_iter()
            .filter(|id| match id {
                SourceId::Pepco => self.pepco,
                SourceId::Solar => self.solar,
                SourceId::Weather => self.weather,
                SourceId::HeatPump => self.heat_pump,
            })
            .collect()
    }
}

#[derive(Args, Debug)]
struct CollectArgs {
    #[command(flatten)]
    sources: SourceFlags,

    /// First day to collect (default depends on the source)
    #[arg(short, long, value_name = "YYYY-MM-DD")]
    start: Option<NaiveDate>,

    /// Last day to collect (default depends on the source)
    #[arg(short, long, value_name = "YYYY-MM-DD")]
    end: Option<NaiveDate>,

    /// TOML file with a table per source
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// SQLite database, overriding `general.database`
    #[arg(short, long, value_name = "FILE")]
    database: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FormatArgs {
    #[command(flatten)]
    sources: SourceFlags,

    /// First exported day (default: earliest stored day)
    #[arg(short, long, value_name = "YYYY-MM-DD")]
    start: Option<NaiveDate>,

    /// Last exported day (default: latest stored day)
    #[arg(short, long, value_name = "YYYY-MM-DD")]
    end: Option<NaiveDate>,

    /// TOML file; only `general.database` is read
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database, overriding `general.database`
    #[arg(short, long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// CSV destination (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// TOML file; only `general.database` is read
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database, overriding `general.database`
    #[arg(short, long, value_name = "FILE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let app_config = config::load_app_config().context("Failed to load AppConfig")?;
    tracing_subscriber::fmt()
        .with_max_level(app_config.log_level())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let status = match cli.command {
        Command::Collect(args) => collect(args).await?,
        Command::Format(args) => format(args).await?,
        Command::List => {
            print!("{}", source_listing());
            ExitCode::SUCCESS
        }
        Command::Info(args) => info(args).await?,
    };
    Ok(status)
}

async fn collect(args: CollectArgs) -> error::Result<ExitCode> {
    let ids = args.sources.selected();
    if ids.is_empty() {
        tracing::info!("No sources selected, nothing to collect.");
        return Ok(ExitCode::SUCCESS);
    }

    // every selected source is validated before anything touches the network
    let settings = config::load_settings(&args.config)?;
    let adapters = sources::build_all(&ids, &settings)?;
    let policy = RetryPolicy::from_config(&config::load_collector_config()?);
    let store = open_store(args.database.as_deref(), &settings).await?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    tracing::info!("Running... Press Ctrl-C or send SIGTERM to stop after the current chunk.");
    let collector = Collector::new(store, policy, cancel);
    let request = RangeRequest {
        start: args.start,
        end: args.end,
    };
    let reports = collector
        .collect_all(&adapters, request, Local::now().date_naive())
        .await;

    log_reports(&reports);
    if any_failed(&reports) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn format(args: FormatArgs) -> error::Result<ExitCode> {
    let ids = args.sources.selected();
    if ids.is_empty() {
        tracing::info!("No sources selected, nothing to export.");
        return Ok(ExitCode::SUCCESS);
    }

    let settings = match &args.config {
        Some(path) => config::load_settings(path)?,
        None => Settings::default(),
    };
    let exporter = Exporter::new(open_store(args.database.as_deref(), &settings).await?);

    let rows = match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            exporter.export(&ids, args.start, args.end, file).await?
        }
        None => {
            exporter
                .export(&ids, args.start, args.end, std::io::stdout())
                .await?
        }
    };

    tracing::info!("Exported {} days.", rows);
    Ok(ExitCode::SUCCESS)
}

async fn info(args: InfoArgs) -> error::Result<ExitCode> {
    let settings = match &args.config {
        Some(path) => config::load_settings(path)?,
        None => Settings::default(),
    };
    let store = open_store(args.database.as_deref(), &settings).await?;

    print!("{}", database_info(&store).await?);
    Ok(ExitCode::SUCCESS)
}

/// One `<source>: <first> - <last>` line per registered source, `-` when
/// nothing is stored.
async fn database_info(store: &Store) -> Result<String, StoreError> {
    let mut info = String::new();
    for descriptor in sources::REGISTRY.iter() {
        store.ensure_source(descriptor.id).await?;
        let line = match store.date_span(descriptor.id).await? {
            Some((first, last)) => format!("{}: {} - {}\n", descriptor.id, first, last),
            None => format!("{}: -\n", descriptor.id),
        };
        info.push_str(&line);
    }
    Ok(info)
}

/// `--database` wins over `general.database`, which wins over the default.
fn database_path(database: Option<&Path>, settings: &Settings) -> PathBuf {
    database
        .or(settings.general.database.as_deref())
        .unwrap_or(Path::new(DEFAULT_DATABASE))
        .to_path_buf()
}

async fn open_store(database: Option<&Path>, settings: &Settings) -> error::Result<Store> {
    let path = database_path(database, settings);
    tracing::debug!("Opening database {}", path.display());
    Ok(Store::open(&path).await?)
}

/// Cancels `cancel` on the first SIGINT or SIGTERM.
async fn cancel_on_signal(cancel: CancellationToken) {
    let mut sig_term = match signal(SignalKind::terminate()) {
        Ok(sig_term) => sig_term,
        Err(e) => {
            tracing::error!("Failed to register SIGTERM handler: {:?}", e);
            if ctrl_c().await.is_ok() {
                tracing::info!("Received SIGINT. Stopping...");
                cancel.cancel();
            }
            return;
        }
    };

    tokio::select! {
        _ = sig_term.recv() => tracing::info!("Received SIGTERM. Stopping..."),
        _ = ctrl_c() => tracing::info!("Received SIGINT. Stopping..."),
    }
    cancel.cancel();
}

fn log_reports(reports: &[SourceReport]) {
    for report in reports {
        if report.is_failure() {
            tracing::error!("{}", report);
        } else {
            tracing::info!("{}", report);
        }
    }
}

fn any_failed(reports: &[SourceReport]) -> bool {
    reports.iter().any(SourceReport::is_failure)
}

/// Human-readable listing of the source registry.
fn source_listing() -> String {
    sources::REGISTRY
        .iter()
        .map(|d| {
            format!(
                "{:<10} {} [{}]\n{:<10} requires: {}\n",
                d.id.as_str(),
                d.summary,
                d.unit,
                "",
                d.required_fields.join(", ")
            )
        })
        .collect()
}
