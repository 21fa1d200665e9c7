use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use telegram_analytics::config::AppConfig;
use telegram_analytics::db::Database;
use telegram_analytics::detect::YoloDetector;
use telegram_analytics::logging::init_logging;
use telegram_analytics::pipeline::{new_data_available, Pipeline};
use telegram_analytics::{detection_loader, enrich, metrics, raw_loader, repository, transform};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline once
    Run,

    /// Load scraped JSON dumps into the raw messages table
    LoadRaw,

    /// Run the transform stage on its own
    Transform,

    /// Run object detection over scraped images and write the artifact
    Enrich,

    /// Load the detections artifact into the detections table
    LoadDetections,

    /// Poll for new raw data and run the pipeline when some appears
    Watch {
        /// Seconds between scans (defaults to the configured interval)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Read-only analytics over the derived fact table
    Report {
        #[command(subcommand)]
        report: ReportCommands,
    },
}

#[derive(Subcommand)]
enum ReportCommands {
    /// The most active channels by message count
    TopChannels {
        /// Maximum number of channels to return
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Posting activity for one channel, with a per-day histogram
    Activity {
        /// Channel name
        #[arg(short, long)]
        channel: String,
    },

    /// Keyword search over message text
    Search {
        /// Keyword to search for
        #[arg(short, long)]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration; the direct env overrides are resolved once here
    // so every stage sees the same values
    let mut config = AppConfig::load()?;
    config.database.path = config.get_database_path();
    config.detection.model_path = config.get_model_path();

    // Initialize logging; the guard keeps file output alive
    let _log_guard = init_logging(&config.logging, Some(&config.get_log_level()))?;
    metrics::describe();

    info!("Starting telegram-analytics");

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_pipeline(&config)?,
        Commands::LoadRaw => {
            let summary = raw_loader::load_raw_messages(&config)?;
            info!(
                "Raw load complete: {} rows from {} files ({} skipped)",
                summary.rows_upserted,
                summary.files_loaded,
                summary.skipped.len()
            );
        }
        Commands::Transform => {
            let runner = transform::from_config(&config);
            info!("Running {} transform", runner.name());
            runner.run(&config)?;
        }
        Commands::Enrich => {
            let mut detector = YoloDetector::from_config(&config.detection)?;
            let summary = enrich::enrich_images(&config, &mut detector)?;
            info!(
                "Enrichment complete: {} detections from {} of {} images",
                summary.detections, summary.images_processed, summary.images_found
            );
        }
        Commands::LoadDetections => {
            let summary = detection_loader::load_detections(&config)?;
            info!(
                "Detection load complete: {} of {} rows inserted",
                summary.rows_inserted, summary.rows_read
            );
        }
        Commands::Watch { interval } => watch(&config, interval).await?,
        Commands::Report { report } => run_report(&config, &report)?,
    }

    Ok(())
}

/// Run the full pipeline once, reporting the outcome.
fn run_pipeline(config: &AppConfig) -> Result<()> {
    let mut pipeline = Pipeline::from_config(config)?;
    let report = pipeline.run().context("Pipeline run failed")?;
    info!(
        "Run summary: {} messages loaded, {} detections written, {} detections loaded",
        report.raw.rows_upserted, report.enrich.detections, report.detections.rows_inserted
    );
    Ok(())
}

/// Sensor loop: trigger a run whenever any file exists under the raw root.
///
/// A failed run is logged and never retried automatically; the next scan
/// interval decides when the pipeline runs again. Idempotent loaders make
/// the re-run safe.
async fn watch(config: &AppConfig, interval: Option<u64>) -> Result<()> {
    let poll = Duration::from_secs(interval.unwrap_or(config.watch.poll_interval_secs));
    let root = config.ingest.raw_data_root.clone();
    info!(
        "Watching {} every {}s for new data",
        root,
        poll.as_secs()
    );

    loop {
        if new_data_available(Path::new(&root)) {
            info!("New data detected under {}", root);
            match run_pipeline(config) {
                Ok(()) => {}
                Err(e) => error!("Triggered run failed: {e:#}"),
            }
        } else {
            warn!("No data under {}; nothing to do", root);
        }
        tokio::time::sleep(poll).await;
    }
}

/// Execute one analytics report and print it as JSON.
#[allow(clippy::print_stdout)]
fn run_report(config: &AppConfig, report: &ReportCommands) -> Result<()> {
    let db = Database::open_path(Path::new(&config.database.path))?;

    let rendered = match report {
        ReportCommands::TopChannels { limit } => {
            let channels = repository::top_channels(&db, *limit)?;
            serde_json::to_string_pretty(&channels)?
        }
        ReportCommands::Activity { channel } => {
            let activity = repository::channel_activity(&db, channel)?
                .with_context(|| format!("Channel not found: {channel}"))?;
            serde_json::to_string_pretty(&activity)?
        }
        ReportCommands::Search { query } => {
            let hits = repository::search_messages(&db, query)?;
            serde_json::to_string_pretty(&hits)?
        }
    };

    println!("{rendered}");
    Ok(())
}
