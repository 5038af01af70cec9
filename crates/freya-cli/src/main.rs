use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDateTime, Timelike, Utc};
use clap::{Parser, Subcommand};
use freya_adapters::{adapter_for_source, load_fixture_bundle};
use freya_core::{classify_age, normalize, normalize_batch, parse_datetime, Dataset};
use freya_sync::export::write_csv;
use freya_sync::{SourceRegistry, SyncConfig, SyncPipeline};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "freya")]
#[command(about = "Freya job board aggregator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every enabled source once and export the dataset.
    Sync,
    /// Normalize one captured listing and print the CSV table to stdout.
    Normalize {
        /// Fixture bundle, or a JSON array of raw jobs with `--raw`.
        input: PathBuf,
        #[arg(long)]
        source: String,
        /// Run timestamp; defaults to now (UTC).
        #[arg(long)]
        run_at: Option<String>,
        #[arg(long)]
        raw: bool,
    },
    /// Print the freshness class for a first-seen / last-seen pair.
    Classify { first_seen: String, last_seen: String },
    /// Run the sync on its cron schedule until Ctrl-C.
    Schedule,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_run_at(value: Option<&str>) -> Result<NaiveDateTime> {
    match value {
        Some(text) => parse_datetime(text)
            .with_context(|| format!("unrecognized --run-at timestamp {text:?}")),
        None => {
            let now = Utc::now().naive_utc();
            Ok(now.with_nanosecond(0).unwrap_or(now))
        }
    }
}

fn normalize_command(
    input: PathBuf,
    source_id: &str,
    run_at: Option<&str>,
    raw: bool,
) -> Result<()> {
    let config = SyncConfig::from_env();
    let registry = SourceRegistry::load(config.registry_path())?;
    let source = registry
        .find(source_id)
        .with_context(|| format!("source {source_id} is not in the registry"))?;
    let context = source.context();
    let run_at = parse_run_at(run_at)?;

    let records = if raw {
        let text = std::fs::read_to_string(&input)
            .with_context(|| format!("reading {}", input.display()))?;
        let batch: serde_json::Value =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", input.display()))?;
        let outcome = normalize_batch(&batch, &context, run_at)
            .with_context(|| format!("normalizing {}", input.display()))?;
        if outcome.skipped > 0 {
            warn!(skipped = outcome.skipped, "raw batch contained non-object entries");
        }
        outcome.records
    } else {
        let adapter = adapter_for_source(source_id)
            .with_context(|| format!("no adapter registered for {source_id}"))?;
        let bundle = load_fixture_bundle(&input)?;
        adapter
            .parse_listing(&bundle)
            .with_context(|| format!("parsing {source_id} listing"))?
            .iter()
            .map(|job| normalize(job, &context, run_at))
            .collect()
    };

    info!(source_id, records = records.len(), "normalized");
    write_csv(&Dataset::from_records(&records), std::io::stdout().lock())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let summary = freya_sync::run_sync_once_from_env().await?;
            println!(
                "sync complete: run_id={} sources={} failed={} rows={} reports={}",
                summary.run_id,
                summary.enabled_sources,
                summary.failed_sources.len(),
                summary.exported_rows,
                summary.reports_dir
            );
        }
        Commands::Normalize {
            input,
            source,
            run_at,
            raw,
        } => normalize_command(input, &source, run_at.as_deref(), raw)?,
        Commands::Classify {
            first_seen,
            last_seen,
        } => {
            println!("{}", classify_age(&first_seen, &last_seen));
        }
        Commands::Schedule => {
            let mut config = SyncConfig::from_env();
            config.scheduler_enabled = true;
            let cron = config.sync_cron.clone();
            let pipeline = Arc::new(SyncPipeline::new(config));
            let Some(mut sched) = pipeline.maybe_build_scheduler().await? else {
                bail!("scheduler could not be built");
            };
            sched.start().await.context("starting scheduler")?;
            info!(%cron, "scheduler started; press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")?;
            sched.shutdown().await.context("stopping scheduler")?;
        }
    }

    Ok(())
}
