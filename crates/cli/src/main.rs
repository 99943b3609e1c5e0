mod metrics;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use showcrawl_core::{
    load_config, run_consumer, run_producer, validate_config, Config, EztvSource, IngestionStore,
    MessageQueue, QueueOptions, SqliteIngestionStore, SqliteQueue,
};

/// Incremental EZTV show crawler feeding a torrent ingestion table
#[derive(Parser, Debug)]
#[command(name = "showcrawl", version, about)]
struct Cli {
    /// Configuration file (defaults apply when it does not exist)
    #[arg(short, long, default_value = "showcrawl.toml")]
    config: PathBuf,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Write Prometheus text metrics here on exit
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Refresh, resolve and publish batches
    Produce {
        /// Crawl the listing even if the cache is fresh
        #[arg(long)]
        refresh: bool,
    },

    /// Ingest batches until end of stream
    Consume,

    /// Run a producer and a consumer side by side
    Run {
        /// Crawl the listing even if the cache is fresh
        #[arg(long)]
        refresh: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    let result = run(&cli).await;

    if let Some(path) = &cli.metrics_out {
        if let Err(e) = write_metrics(path) {
            error!("Failed to write metrics: {:#}", e);
        }
    }

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        info!("Loading configuration from {:?}", path);
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
    } else {
        info!("No configuration at {:?}, using defaults", path);
        Config::default()
    };

    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

fn open_queue(config: &Config) -> Result<Arc<dyn MessageQueue>> {
    let queue = SqliteQueue::new(&config.queue.path, QueueOptions::from(&config.queue))
        .with_context(|| format!("Failed to open queue at {:?}", config.queue.path))?;
    info!(queue = %queue.name(), path = ?config.queue.path, "Queue opened");
    Ok(Arc::new(queue))
}

fn open_store(config: &Config) -> Result<Arc<dyn IngestionStore>> {
    let table = config.store.effective_table(config.pipeline.debug_mode);
    let store = SqliteIngestionStore::new(&config.store.path, &table)
        .with_context(|| format!("Failed to open store at {:?}", config.store.path))?;
    info!(table = %store.table(), path = ?config.store.path, "Ingestion store opened");
    Ok(Arc::new(store))
}

async fn run(cli: &Cli) -> Result<()> {
    let config = load(&cli.config)?;
    if config.pipeline.debug_mode {
        info!(
            limit = config.pipeline.debug_processing_limit,
            "Debug mode: processing is capped"
        );
    }

    match cli.command {
        Command::Produce { refresh } => {
            let queue = open_queue(&config)?;
            let source = EztvSource::new(config.source.clone())?;
            let summary = run_producer(&config, &source, queue.as_ref(), refresh).await?;
            let summary = serde_json::to_string(&summary)?;
            info!("Produce complete: {}", summary);
        }
        Command::Consume => {
            let queue = open_queue(&config)?;
            let store = open_store(&config)?;
            let summary = run_consumer(&config, store.as_ref(), queue.as_ref()).await?;
            let summary = serde_json::to_string(&summary)?;
            info!("Consume complete: {}", summary);
        }
        Command::Run { refresh } => {
            let queue = open_queue(&config)?;
            let store = open_store(&config)?;
            let source = EztvSource::new(config.source.clone())?;

            // A failing side aborts the other; the consumer would otherwise
            // wait forever for a marker that never comes.
            let (produced, consumed) = tokio::try_join!(
                run_producer(&config, &source, queue.as_ref(), refresh),
                run_consumer(&config, store.as_ref(), queue.as_ref()),
            )
            .context("Pipeline run failed")?;
            let produced = serde_json::to_string(&produced)?;
            let consumed = serde_json::to_string(&consumed)?;
            info!("Run complete: produced {}, consumed {}", produced, consumed);
        }
    }

    Ok(())
}

fn write_metrics(path: &Path) -> Result<()> {
    let text = metrics::encode_metrics()?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}
