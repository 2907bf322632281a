//! Stockwatch Screener - one-shot anomaly screening over a ticker universe.
//!
//! Loads configuration, runs a single screening pass, persists the ranked
//! watchlist, and prints a summary. Ctrl-C requests cooperative cancellation;
//! the run finishes cleanly between tickers and persists what it has.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use stockwatch_common::config::{Config, ScreeningMode};
use stockwatch_common::logging::init_logging;
use stockwatch_screener::data::YahooFinanceProvider;
use stockwatch_screener::screener::{report, ScreeningPipeline};
use stockwatch_screener::store::WatchlistStore;

#[derive(Parser, Debug)]
#[command(name = "stockwatch-screener", version, about = "Technical-indicator anomaly screener")]
struct Cli {
    /// Config file path (default: ~/.stockwatch/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured screening mode
    #[arg(long)]
    mode: Option<ScreeningMode>,

    /// Override the watchlist output path
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also write a markdown report next to the watchlist
    #[arg(long)]
    report: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(mode) = cli.mode {
        config.screener.mode = mode;
    }
    if let Some(output) = cli.output {
        config.screener.watchlist_path = output;
    }

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.screener.mode,
        universe = config.universe.len(),
        "Stockwatch Screener"
    );

    if config.universe.is_empty() {
        warn!(
            config = %cli.config.as_deref().map_or_else(
                || stockwatch_common::config::config_path().display().to_string(),
                |p| p.display().to_string(),
            ),
            "Ticker universe is empty; add entries under \"universe\" in the config"
        );
    }

    let provider =
        YahooFinanceProvider::with_timeout(Duration::from_secs(config.data.request_timeout_secs));
    let pipeline = ScreeningPipeline::new(
        provider,
        config.universe.clone(),
        config.screener.clone(),
        config.data.lookback_days,
    );

    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, finishing the current ticker and stopping");
            cancel.cancel();
        }
    });

    let (watchlist, summary) = pipeline.run().await;

    // Only a whole-universe fetch outage is unrecoverable. Runs where every
    // ticker fetched but lacked usable history still persist their (empty)
    // result and exit 0.
    if summary.total > 0 && !summary.cancelled && summary.fetch_failures() == summary.total {
        bail!(
            "no data source reachable: all {} tickers failed to fetch",
            summary.total
        );
    }

    let store = WatchlistStore::new(config.screener.watchlist_path.clone());
    let saved_to = store
        .save(&watchlist)
        .context("Failed to persist watchlist")?;

    if cli.report {
        let report_path = saved_to.with_extension("md");
        std::fs::write(&report_path, report::render_markdown(&watchlist, &summary))
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
        info!(path = %report_path.display(), "Wrote markdown report");
    }

    print!("{}", report::render_console(&watchlist, &summary));
    println!("Watchlist saved to {}", saved_to.display());

    Ok(())
}
