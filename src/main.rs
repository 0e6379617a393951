//! Polite-Crawler main entry point
//!
//! This is the command-line interface for the polite crawler core.

use anyhow::Context;
use clap::Parser;
use polite_crawler::config::{load_config, Config};
use polite_crawler::output::print_summary;
use polite_crawler::Orchestrator;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Polite-Crawler: a polite, resilient web crawler
///
/// Crawls pages reachable from a seed URL while respecting robots.txt,
/// spacing requests per origin and refusing to reach internal addresses.
#[derive(Parser, Debug)]
#[command(name = "polite-crawler")]
#[command(version)]
#[command(about = "A polite, resilient web crawler", long_about = None)]
struct Cli {
    /// Seed URL to start crawling from
    #[arg(value_name = "SEED")]
    seed: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the maximum link depth
    #[arg(long)]
    max_depth: Option<u32>,

    /// Override the number of concurrent workers
    #[arg(long)]
    workers: Option<u32>,

    /// Stop after this many pages have been processed
    #[arg(long)]
    max_pages: Option<u64>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;

    let orchestrator = Orchestrator::new(config).context("failed to set up crawler")?;

    // Ctrl-C lets in-flight fetches finish and then ends the run
    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight requests");
            stop.cancel();
        }
    });

    let summary = orchestrator
        .run(&cli.seed)
        .await
        .with_context(|| format!("crawl from {} failed", cli.seed))?;

    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Loads the config file (or defaults) and applies command-line overrides
///
/// The result is validated when the orchestrator is built.
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(depth) = cli.max_depth {
        config.crawler.max_depth = depth;
    }
    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = Some(max_pages);
    }

    Ok(config)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("polite_crawler=info,warn"),
            1 => EnvFilter::new("polite_crawler=debug,info"),
            2 => EnvFilter::new("polite_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
