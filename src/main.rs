//! nestcrawl main entry point
//!
//! This is the command-line interface for the nestcrawl directory crawler.

use anyhow::Context;
use clap::Parser;
use nestcrawl::config::{load_config, resolve_cache_root, validate, Config};
use nestcrawl::output::print_summary;
use nestcrawl::pipeline::StopPolicy;
use nestcrawl::{HttpFetcher, PageCache, Pipeline};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// nestcrawl: a three-level directory crawler
///
/// nestcrawl walks a directory of regions, areas and leaf items, caches every
/// page it loads on disk, and writes one CSV row per leaf item.
#[derive(Parser, Debug)]
#[command(name = "nestcrawl")]
#[command(version)]
#[command(about = "A three-level directory crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Directory for cached pages
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Path of the CSV output file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Number of workers for every stage
    #[arg(short, long)]
    workers: Option<usize>,

    /// Stop after this many leaf records
    #[arg(short, long)]
    limit: Option<usize>,

    /// Index page listing the regions
    #[arg(long, value_name = "URL")]
    index_url: Option<String>,

    /// Validate config and show the effective settings without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {:#}", e);
            return Err(e);
        }
    };

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    match handle_crawl(config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!("Crawl failed: {:#}", e);
            Err(e)
        }
    }
}

/// Sets up the logging/tracing subscriber
///
/// `LOG_LEVEL` takes precedence over the verbosity flags.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = match std::env::var("LOG_LEVEL") {
        Ok(level) if !level.trim().is_empty() => EnvFilter::new(level),
        _ if quiet => EnvFilter::new("error"),
        _ => match verbose {
            0 => EnvFilter::new("nestcrawl=info,warn"),
            1 => EnvFilter::new("nestcrawl=debug,info"),
            2 => EnvFilter::new("nestcrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (if any) and applies command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)?
        }
        None => Config::default(),
    };

    if let Some(dir) = &cli.cache_dir {
        config.cache.root = Some(dir.clone());
    }
    if let Some(path) = &cli.output {
        config.output.path = path.clone();
    }
    if let Some(workers) = cli.workers {
        config.crawler.set_all_workers(workers);
    }
    if let Some(limit) = cli.limit {
        config.crawler.stop = StopPolicy::Count { limit };
    }
    if let Some(url) = &cli.index_url {
        config.crawler.index_url = url.clone();
    }

    // Overrides may have broken what the file got right
    validate(&config).context("invalid command-line override")?;
    Ok(config)
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== nestcrawl Dry Run ===\n");

    println!("Crawler:");
    println!("  Index URL: {}", config.crawler.index_url);
    println!(
        "  Workers: {} region, {} area, {} leaf",
        config.crawler.region_workers, config.crawler.area_workers, config.crawler.leaf_workers
    );
    println!("  Queue policy: {:?}", config.crawler.queue);
    println!("  Stop policy: {:?}", config.crawler.stop);

    println!("\nFetch:");
    println!("  User agent: {}", config.fetch.user_agent);
    match config.fetch.timeout_ms {
        Some(ms) => println!("  Timeout: {}ms", ms),
        None => println!("  Timeout: none"),
    }
    println!("  Connect timeout: {}ms", config.fetch.connect_timeout_ms);

    println!("\nOutput:");
    println!("  Cache: {}", resolve_cache_root(&config.cache)?.display());
    println!("  CSV: {}", config.output.path.display());

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let cache_root = resolve_cache_root(&config.cache)?;
    let cache = PageCache::open(&cache_root)
        .with_context(|| format!("cannot use cache directory {}", cache_root.display()))?;
    tracing::info!("Using page cache at {}", cache.root().display());

    let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone()));
    let pipeline = Pipeline::new(config, fetcher, cache)?;
    let summary = pipeline.run().await?;

    print_summary(&summary);
    Ok(())
}
