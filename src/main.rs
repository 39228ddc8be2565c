//! Admit-Harvest main entry point
//!
//! This is the command-line interface for the admissions-results harvester.

use admit_harvest::config::{load_config_with_hash, Config};
use admit_harvest::crawler::crawl;
use admit_harvest::normalize::normalize_file;
use admit_harvest::output::{load_statistics, print_statistics};
use admit_harvest::storage::{export_jsonl, load_raw};
use admit_harvest::CrawlStatus;
use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Admit-Harvest: A polite admissions-results harvester
///
/// Admit-Harvest pages through a results listing while respecting robots.txt,
/// jittered request delays and exponential backoff, then normalizes the
/// scraped postings into typed records.
#[derive(Parser, Debug)]
#[command(name = "admit-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite admissions-results harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl, discarding the existing raw file
    #[arg(long)]
    fresh: bool,

    /// Override the configured record target
    #[arg(long, value_name = "N")]
    target: Option<usize>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["normalize", "stats", "export_jsonl"])]
    dry_run: bool,

    /// Normalize the raw file into the typed file and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_jsonl"])]
    normalize: bool,

    /// Show statistics from the typed file and exit
    #[arg(long, conflicts_with_all = ["dry_run", "normalize", "export_jsonl"])]
    stats: bool,

    /// Write the raw postings as JSON Lines to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "normalize", "stats"])]
    export_jsonl: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, cli.target);
    } else if cli.normalize {
        handle_normalize(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.export_jsonl {
        handle_export_jsonl(&config, path)?;
    } else {
        return handle_crawl(config, cli.fresh, cli.target).await;
    }

    Ok(ExitCode::SUCCESS)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("admit_harvest=info,warn"),
            1 => EnvFilter::new("admit_harvest=debug,info"),
            2 => EnvFilter::new("admit_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, target: Option<usize>) {
    println!("=== Admit-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Listing: {}", config.site.listing_url());
    println!("  Robots policy: {}", config.site.robots_url());

    println!("\nCrawler Configuration:");
    println!(
        "  Target records: {}",
        target.unwrap_or(config.crawler.target_records)
    );
    println!(
        "  Delay between requests: {}-{}ms",
        config.crawler.min_delay_ms, config.crawler.max_delay_ms
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Retries: {} (backoff base {}ms)",
        config.crawler.max_retries, config.crawler.backoff_base_ms
    );
    println!(
        "  Consecutive page failures tolerated: {}",
        config.crawler.max_consecutive_failures
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!(
        "  Raw postings: {} ({:?})",
        config.output.raw_path, config.output.raw_format
    );
    println!("  Typed records: {}", config.output.typed_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --normalize mode: regenerates the typed file from the raw file
fn handle_normalize(config: &Config) -> anyhow::Result<()> {
    let raw_path = Path::new(&config.output.raw_path);
    let typed_path = Path::new(&config.output.typed_path);

    let records = normalize_file(raw_path, typed_path)
        .with_context(|| format!("failed to normalize {}", raw_path.display()))?;

    println!(
        "✓ Normalized {} records into {}",
        records.len(),
        typed_path.display()
    );
    Ok(())
}

/// Handles the --stats mode: shows statistics from the typed file
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Typed records: {}\n", config.output.typed_path);

    let stats = load_statistics(Path::new(&config.output.typed_path))
        .context("failed to load typed records (run --normalize first)")?;

    print_statistics(&stats);
    Ok(())
}

/// Handles the --export-jsonl mode: writes raw postings one per line
fn handle_export_jsonl(config: &Config, path: &Path) -> anyhow::Result<()> {
    let postings = load_raw(Path::new(&config.output.raw_path))
        .with_context(|| format!("failed to read {}", config.output.raw_path))?;

    let count = export_jsonl(&postings, path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("✓ Exported {} postings to {}", count, path.display());
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    fresh: bool,
    target: Option<usize>,
) -> anyhow::Result<ExitCode> {
    if fresh {
        tracing::info!("Starting fresh crawl (discarding previous raw file)");
    } else {
        tracing::info!("Starting crawl (will resume from existing raw file)");
    }

    let report = crawl(config, fresh, target).await.context("crawl failed")?;

    match &report.status {
        CrawlStatus::TargetReached => {
            tracing::info!("Target reached with {} records", report.progress.collected)
        }
        CrawlStatus::Partial(reason) => tracing::warn!(
            "Stopped early ({}) with {} records; partial results are kept",
            reason,
            report.progress.collected
        ),
        CrawlStatus::Aborted(reason) => tracing::error!("Crawl aborted: {}", reason),
    }

    println!(
        "{}: {} records ({} new), {} pages fetched",
        report.status, report.progress.collected, report.records_added, report.pages_fetched
    );

    Ok(ExitCode::from(report.status.exit_code()))
}
