//! Crawler module for listing-page harvesting
//!
//! This module contains the crawling stack, leaf first:
//! - Sleeping behind a seam ([`Sleeper`])
//! - Throttled HTTP transport ([`ThrottledTransport`])
//! - Exponential-backoff retries ([`RetryingFetcher`])
//! - Record extraction from listing pages ([`extract`])
//! - Pagination and the raw sink ([`PaginationDriver`])

mod coordinator;
mod extractor;
mod pause;
mod retry;
mod transport;

pub use coordinator::{page_url, PaginationDriver};
pub use extractor::{extract, extract_with_layout, Layout};
pub use pause::{Sleeper, TokioSleeper};
#[doc(hidden)]
pub use pause::RecordingSleeper;
pub use retry::{is_retryable_status, FetchError, Page, RetryPolicy, RetryingFetcher};
pub use transport::{
    build_http_client, politeness_delay, Response, ThrottledTransport, Transport, TransportError,
    TransportErrorKind,
};

use crate::config::Config;
use crate::robots::PolicyGate;
use crate::state::CrawlReport;
use crate::HarvestError;

/// Runs a complete crawl over the network
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP client and throttled transport
/// 2. Load robots.txt and abort if the listing is disallowed
/// 3. Open (or resume) the raw sink
/// 4. Walk listing pages until the target, end of results, or repeated failure
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `fresh` - Discard the raw file of an earlier run
/// * `target` - Record target overriding the configured one
pub async fn crawl(
    config: Config,
    fresh: bool,
    target: Option<usize>,
) -> Result<CrawlReport, HarvestError> {
    let transport = ThrottledTransport::new(&config)?;
    let fetcher = RetryingFetcher::new(
        transport,
        TokioSleeper,
        RetryPolicy::from_config(&config.crawler),
    );
    let gate = PolicyGate::new(config.site.robots_url());
    let target = target.unwrap_or(config.crawler.target_records);

    let mut driver = PaginationDriver::new(config, fetcher, gate)
        .fresh(fresh)
        .target(target);
    driver.run().await
}
