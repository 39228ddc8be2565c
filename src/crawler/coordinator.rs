//! Pagination driver - main crawl orchestration logic
//!
//! This module walks the listing pages one at a time:
//! - Checking the crawling policy once before anything else
//! - Fetching page N through the retrying fetcher
//! - Extracting postings and appending the unseen ones to the raw sink
//! - Stopping on the target count, end of results, or repeated failures
//!
//! Progress is re-derived from the raw sink on startup, so an interrupted run
//! picks up where it stopped by skipping postings it already holds.

use crate::config::Config;
use crate::crawler::extractor::extract;
use crate::crawler::{RetryingFetcher, Sleeper, Transport};
use crate::robots::PolicyGate;
use crate::state::{CrawlPhase, CrawlProgress, CrawlReport, CrawlStatus, StopReason};
use crate::storage::{RawPosting, RawSink};
use crate::HarvestError;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use url::Url;

/// Consecutive postingless pages that mean the listing has run out
const EMPTY_PAGES_FOR_END: u32 = 2;

/// Builds the URL of listing page `page`
pub fn page_url(listing_url: &str, page: u32) -> Result<String, HarvestError> {
    let mut url = Url::parse(listing_url)?;
    url.query_pairs_mut().append_pair("page", &page.to_string());
    Ok(url.to_string())
}

/// Drives the crawl across listing pages
pub struct PaginationDriver<T, S> {
    config: Config,
    fetcher: RetryingFetcher<T, S>,
    gate: PolicyGate,
    fresh: bool,
    target: usize,
}

impl<T: Transport, S: Sleeper> PaginationDriver<T, S> {
    /// Creates a driver; nothing is fetched until [`PaginationDriver::run`]
    pub fn new(config: Config, fetcher: RetryingFetcher<T, S>, gate: PolicyGate) -> Self {
        let target = config.crawler.target_records;
        Self {
            config,
            fetcher,
            gate,
            fresh: false,
            target,
        }
    }

    /// Discards any raw file left by an earlier run
    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    /// Overrides the configured record target
    pub fn target(mut self, target: usize) -> Self {
        self.target = target;
        self
    }

    pub fn gate(&self) -> &PolicyGate {
        &self.gate
    }

    pub fn fetcher(&self) -> &RetryingFetcher<T, S> {
        &self.fetcher
    }

    /// Runs the crawl to completion
    ///
    /// Returns `Err` only for failures that make the output untrustworthy
    /// (sink I/O, an unusable listing URL). Policy denial is reported as
    /// [`CrawlStatus::Aborted`] and leaves the raw file untouched.
    pub async fn run(&mut self) -> Result<CrawlReport, HarvestError> {
        let mut progress = CrawlProgress::new(0);
        let agent = self.config.user_agent.crawler_name.clone();
        let listing_path = self.config.site.listing_path.clone();

        self.gate.load(&mut self.fetcher).await;
        if let Err(denied) = self.gate.check(&agent, &listing_path) {
            tracing::error!("{}; aborting before any listing page is requested", denied);
            progress.enter(CrawlPhase::Aborted);
            return Ok(CrawlReport {
                status: CrawlStatus::Aborted(denied.to_string()),
                progress,
                pages_fetched: 0,
                records_added: 0,
            });
        }

        let crawl_delay = self.gate.crawl_delay(&agent);
        if let Some(delay) = crawl_delay {
            tracing::info!("Honoring Crawl-delay of {:?}", delay);
        }
        self.fetcher.transport_mut().set_crawl_delay(crawl_delay);

        let mut sink = RawSink::open(
            Path::new(&self.config.output.raw_path),
            self.config.output.raw_format,
            self.fresh,
        )?;
        progress.collected = sink.len();

        tracing::info!(
            "Starting crawl of {} with {} of {} records already collected",
            self.config.site.listing_url(),
            progress.collected,
            self.target
        );

        let started = Instant::now();
        let mut pages_fetched = 0;
        let mut records_added = 0;

        let status = loop {
            if progress.collected >= self.target {
                break CrawlStatus::TargetReached;
            }

            let url = page_url(&self.config.site.listing_url(), progress.page)?;
            progress.enter(CrawlPhase::Fetching);

            let page = match self.fetcher.fetch_with_retry(&url).await {
                Ok(page) => page,
                Err(e) => {
                    progress.consecutive_failures += 1;
                    tracing::warn!(
                        "Skipping page {} ({}/{} consecutive failures): {}",
                        progress.page,
                        progress.consecutive_failures,
                        self.config.crawler.max_consecutive_failures,
                        e
                    );
                    if progress.consecutive_failures >= self.config.crawler.max_consecutive_failures {
                        break CrawlStatus::Partial(StopReason::FailureThreshold);
                    }
                    progress.advance();
                    continue;
                }
            };
            pages_fetched += 1;
            progress.consecutive_failures = 0;

            progress.enter(CrawlPhase::Extracting);
            let mut postings: Vec<RawPosting> =
                extract(&page.body, &url, page.fetched_at, progress.page).collect();

            if postings.is_empty() {
                tracing::info!("Page {} had no recognizable postings, fetching it again", progress.page);
                progress.enter(CrawlPhase::Fetching);
                match self.fetcher.fetch_with_retry(&url).await {
                    Ok(again) => {
                        pages_fetched += 1;
                        progress.enter(CrawlPhase::Extracting);
                        postings = extract(&again.body, &url, again.fetched_at, progress.page).collect();
                    }
                    Err(e) => {
                        tracing::warn!("Re-fetch of page {} failed: {}", progress.page, e);
                        progress.enter(CrawlPhase::Extracting);
                    }
                }
            }

            if postings.is_empty() {
                progress.consecutive_empty += 1;
                if progress.consecutive_empty >= EMPTY_PAGES_FOR_END {
                    tracing::info!("No postings on {} consecutive pages", progress.consecutive_empty);
                    break CrawlStatus::Partial(StopReason::EndOfResults);
                }
                progress.advance();
                continue;
            }
            progress.consecutive_empty = 0;

            let room = self.target - progress.collected;
            let mut on_page = HashSet::new();
            let unseen: Vec<RawPosting> = postings
                .into_iter()
                .filter(|posting| !sink.contains(&posting.id) && on_page.insert(posting.id.clone()))
                .take(room)
                .collect();

            let added = sink.append(unseen)?;
            records_added += added;
            progress.collected = sink.len();

            let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: page {} added {} records, {}/{} collected, {:.2} pages/sec",
                progress.page,
                added,
                progress.collected,
                self.target,
                pages_fetched as f64 / elapsed
            );

            progress.advance();
        };

        progress.enter(CrawlPhase::Done);
        tracing::info!(
            "Crawl finished: {} ({} records, {} added this run, {} pages in {:?})",
            status,
            progress.collected,
            records_added,
            pages_fetched,
            started.elapsed()
        );

        Ok(CrawlReport {
            status,
            progress,
            pages_fetched,
            records_added,
        })
    }
}
