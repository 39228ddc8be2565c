//! Robots.txt handling module
//!
//! [`PolicyGate`] fetches the site's robots.txt once, caches the verdict, and
//! answers whether a path may be fetched and how long to wait between requests.

mod cache;
mod parser;

pub use cache::{CachedRobots, PolicyOrigin};
pub use parser::ParsedRobots;

use crate::crawler::{FetchError, RetryingFetcher, Sleeper, Transport};
use crate::HarvestError;
use std::time::Duration;

/// Gatekeeper for the site's crawling policy
///
/// Until [`PolicyGate::load`] has run, every path is denied.
#[derive(Debug, Clone)]
pub struct PolicyGate {
    robots_url: String,
    cached: Option<CachedRobots>,
}

impl PolicyGate {
    /// Creates a gate for the policy at `robots_url`; nothing is fetched yet
    pub fn new(robots_url: impl Into<String>) -> Self {
        Self {
            robots_url: robots_url.into(),
            cached: None,
        }
    }

    /// Creates a gate that already holds a policy
    pub fn with_policy(robots_url: impl Into<String>, cached: CachedRobots) -> Self {
        Self {
            robots_url: robots_url.into(),
            cached: Some(cached),
        }
    }

    pub fn robots_url(&self) -> &str {
        &self.robots_url
    }

    /// Returns the cached policy, if it has been loaded
    pub fn policy(&self) -> Option<&CachedRobots> {
        self.cached.as_ref()
    }

    /// Fetches and caches robots.txt on first call; later calls reuse the cache
    ///
    /// | Fetch outcome | Cached verdict |
    /// |---------------|----------------|
    /// | 2xx | parsed content |
    /// | 404 / 410 | allow all (no policy published) |
    /// | anything else, incl. exhausted retries | deny all |
    pub async fn load<T, S>(&mut self, fetcher: &mut RetryingFetcher<T, S>) -> &CachedRobots
    where
        T: Transport,
        S: Sleeper,
    {
        let cached = match self.cached.take() {
            Some(cached) => cached,
            None => Self::fetch_policy(&self.robots_url, fetcher).await,
        };
        self.cached.insert(cached)
    }

    async fn fetch_policy<T, S>(robots_url: &str, fetcher: &mut RetryingFetcher<T, S>) -> CachedRobots
    where
        T: Transport,
        S: Sleeper,
    {
        match fetcher.fetch_with_retry(robots_url).await {
            Ok(page) => {
                tracing::info!(
                    "Loaded robots.txt from {} ({} bytes)",
                    robots_url,
                    page.body.len()
                );
                CachedRobots::new(ParsedRobots::from_content(&page.body), PolicyOrigin::Fetched)
            }
            Err(FetchError::Permanent { status, .. }) if status == 404 || status == 410 => {
                tracing::info!(
                    "No robots.txt published at {} (HTTP {}), all paths allowed",
                    robots_url,
                    status
                );
                CachedRobots::new(ParsedRobots::allow_all(), PolicyOrigin::NotPublished)
            }
            Err(e) => {
                tracing::warn!("Could not retrieve robots.txt ({}); denying all paths", e);
                CachedRobots::new(ParsedRobots::deny_all(), PolicyOrigin::Unavailable)
            }
        }
    }

    /// Whether `agent` may fetch `path`; false until a policy is loaded
    pub fn allowed(&self, agent: &str, path: &str) -> bool {
        self.cached
            .as_ref()
            .is_some_and(|cached| cached.is_allowed(path, agent))
    }

    /// The declared Crawl-delay for `agent`, if any
    pub fn crawl_delay(&self, agent: &str) -> Option<Duration> {
        self.cached
            .as_ref()
            .and_then(|cached| cached.crawl_delay(agent))
    }

    /// Like [`PolicyGate::allowed`] but reports a denial as [`HarvestError::PolicyDenied`]
    pub fn check(&self, agent: &str, path: &str) -> Result<(), HarvestError> {
        if self.allowed(agent, path) {
            Ok(())
        } else {
            Err(HarvestError::PolicyDenied {
                path: path.to_string(),
            })
        }
    }
}
