//! Cached robots.txt for the harvested site
//!
//! The policy is fetched once per process; the cache records where the
//! verdict came from so the driver can explain a denial.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// How the cached policy was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOrigin {
    /// robots.txt was fetched and parsed
    Fetched,
    /// The site answered 404/410: no policy published, everything allowed
    NotPublished,
    /// robots.txt could not be retrieved; everything denied
    Unavailable,
}

/// Cached robots.txt data for the site
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: ParsedRobots,

    pub origin: PolicyOrigin,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a new CachedRobots stamped with the current time
    pub fn new(content: ParsedRobots, origin: PolicyOrigin) -> Self {
        Self {
            content,
            origin,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if a URL is allowed according to the cached robots.txt
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        self.content.is_allowed(url, user_agent)
    }

    /// Gets the declared crawl delay for `user_agent`
    ///
    /// A value too large to represent as a [`Duration`] is ignored.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let seconds = self.content.crawl_delay(user_agent)?;
        match Duration::try_from_secs_f64(seconds) {
            Ok(delay) => Some(delay),
            Err(e) => {
                tracing::warn!("Ignoring unusable Crawl-delay of {} seconds: {}", seconds, e);
                None
            }
        }
    }
}
