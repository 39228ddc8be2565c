//! Fetching with exponential backoff
//!
//! A fetch is retried only when the failure is transient: a timeout, a dropped
//! connection, HTTP 429, or any 5xx. Other statuses are returned at once as
//! [`FetchError::Permanent`].

use crate::config::CrawlerConfig;
use crate::crawler::pause::Sleeper;
use crate::crawler::transport::{Response, Transport, TransportError};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a status that retrying will not change
    #[error("HTTP {status} for {url}")]
    Permanent { url: String, status: u16 },

    /// The request itself was unusable
    #[error("Request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: TransportError,
    },

    /// Every attempt failed transiently
    #[error("Gave up on {url} after {attempts} attempts (last failure: {last})")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Permanent { url, .. }
            | FetchError::Request { url, .. }
            | FetchError::Exhausted { url, .. } => url,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Permanent { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// How a single attempt ended
#[derive(Debug)]
enum Attempt {
    Success(Response),
    Transient(String),
    Permanent(FetchError),
}

/// Classifies an HTTP status
///
/// 2xx is success, 429 and 5xx are worth retrying, everything else is final.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn classify(url: &str, result: Result<Response, TransportError>) -> Attempt {
    match result {
        Ok(response) if (200..300).contains(&response.status) => Attempt::Success(response),
        Ok(response) if is_retryable_status(response.status) => {
            Attempt::Transient(format!("HTTP {}", response.status))
        }
        Ok(response) => Attempt::Permanent(FetchError::Permanent {
            url: url.to_string(),
            status: response.status,
        }),
        Err(err) if err.is_transient() => Attempt::Transient(err.to_string()),
        Err(err) => Attempt::Permanent(FetchError::Request {
            url: url.to_string(),
            source: err,
        }),
    }
}

/// Backoff schedule
///
/// Retry `n` (zero-based) waits `base * 2^n`; with the defaults that is
/// 1, 2, 4, 8, 16 seconds before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.backoff_base(),
        }
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    /// Every pause the policy would take, in order
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_retries).map(|n| self.delay_for(n)).collect()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Wraps a [`Transport`] with the backoff policy
pub struct RetryingFetcher<T, S> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
}

impl<T: Transport, S: Sleeper> RetryingFetcher<T, S> {
    pub fn new(transport: T, sleeper: S, policy: RetryPolicy) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Fetches `url`, retrying transient failures on the backoff schedule
    pub async fn fetch_with_retry(&mut self, url: &str) -> Result<Page, FetchError> {
        let mut retry = 0;

        loop {
            match classify(url, self.transport.fetch(url).await) {
                Attempt::Success(response) => {
                    return Ok(Page {
                        url: url.to_string(),
                        status: response.status,
                        body: response.body,
                        fetched_at: Utc::now(),
                    });
                }
                Attempt::Permanent(err) => {
                    tracing::debug!("Not retrying {}: {}", url, err);
                    return Err(err);
                }
                Attempt::Transient(reason) => {
                    if retry >= self.policy.max_retries {
                        return Err(FetchError::Exhausted {
                            url: url.to_string(),
                            attempts: retry + 1,
                            last: reason,
                        });
                    }

                    let delay = self.policy.delay_for(retry);
                    tracing::warn!(
                        "Transient failure for {} ({}), retry {}/{} in {:?}",
                        url,
                        reason,
                        retry + 1,
                        self.policy.max_retries,
                        delay
                    );
                    self.sleeper.sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }
}
