//! Throttled HTTP transport
//!
//! This is the only place requests leave the process. Every request:
//! - carries the same identification headers
//! - is bounded by the configured timeout
//! - is preceded by a politeness pause of `max(uniform(min, max), crawl-delay)`

use crate::config::{Config, UserAgentConfig};
use crate::crawler::pause::{Sleeper, TokioSleeper};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

/// What went wrong below the HTTP status level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request exceeded its timeout
    Timeout,
    /// No connection could be established
    Connect,
    /// The connection dropped while sending or reading the body
    Interrupted,
    /// The request could not be built (bad URL, bad header)
    Invalid,
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?} error fetching {url}: {message}")]
pub struct TransportError {
    pub url: String,
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(url: &str, kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            kind,
            message: message.into(),
        }
    }

    /// Whether another attempt might succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self.kind, TransportErrorKind::Invalid)
    }

    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_builder() {
            TransportErrorKind::Invalid
        } else {
            TransportErrorKind::Interrupted
        };
        Self::new(url, kind, err.to_string())
    }
}

/// A sequential, single-request-at-a-time page source
#[async_trait::async_trait]
pub trait Transport: Send {
    async fn fetch(&mut self, url: &str) -> Result<Response, TransportError>;

    /// Sets the minimum pause declared by the site's robots.txt
    fn set_crawl_delay(&mut self, delay: Option<Duration>);
}

/// Builds the HTTP client with the crawler's fixed identity
///
/// # Example
///
/// ```no_run
/// use admit_harvest::config::UserAgentConfig;
/// use admit_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "AdmitHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    Client::builder()
        .user_agent(config.header_value())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Picks the pause before the next request
///
/// Uniform in `[min, max]` at millisecond resolution, raised to `crawl_delay`
/// when the site declares a longer one.
pub fn politeness_delay(
    rng: &mut fastrand::Rng,
    (min, max): (Duration, Duration),
    crawl_delay: Option<Duration>,
) -> Duration {
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    let jitter = if max_ms > min_ms {
        Duration::from_millis(rng.u64(min_ms..=max_ms))
    } else {
        min
    };

    match crawl_delay {
        Some(declared) => jitter.max(declared),
        None => jitter,
    }
}

/// Reqwest-backed [`Transport`] that pauses before every request
pub struct ThrottledTransport<S = TokioSleeper> {
    client: Client,
    sleeper: S,
    delay_range: (Duration, Duration),
    crawl_delay: Option<Duration>,
    rng: fastrand::Rng,
    requests_sent: u64,
}

impl ThrottledTransport<TokioSleeper> {
    /// Creates a transport from the crawler configuration
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        Ok(Self::with_sleeper(
            client,
            config.crawler.delay_range(),
            TokioSleeper,
        ))
    }
}

impl<S: Sleeper> ThrottledTransport<S> {
    pub fn with_sleeper(client: Client, delay_range: (Duration, Duration), sleeper: S) -> Self {
        Self {
            client,
            sleeper,
            delay_range,
            crawl_delay: None,
            rng: fastrand::Rng::new(),
            requests_sent: 0,
        }
    }

    /// Makes the jitter sequence reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    pub fn crawl_delay(&self) -> Option<Duration> {
        self.crawl_delay
    }

    /// Number of requests issued so far, successful or not
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }
}

#[async_trait::async_trait]
impl<S: Sleeper> Transport for ThrottledTransport<S> {
    async fn fetch(&mut self, url: &str) -> Result<Response, TransportError> {
        let pause = politeness_delay(&mut self.rng, self.delay_range, self.crawl_delay);
        tracing::trace!("Pausing {:?} before GET {}", pause, url);
        self.sleeper.sleep(pause).await;

        self.requests_sent += 1;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;

        tracing::debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(Response { status, body })
    }

    fn set_crawl_delay(&mut self, delay: Option<Duration>) {
        self.crawl_delay = delay;
    }
}
