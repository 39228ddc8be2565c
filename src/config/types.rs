use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Admit-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// The site being harvested
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Scheme and host of the site, e.g. "https://www.thegradcafe.com"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the paginated results listing, e.g. "/survey"
    #[serde(rename = "listing-path", default = "default_listing_path")]
    pub listing_path: String,
}

impl SiteConfig {
    /// Absolute URL of the site's robots.txt
    pub fn robots_url(&self) -> String {
        format!("{}/robots.txt", self.base_url.trim_end_matches('/'))
    }

    /// Absolute URL of the results listing, without a page parameter
    pub fn listing_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.listing_path.trim_start_matches('/')
        )
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler; also the token matched against robots.txt groups
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Full User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of distinct postings to collect before stopping
    #[serde(rename = "target-records")]
    pub target_records: usize,

    /// Lower bound of the randomized delay before each request (milliseconds)
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the randomized delay before each request (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// First backoff delay; doubled on each further retry (milliseconds)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Consecutive failed pages after which the crawl stops with a partial result
    #[serde(rename = "max-consecutive-failures")]
    pub max_consecutive_failures: u32,
}

impl CrawlerConfig {
    pub fn delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            target_records: 30_000,
            min_delay_ms: 1_000,
            max_delay_ms: 3_000,
            request_timeout_secs: 30,
            max_retries: 5,
            backoff_base_ms: 1_000,
            max_consecutive_failures: 3,
        }
    }
}

/// On-disk layout of the raw posting file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawFormat {
    /// One JSON array, rewritten atomically after every page
    #[default]
    Json,
    /// One JSON object per line, appended
    Jsonl,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path of the raw posting file written by the crawler
    #[serde(rename = "raw-path")]
    pub raw_path: String,

    /// Path of the typed record file written by the normalizer
    #[serde(rename = "typed-path")]
    pub typed_path: String,

    #[serde(rename = "raw-format")]
    pub raw_format: RawFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            raw_path: "raw_applicant_data.json".to_string(),
            typed_path: "applicant_data.json".to_string(),
            raw_format: RawFormat::Json,
        }
    }
}

fn default_listing_path() -> String {
    "/survey".to_string()
}
