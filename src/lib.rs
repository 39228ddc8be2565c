//! Admit-Harvest: a polite admissions-results harvester
//!
//! This crate crawls the paginated results listing of a graduate-admissions
//! community site, respecting robots.txt and backing off on transient
//! failures, and normalizes the scraped postings into typed records.

pub mod config;
pub mod crawler;
pub mod normalize;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Admit-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Path disallowed by robots.txt: {path}")]
    PolicyDenied { path: String },

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Output sink error: {0}")]
    Sink(#[from] storage::SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Admit-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use normalize::normalize;
pub use state::{CrawlPhase, CrawlProgress, CrawlReport, CrawlStatus};
pub use storage::{RawPosting, TypedRecord};
