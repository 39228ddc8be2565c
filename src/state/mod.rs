//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: Where the pagination state machine currently is
//! - `CrawlProgress`: Page cursor, record count and failure counters
//! - `CrawlStatus` / `CrawlReport`: How a finished crawl ended

mod phase;
mod progress;

// Re-export main types
pub use phase::CrawlPhase;
pub use progress::{CrawlProgress, CrawlReport, CrawlStatus, StopReason};
