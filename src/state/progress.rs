use crate::state::CrawlPhase;
use std::fmt;

/// Running position of a crawl
///
/// Owned by the pagination driver and handed back in the [`CrawlReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrawlProgress {
    /// Listing page currently being processed, starting at 1
    pub page: u32,

    /// Distinct postings persisted, including those from earlier runs
    pub collected: usize,

    pub consecutive_failures: u32,

    pub consecutive_empty: u32,

    pub phase: CrawlPhase,
}

impl CrawlProgress {
    pub fn new(collected: usize) -> Self {
        Self {
            page: 1,
            collected,
            ..Self::default()
        }
    }

    /// Moves to `next`, logging transitions the state machine does not allow
    pub fn enter(&mut self, next: CrawlPhase) {
        if !self.phase.can_transition_to(next) {
            tracing::warn!("Unexpected crawl phase transition {} -> {}", self.phase, next);
        }
        self.phase = next;
    }

    /// Moves on to the next listing page
    pub fn advance(&mut self) {
        self.page += 1;
    }
}

/// Why a crawl stopped short of its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Two consecutive pages produced no postings
    EndOfResults,

    /// Too many consecutive pages could not be fetched
    FailureThreshold,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfResults => write!(f, "end of results"),
            Self::FailureThreshold => write!(f, "consecutive page failure threshold reached"),
        }
    }
}

/// How a crawl ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlStatus {
    TargetReached,
    Partial(StopReason),
    /// No output was produced; the reason is human-readable
    Aborted(String),
}

impl CrawlStatus {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::TargetReached => 0,
            Self::Partial(_) => 2,
            Self::Aborted(_) => 3,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetReached => write!(f, "target reached"),
            Self::Partial(reason) => write!(f, "partial ({})", reason),
            Self::Aborted(reason) => write!(f, "aborted ({})", reason),
        }
    }
}

/// Summary of a finished crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub status: CrawlStatus,
    pub progress: CrawlProgress,
    pub pages_fetched: u32,
    /// Postings added by this run, excluding those already on disk
    pub records_added: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_progress_starts_on_page_one() {
        let progress = CrawlProgress::new(12);
        assert_eq!(progress.page, 1);
        assert_eq!(progress.collected, 12);
        assert_eq!(progress.phase, CrawlPhase::Start);
    }

    #[test]
    fn test_enter_and_advance() {
        let mut progress = CrawlProgress::new(0);
        progress.enter(CrawlPhase::Fetching);
        progress.enter(CrawlPhase::Extracting);
        progress.advance();
        assert_eq!(progress.phase, CrawlPhase::Extracting);
        assert_eq!(progress.page, 2);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CrawlStatus::TargetReached.exit_code(), 0);
        assert_eq!(CrawlStatus::Partial(StopReason::EndOfResults).exit_code(), 2);
        assert_eq!(CrawlStatus::Aborted("denied".into()).exit_code(), 3);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(
            CrawlStatus::Partial(StopReason::FailureThreshold).to_string(),
            "partial (consecutive page failure threshold reached)"
        );
    }
}
