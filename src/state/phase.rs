/// Phase definitions for the pagination state machine
///
/// `Start -> Fetching -> Extracting -> {Fetching | Done | Aborted}`
use std::fmt;

/// Where the crawl currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrawlPhase {
    // ===== Active Phases =====
    /// Policy check and sink setup
    #[default]
    Start,

    /// Requesting the current listing page
    Fetching,

    /// Pulling postings out of a fetched page and persisting them
    Extracting,

    // ===== Terminal Phases =====
    /// Finished; whatever was persisted is a valid result
    Done,

    /// Stopped before producing output
    Aborted,
}

impl CrawlPhase {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;
        matches!(
            (self, next),
            (Start, Fetching)
                | (Start, Done)
                | (Start, Aborted)
                | (Fetching, Fetching)
                | (Fetching, Extracting)
                | (Fetching, Done)
                | (Extracting, Fetching)
                | (Extracting, Done)
        )
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
