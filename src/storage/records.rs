//! Record shapes shared by the crawl and normalize stages

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// One posting as scraped from a listing page
///
/// `raw_html_fragment` is written once and never changed; every typed field
/// is re-derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPosting {
    /// Hex SHA-256 of the posting's cleaned, lower-cased text
    pub id: String,
    pub source_url: String,
    pub raw_html_fragment: String,
    pub fetch_timestamp: DateTime<Utc>,
    /// Listing page the posting was found on
    #[serde(default)]
    pub page: u32,
}

/// Computes the dedup identity of a posting from its cleaned text
pub fn posting_identity(cleaned_text: &str) -> String {
    let canonical = cleaned_text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Degree {
    PhD,
    Masters,
    Other,
    #[default]
    Unknown,
}

impl Degree {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhD => "PhD",
            Self::Masters => "Masters",
            Self::Other => "Other",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Accepted,
    Rejected,
    Waitlisted,
    Interview,
    #[default]
    Unknown,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
            Self::Waitlisted => "Waitlisted",
            Self::Interview => "Interview",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Citizenship {
    American,
    International,
}

impl Citizenship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::American => "American",
            Self::International => "International",
        }
    }
}

impl fmt::Display for Citizenship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized view of a [`RawPosting`]
///
/// Unset fields serialize as `null` so every record has the same keys.
/// `originals` maps a field name to the substring it was derived from,
/// whenever the two differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedRecord {
    pub raw_id: String,
    pub source_url: String,
    pub text: String,
    pub institution: Option<String>,
    pub program: Option<String>,
    pub degree: Degree,
    pub decision: Decision,
    pub gpa: Option<f64>,
    pub gre_total: Option<f64>,
    pub gre_verbal: Option<f64>,
    pub gre_quant: Option<f64>,
    pub gre_aw: Option<f64>,
    pub decision_date: Option<NaiveDate>,
    pub term: Option<String>,
    pub citizenship: Option<Citizenship>,
    #[serde(default)]
    pub originals: BTreeMap<String, String>,
}

impl TypedRecord {
    /// The tuple downstream storage deduplicates rows on
    pub fn unique_key(&self) -> (&str, Option<NaiveDate>, &str) {
        (&self.text, self.decision_date, &self.source_url)
    }

    pub fn original(&self, field: &str) -> Option<&str> {
        self.originals.get(field).map(String::as_str)
    }
}
