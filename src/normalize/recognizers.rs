//! Field recognizers
//!
//! Each recognizer is a plain function from cleaned posting text to an
//! optional [`Observed`] value. A recognizer never fails: text it does not
//! understand yields `None`, and a match it cannot use (out of bounds,
//! impossible date) yields an `Observed` with no value but with the original
//! substring, so the caller can keep it.

use crate::normalize::clean::segments;
use crate::storage::{Citizenship, Decision, Degree};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub const GPA_RANGE: (f64, f64) = (0.0, 4.33);
pub const GRE_SECTION_RANGE: (f64, f64) = (0.0, 170.0);
pub const GRE_AW_RANGE: (f64, f64) = (0.0, 6.0);
pub const GRE_TOTAL_RANGE: (f64, f64) = (260.0, 340.0);

/// A value read from the text together with the substring it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Observed<'a, T> {
    /// `None` when the substring matched but could not be used
    pub value: Option<T>,
    pub original: &'a str,
}

impl<'a, T: Canonical> Observed<'a, T> {
    fn new(value: Option<T>, original: &'a str) -> Self {
        Self { value, original }
    }

    /// Whether the stored value no longer reads exactly like the source text
    pub fn differs(&self) -> bool {
        match &self.value {
            Some(value) => value.canonical() != self.original,
            None => true,
        }
    }
}

/// The text form a cleaned value is compared against its original with
pub trait Canonical {
    fn canonical(&self) -> String;
}

impl Canonical for f64 {
    fn canonical(&self) -> String {
        self.to_string()
    }
}

impl Canonical for String {
    fn canonical(&self) -> String {
        self.clone()
    }
}

impl Canonical for NaiveDate {
    fn canonical(&self) -> String {
        self.format("%Y-%m-%d").to_string()
    }
}

impl Canonical for Degree {
    fn canonical(&self) -> String {
        self.as_str().to_string()
    }
}

impl Canonical for Decision {
    fn canonical(&self) -> String {
        self.as_str().to_string()
    }
}

impl Canonical for Citizenship {
    fn canonical(&self) -> String {
        self.as_str().to_string()
    }
}

fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid built-in pattern {re:?}: {e}"))
}

fn patterns(res: &[&str]) -> Vec<Regex> {
    res.iter().map(|re| pattern(re)).collect()
}

/// The earliest match in `text` across `candidates`
fn leftmost<'t>(candidates: &[Regex], text: &'t str) -> Option<Captures<'t>> {
    candidates
        .iter()
        .filter_map(|re| re.captures(text))
        .min_by_key(|caps| caps.get(0).map_or(usize::MAX, |m| m.start()))
}

/// Parses the first capture group of the leftmost match as a bounded number
fn bounded_number<'t>(
    candidates: &[Regex],
    text: &'t str,
    (min, max): (f64, f64),
) -> Option<Observed<'t, f64>> {
    let caps = leftmost(candidates, text)?;
    let original = caps.get(1)?.as_str();
    let value = original
        .parse::<f64>()
        .ok()
        .filter(|v| (min..=max).contains(v));
    Some(Observed::new(value, original))
}

// ----- Decision -----

static DECISIONS: Lazy<Vec<(Decision, Regex)>> = Lazy::new(|| {
    vec![
        (Decision::Accepted, pattern(r"(?i)\b(?:accepted|admitted)\b")),
        (Decision::Rejected, pattern(r"(?i)\b(?:rejected|denied)\b")),
        (Decision::Waitlisted, pattern(r"(?i)\bwait[\s-]*list(?:ed)?\b")),
        (Decision::Interview, pattern(r"(?i)\binterview(?:ed|s)?\b")),
    ]
});

/// First decision keyword found, checked in priority order
pub fn decision(text: &str) -> Option<Observed<'_, Decision>> {
    DECISIONS.iter().find_map(|(decision, re)| {
        re.find(text)
            .map(|m| Observed::new(Some(*decision), m.as_str()))
    })
}

// ----- Institution and program -----

static INSTITUTION_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    pattern(
        r"\b(?:(?:University|College) of(?: [A-Z][\w&.'-]*)+|[A-Z][\w&.'-]*(?: [A-Z][\w&.'-]*)* (?:University|College|Institute of Technology))\b",
    )
});

static PROGRAM_DEGREE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    pattern(
        r"(?i)[\s,(–-]*\b(?:ph\.?\s?d|masters?|master's|ms|msc|meng|mfa|mph|mpp|mba|m\.s|m\.a|jd|md|edd|psyd)\b\.?\)?\s*$",
    )
});

/// Whether a segment reads like a name rather than a status or a score
fn is_name(segment: &str) -> bool {
    segment.chars().any(char::is_alphabetic)
        && !segment.chars().any(|c| c.is_ascii_digit())
        && !DECISIONS.iter().any(|(_, re)| re.is_match(segment))
}

/// The first segment of a multi-segment posting, or a school-looking phrase
pub fn institution(text: &str) -> Option<Observed<'_, String>> {
    let parts = segments(text);
    if parts.len() >= 2 && is_name(parts[0]) {
        return Some(Observed::new(Some(parts[0].to_string()), parts[0]));
    }

    INSTITUTION_FALLBACK
        .find(text)
        .map(|m| Observed::new(Some(m.as_str().to_string()), m.as_str()))
}

/// The second segment with any trailing degree token removed
pub fn program(text: &str) -> Option<Observed<'_, String>> {
    let parts = segments(text);
    if parts.len() < 2 || !is_name(parts[0]) || !is_name(parts[1]) {
        return None;
    }

    let original = parts[1];
    let stripped = PROGRAM_DEGREE_SUFFIX
        .replace(original, "")
        .trim_end_matches(|c: char| c == ',' || c == '-' || c.is_whitespace())
        .to_string();

    if stripped.is_empty() {
        None
    } else {
        Some(Observed::new(Some(stripped), original))
    }
}

// ----- Degree -----

static DEGREES: Lazy<Vec<(Degree, Regex)>> = Lazy::new(|| {
    vec![
        (
            Degree::PhD,
            pattern(r"(?i)\bph\.?\s?d\b\.?|\bdoctora(?:te|l)\b"),
        ),
        (
            Degree::Masters,
            pattern(r"\b(?:(?i:master'?s?)|MS|MSc|MEng|MFA|MPH|MPP|MBA|MSW)\b|\bM\.(?:S|A|Eng)\."),
        ),
        (
            Degree::Other,
            pattern(r"\b(?:JD|MD|EdD|PsyD|PharmD|DMA|DNP|DPT|DVM|AuD)\b|\b(?:J\.D|M\.D|Ed\.D|Psy\.D)\."),
        ),
    ]
});

pub fn degree(text: &str) -> Option<Observed<'_, Degree>> {
    DEGREES.iter().find_map(|(degree, re)| {
        re.find(text)
            .map(|m| Observed::new(Some(*degree), m.as_str()))
    })
}

// ----- Scores -----

static GPA: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"(?i)\bGPA\s*(?:of|:|=)?\s*(\d+(?:\.\d+)?)",
        r"(?i)\b(\d+\.\d+)\s*GPA\b",
    ])
});

static GRE_TOTAL: Lazy<Vec<Regex>> =
    Lazy::new(|| patterns(&[r"(?i)\bGRE\s*(?:total)?\s*:?\s*(\d{3})\b"]));

static GRE_VERBAL: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"(?i)\b(\d{2,3})\s?V\b",
        r"(?i)\bV(?:erbal)?\s*:?\s*(\d{2,3})\b",
    ])
});

static GRE_QUANT: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"(?i)\b(\d{2,3})\s?Q\b",
        r"(?i)\bQ(?:uant(?:itative)?)?\s*:?\s*(\d{2,3})\b",
    ])
});

static GRE_AW: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"(?i)\b(\d(?:\.\d{1,2})?)\s?AWA?\b",
        r"(?i)\b(?:AWA?|Writing)\s*:?\s*(\d(?:\.\d{1,2})?)\b",
    ])
});

pub fn gpa(text: &str) -> Option<Observed<'_, f64>> {
    bounded_number(&GPA, text, GPA_RANGE)
}

pub fn gre_total(text: &str) -> Option<Observed<'_, f64>> {
    bounded_number(&GRE_TOTAL, text, GRE_TOTAL_RANGE)
}

pub fn gre_verbal(text: &str) -> Option<Observed<'_, f64>> {
    bounded_number(&GRE_VERBAL, text, GRE_SECTION_RANGE)
}

pub fn gre_quant(text: &str) -> Option<Observed<'_, f64>> {
    bounded_number(&GRE_QUANT, text, GRE_SECTION_RANGE)
}

pub fn gre_aw(text: &str) -> Option<Observed<'_, f64>> {
    bounded_number(&GRE_AW, text, GRE_AW_RANGE)
}

// ----- Dates -----

/// Full or abbreviated month name; a word that merely starts like one is not
const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b\.?";

/// `Mar 5 2024` from any month-name form, or `None` if the parts are off
fn month_name_date(month: &str, day: &str, year: &str) -> Option<NaiveDate> {
    let month = month.get(..3)?;
    let day = day.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    NaiveDate::parse_from_str(&format!("{} {} {}", month, day, year), "%b %d %Y").ok()
}

fn parse_month_first(caps: &Captures<'_>) -> Option<NaiveDate> {
    month_name_date(caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(3)?.as_str())
}

fn parse_day_first(caps: &Captures<'_>) -> Option<NaiveDate> {
    month_name_date(caps.get(2)?.as_str(), caps.get(1)?.as_str(), caps.get(3)?.as_str())
}

fn parse_slashed(caps: &Captures<'_>) -> Option<NaiveDate> {
    let year = caps.get(3)?.as_str();
    let format = if year.len() == 4 { "%m/%d/%Y" } else { "%m/%d/%y" };
    let date = format!("{}/{}/{}", caps.get(1)?.as_str(), caps.get(2)?.as_str(), year);
    NaiveDate::parse_from_str(&date, format).ok()
}

fn parse_iso(caps: &Captures<'_>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(caps.get(0)?.as_str(), "%Y-%m-%d").ok()
}

type DateParser = fn(&Captures<'_>) -> Option<NaiveDate>;

static DATES: Lazy<Vec<(Regex, DateParser)>> = Lazy::new(|| {
    vec![
        (
            pattern(&format!(
                r"(?i)\b({MONTH})\s+(\d{{1,2}}(?:st|nd|rd|th)?),?\s+(\d{{4}})\b"
            )),
            parse_month_first as DateParser,
        ),
        (
            pattern(&format!(
                r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTH}),?\s+(\d{{4}})\b"
            )),
            parse_day_first,
        ),
        (
            pattern(r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b"),
            parse_slashed,
        ),
        (pattern(r"\b\d{4}-\d{2}-\d{2}\b"), parse_iso),
    ]
});

/// The leftmost date in any supported format
pub fn decision_date(text: &str) -> Option<Observed<'_, NaiveDate>> {
    DATES
        .iter()
        .filter_map(|(re, parse)| re.captures(text).map(|caps| (caps, parse)))
        .min_by_key(|(caps, _)| caps.get(0).map_or(usize::MAX, |m| m.start()))
        .and_then(|(caps, parse)| {
            let original = caps.get(0)?.as_str();
            Some(Observed::new(parse(&caps), original))
        })
}

// ----- Term and citizenship -----

static TERM: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?i)\b(fall|spring|summer|winter)\s*'?(\d{4}|\d{2})\b"));

/// Admission term as `Season YYYY`
pub fn term(text: &str) -> Option<Observed<'_, String>> {
    let caps = TERM.captures(text)?;
    let original = caps.get(0)?.as_str();
    let season = caps.get(1)?.as_str().to_lowercase();
    let year = caps.get(2)?.as_str();

    let mut chars = season.chars();
    let season = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => return None,
    };
    let year = if year.len() == 2 {
        format!("20{}", year)
    } else {
        year.to_string()
    };

    Some(Observed::new(Some(format!("{} {}", season, year)), original))
}

static CITIZENSHIP: Lazy<Vec<(Citizenship, Regex)>> = Lazy::new(|| {
    vec![
        (Citizenship::International, pattern(r"(?i)\binternational\b")),
        (
            Citizenship::American,
            pattern(r"(?i)\b(?:american|domestic|u\.?s\.? citizen)\b"),
        ),
    ]
});

pub fn citizenship(text: &str) -> Option<Observed<'_, Citizenship>> {
    CITIZENSHIP.iter().find_map(|(citizenship, re)| {
        re.find(text)
            .map(|m| Observed::new(Some(*citizenship), m.as_str()))
    })
}
