//! Record extraction from listing pages
//!
//! Layouts are tried in a fixed order and the first one that yields at least
//! one candidate wins for the page:
//! 1. table rows with data cells
//! 2. card containers
//! 3. innermost blocks mentioning a decision keyword
//!
//! Extraction is pure: the same body always produces the same postings in the
//! same order.

use crate::normalize::clean_fragment;
use crate::storage::{posting_identity, RawPosting};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Which layout recognizer matched a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    TableRows,
    Cards,
    KeywordBlocks,
}

type Recognizer = for<'a> fn(&'a Html) -> Vec<ElementRef<'a>>;

const LAYOUTS: &[(Layout, Recognizer)] = &[
    (Layout::TableRows, table_rows),
    (Layout::Cards, cards),
    (Layout::KeywordBlocks, keyword_blocks),
];

const CARD_SELECTORS: &[&str] = &[
    ".result-row",
    ".survey-result",
    ".card",
    "article",
    "[class*='result']",
];

const BLOCK_SELECTOR: &str = "div, li, p, section";

static DECISION_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:accepted|admitted|rejected|denied|wait[\s-]*listed|interview(?:ed)?)\b")
        .unwrap_or_else(|e| panic!("invalid decision keyword pattern: {e}"))
});

fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(e) => {
            tracing::error!("Invalid selector {:?}: {:?}", css, e);
            Vec::new()
        }
    }
}

fn has_text(element: &ElementRef<'_>) -> bool {
    element.text().any(|t| !t.trim().is_empty())
}

/// Drops every element that contains another element of the set
fn innermost(elements: Vec<ElementRef<'_>>) -> Vec<ElementRef<'_>> {
    let ids: HashSet<_> = elements.iter().map(|e| e.id()).collect();
    elements
        .into_iter()
        .filter(|element| !element.descendants().skip(1).any(|d| ids.contains(&d.id())))
        .collect()
}

fn table_rows(document: &Html) -> Vec<ElementRef<'_>> {
    let cell = match Selector::parse("td") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    select_all(document, "table tr")
        .into_iter()
        .filter(|row| row.select(&cell).next().is_some() && has_text(row))
        .collect()
}

fn cards(document: &Html) -> Vec<ElementRef<'_>> {
    CARD_SELECTORS
        .iter()
        .map(|css| {
            let found: Vec<_> = select_all(document, css)
                .into_iter()
                .filter(has_text)
                .collect();
            innermost(found)
        })
        .find(|found| !found.is_empty())
        .unwrap_or_default()
}

fn keyword_blocks(document: &Html) -> Vec<ElementRef<'_>> {
    let matching: Vec<_> = select_all(document, BLOCK_SELECTOR)
        .into_iter()
        .filter(|block| DECISION_KEYWORD.is_match(&block.text().collect::<String>()))
        .collect();
    innermost(matching)
}

fn to_posting(
    element: ElementRef<'_>,
    source_url: &str,
    fetched_at: DateTime<Utc>,
    page: u32,
) -> Option<RawPosting> {
    let fragment = element.html();
    let text = clean_fragment(&fragment);
    if text.is_empty() {
        return None;
    }

    Some(RawPosting {
        id: posting_identity(&text),
        source_url: source_url.to_string(),
        raw_html_fragment: fragment,
        fetch_timestamp: fetched_at,
        page,
    })
}

/// Extracts postings from a page, reporting which layout matched
///
/// Returns `None` for the layout when nothing on the page was recognized.
pub fn extract_with_layout(
    body: &str,
    source_url: &str,
    fetched_at: DateTime<Utc>,
    page: u32,
) -> (Option<Layout>, Vec<RawPosting>) {
    let document = Html::parse_document(body);

    for (layout, recognize) in LAYOUTS {
        let postings: Vec<_> = recognize(&document)
            .into_iter()
            .filter_map(|element| to_posting(element, source_url, fetched_at, page))
            .collect();

        if !postings.is_empty() {
            tracing::debug!(
                "Page {}: {} postings via {:?} layout",
                page,
                postings.len(),
                layout
            );
            return (Some(*layout), postings);
        }
    }

    (None, Vec::new())
}

/// Extracts the postings on one listing page
pub fn extract(
    body: &str,
    source_url: &str,
    fetched_at: DateTime<Utc>,
    page: u32,
) -> std::vec::IntoIter<RawPosting> {
    extract_with_layout(body, source_url, fetched_at, page)
        .1
        .into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const URL: &str = "https://example.com/survey?page=1";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()
    }

    fn run(body: &str) -> (Option<Layout>, Vec<RawPosting>) {
        extract_with_layout(body, URL, now(), 1)
    }

    const TABLE_PAGE: &str = r#"
        <html><body>
        <table class="results">
          <thead><tr><th>School</th><th>Program</th><th>Decision</th></tr></thead>
          <tbody>
            <tr><td>MIT</td><td>Computer Science</td><td>Accepted</td></tr>
            <tr><td>Stanford</td><td>Physics</td><td>Rejected</td></tr>
            <tr><td>  </td><td></td><td></td></tr>
          </tbody>
        </table>
        <div class="result-row">should not be used</div>
        </body></html>
    "#;

    #[test]
    fn test_table_rows_win() {
        let (layout, postings) = run(TABLE_PAGE);
        assert_eq!(layout, Some(Layout::TableRows));
        assert_eq!(postings.len(), 2);
        assert!(postings[0].raw_html_fragment.starts_with("<tr>"));
        assert_eq!(postings[0].id, posting_identity("MIT | Computer Science | Accepted"));
        assert_eq!(postings[1].page, 1);
        assert_eq!(postings[1].source_url, URL);
    }

    #[test]
    fn test_cards_use_first_matching_selector() {
        let body = r#"
            <div class="survey-result"><span>Yale</span> <span>Rejected</span></div>
            <div class="survey-result"><span>Brown</span> <span>Accepted</span></div>
            <article>Unrelated article</article>
        "#;
        let (layout, postings) = run(body);
        assert_eq!(layout, Some(Layout::Cards));
        assert_eq!(postings.len(), 2);
        assert!(postings[0].raw_html_fragment.contains("Yale"));
    }

    #[test]
    fn test_nested_cards_keep_innermost() {
        let body = r#"
            <div class="results-list">
              <div class="result-item">Harvard Accepted</div>
              <div class="result-item">Columbia Waitlisted</div>
            </div>
        "#;
        let (layout, postings) = run(body);
        assert_eq!(layout, Some(Layout::Cards));
        assert_eq!(postings.len(), 2);
    }

    #[test]
    fn test_keyword_blocks_fallback() {
        let body = r#"
            <div id="main">
              <ul>
                <li>Cornell - Math - Accepted via email</li>
                <li>Duke - Biology - Rejected</li>
                <li>Site news: new survey form</li>
              </ul>
            </div>
        "#;
        let (layout, postings) = run(body);
        assert_eq!(layout, Some(Layout::KeywordBlocks));
        assert_eq!(postings.len(), 2);
        assert!(postings[0].raw_html_fragment.starts_with("<li>"));
    }

    #[test]
    fn test_no_layout_matches() {
        let (layout, postings) = run("<html><body><p>No results found.</p></body></html>");
        assert_eq!(layout, None);
        assert!(postings.is_empty());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let first: Vec<_> = extract(TABLE_PAGE, URL, now(), 1).collect();
        let second: Vec<_> = extract(TABLE_PAGE, URL, now(), 1).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fragments_reparse_to_the_same_identity() {
        for posting in extract(TABLE_PAGE, URL, now(), 1) {
            assert_eq!(
                posting.id,
                posting_identity(&clean_fragment(&posting.raw_html_fragment))
            );
        }
    }
}
