//! Markup stripping and whitespace cleanup
//!
//! Block and table-cell boundaries in the fragment become ` | ` separators, so
//! `<tr><td>MIT</td><td>Physics</td></tr>` cleans to `MIT | Physics`.

use scraper::{ElementRef, Html};

const SEGMENT_BREAK: char = '\u{1F}';

/// Elements whose content never reaches the cleaned text
const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start a new segment
const BLOCKS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "section", "table",
    "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Parses a stored fragment in a context where its elements survive
///
/// Table rows and cells parsed on their own lose their tags, and with them
/// the cell boundaries.
fn parse_fragment(fragment: &str) -> Html {
    let head = fragment.trim_start().as_bytes();
    let starts_with = |tag: &str| {
        head.len() > tag.len()
            && head[..tag.len()].eq_ignore_ascii_case(tag.as_bytes())
            && !head[tag.len()].is_ascii_alphanumeric()
    };

    if starts_with("<tr") {
        Html::parse_fragment(&format!("<table>{}</table>", fragment))
    } else if starts_with("<td") || starts_with("<th") {
        Html::parse_fragment(&format!("<table><tr>{}</tr></table>", fragment))
    } else {
        Html::parse_fragment(fragment)
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED.contains(&name) {
                continue;
            }

            let block = BLOCKS.contains(&name);
            if block {
                out.push(SEGMENT_BREAK);
            }
            collect_text(child_element, out);
            if block {
                out.push(SEGMENT_BREAK);
            }
        }
    }
}

/// Collapses whitespace and control-character runs to single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strips markup from a fragment and returns its cleaned text
///
/// Entities are decoded, comments and scripts dropped, and empty segments
/// removed.
pub fn clean_fragment(fragment: &str) -> String {
    let document = parse_fragment(fragment);
    let mut raw = String::with_capacity(fragment.len());
    collect_text(document.root_element(), &mut raw);

    raw.split(SEGMENT_BREAK)
        .map(collapse_whitespace)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Pipe-separated segments of cleaned text, trimmed and non-empty
pub fn segments(text: &str) -> Vec<&str> {
    text.split('|')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}
