//! Field normalizer
//!
//! Turns persisted [`RawPosting`]s into [`TypedRecord`]s:
//! 1. strip markup and decode entities ([`clean::clean_fragment`])
//! 2. run the ordered field recognizers over the cleaned text
//! 3. keep the original substring of every field whose value reads differently
//!
//! `normalize` is a pure function of the posting, so re-running it over the
//! same raw file always produces the same typed file.

pub mod clean;
pub mod recognizers;

use crate::storage::{self, RawPosting, SinkError, TypedRecord};
use rayon::prelude::*;
use recognizers::{Canonical, Observed};
use std::collections::BTreeMap;
use std::path::Path;

pub use clean::clean_fragment;

/// Records `observed.original` under `field` when it differs from the value
fn keep<T: Canonical>(
    field: &str,
    observed: Option<Observed<'_, T>>,
    originals: &mut BTreeMap<String, String>,
) -> Option<T> {
    let observed = observed?;
    if observed.differs() {
        originals.insert(field.to_string(), observed.original.to_string());
    }
    observed.value
}

/// Derives the typed view of one posting
pub fn normalize(posting: &RawPosting) -> TypedRecord {
    let text = clean_fragment(&posting.raw_html_fragment);
    let mut originals = BTreeMap::new();

    let institution = keep("institution", recognizers::institution(&text), &mut originals);
    let program = keep("program", recognizers::program(&text), &mut originals);
    let degree = keep("degree", recognizers::degree(&text), &mut originals).unwrap_or_default();
    let decision =
        keep("decision", recognizers::decision(&text), &mut originals).unwrap_or_default();
    let gpa = keep("gpa", recognizers::gpa(&text), &mut originals);
    let gre_total = keep("gre_total", recognizers::gre_total(&text), &mut originals);
    let gre_verbal = keep("gre_verbal", recognizers::gre_verbal(&text), &mut originals);
    let gre_quant = keep("gre_quant", recognizers::gre_quant(&text), &mut originals);
    let gre_aw = keep("gre_aw", recognizers::gre_aw(&text), &mut originals);
    let decision_date = keep(
        "decision_date",
        recognizers::decision_date(&text),
        &mut originals,
    );
    let term = keep("term", recognizers::term(&text), &mut originals);
    let citizenship = keep("citizenship", recognizers::citizenship(&text), &mut originals);

    TypedRecord {
        raw_id: posting.id.clone(),
        source_url: posting.source_url.clone(),
        text,
        institution,
        program,
        degree,
        decision,
        gpa,
        gre_total,
        gre_verbal,
        gre_quant,
        gre_aw,
        decision_date,
        term,
        citizenship,
        originals,
    }
}

/// Normalizes every posting in parallel; output order matches input order
pub fn normalize_all(postings: &[RawPosting]) -> Vec<TypedRecord> {
    postings.par_iter().map(normalize).collect()
}

/// Reads the raw file, normalizes it, and replaces the typed file
pub fn normalize_file(raw_path: &Path, typed_path: &Path) -> Result<Vec<TypedRecord>, SinkError> {
    let postings = storage::load_raw(raw_path)?;
    tracing::info!(
        "Normalizing {} raw postings from {}",
        postings.len(),
        raw_path.display()
    );

    let records = normalize_all(&postings);
    storage::write_typed(typed_path, &records)?;
    Ok(records)
}
