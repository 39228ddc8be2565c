//! Statistics over the typed record file
//!
//! This module aggregates normalized records into the summary printed by
//! `--stats`.

use crate::storage::{Citizenship, Decision, Degree, TypedRecord};
use std::collections::{BTreeMap, HashMap};

/// Mean of the values that are set, with how many there were
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mean {
    pub value: Option<f64>,
    pub samples: usize,
}

impl Mean {
    fn of(values: impl Iterator<Item = Option<f64>>) -> Self {
        let (sum, samples) = values
            .flatten()
            .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
        Self {
            value: (samples > 0).then(|| sum / samples as f64),
            samples,
        }
    }
}

/// Harvest statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestStatistics {
    /// Total number of typed records
    pub total_records: usize,

    /// Count of records by decision
    pub by_decision: HashMap<Decision, usize>,

    /// Count of records by degree
    pub by_degree: HashMap<Degree, usize>,

    /// Count of records by admission term, ordered by term label
    pub by_term: BTreeMap<String, usize>,

    /// Percentage of records with a known citizenship that are international
    pub international_share: Option<f64>,

    /// Percentage of records with a known decision that were accepted
    pub acceptance_rate: Option<f64>,

    pub mean_gpa: Mean,
    pub mean_gre_total: Mean,
    pub mean_gre_verbal: Mean,
    pub mean_gre_quant: Mean,
    pub mean_gre_aw: Mean,
}

fn percentage(part: usize, whole: usize) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64 * 100.0)
}

/// Aggregates typed records into summary statistics
pub fn summarize(records: &[TypedRecord]) -> HarvestStatistics {
    let mut by_decision = HashMap::new();
    let mut by_degree = HashMap::new();
    let mut by_term = BTreeMap::new();
    let mut international = 0;
    let mut citizenship_known = 0;

    for record in records {
        *by_decision.entry(record.decision).or_insert(0) += 1;
        *by_degree.entry(record.degree).or_insert(0) += 1;
        if let Some(term) = &record.term {
            *by_term.entry(term.clone()).or_insert(0) += 1;
        }
        if let Some(citizenship) = record.citizenship {
            citizenship_known += 1;
            if citizenship == Citizenship::International {
                international += 1;
            }
        }
    }

    let decided = records.len() - by_decision.get(&Decision::Unknown).copied().unwrap_or(0);
    let accepted = by_decision.get(&Decision::Accepted).copied().unwrap_or(0);

    HarvestStatistics {
        total_records: records.len(),
        by_decision,
        by_degree,
        by_term,
        international_share: percentage(international, citizenship_known),
        acceptance_rate: percentage(accepted, decided),
        mean_gpa: Mean::of(records.iter().map(|r| r.gpa)),
        mean_gre_total: Mean::of(records.iter().map(|r| r.gre_total)),
        mean_gre_verbal: Mean::of(records.iter().map(|r| r.gre_verbal)),
        mean_gre_quant: Mean::of(records.iter().map(|r| r.gre_quant)),
        mean_gre_aw: Mean::of(records.iter().map(|r| r.gre_aw)),
    }
}

fn print_counts<K: std::fmt::Display>(counts: Vec<(K, usize)>, total: usize) {
    for (key, count) in counts {
        let share = percentage(count, total).unwrap_or(0.0);
        println!("  {}: {} ({:.1}%)", key, count, share);
    }
}

fn print_mean(label: &str, mean: &Mean) {
    match mean.value {
        Some(value) => println!("  {}: {:.2} (n={})", label, value, mean.samples),
        None => println!("  {}: n/a", label),
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");
    println!("Total records: {}\n", stats.total_records);

    println!("Records by Decision:");
    // Sort by count (descending)
    let mut decisions: Vec<_> = stats.by_decision.iter().map(|(k, v)| (*k, *v)).collect();
    decisions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
    print_counts(decisions, stats.total_records);
    println!();

    println!("Records by Degree:");
    let mut degrees: Vec<_> = stats.by_degree.iter().map(|(k, v)| (*k, *v)).collect();
    degrees.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
    print_counts(degrees, stats.total_records);
    println!();

    if !stats.by_term.is_empty() {
        println!("Records by Term:");
        let terms: Vec<_> = stats.by_term.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        print_counts(terms, stats.total_records);
        println!();
    }

    println!("Averages:");
    print_mean("GPA", &stats.mean_gpa);
    print_mean("GRE total", &stats.mean_gre_total);
    print_mean("GRE verbal", &stats.mean_gre_verbal);
    print_mean("GRE quant", &stats.mean_gre_quant);
    print_mean("GRE writing", &stats.mean_gre_aw);
    println!();

    match stats.acceptance_rate {
        Some(rate) => println!("Acceptance rate: {:.2}% of decided records", rate),
        None => println!("Acceptance rate: n/a"),
    }
    match stats.international_share {
        Some(share) => println!("International applicants: {:.2}%", share),
        None => println!("International applicants: n/a"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(decision: Decision, degree: Degree, gpa: Option<f64>) -> TypedRecord {
        TypedRecord {
            raw_id: String::new(),
            source_url: String::new(),
            text: String::new(),
            institution: None,
            program: None,
            degree,
            decision,
            gpa,
            gre_total: None,
            gre_verbal: None,
            gre_quant: None,
            gre_aw: None,
            decision_date: None,
            term: None,
            citizenship: None,
            originals: BTreeMap::new(),
        }
    }

    #[test]
    fn test_summarize_counts_and_means() {
        let mut records = vec![
            record(Decision::Accepted, Degree::PhD, Some(3.8)),
            record(Decision::Rejected, Degree::PhD, Some(3.4)),
            record(Decision::Accepted, Degree::Masters, None),
            record(Decision::Unknown, Degree::Unknown, None),
        ];
        records[0].term = Some("Fall 2026".to_string());
        records[1].term = Some("Fall 2026".to_string());
        records[0].citizenship = Some(Citizenship::International);
        records[1].citizenship = Some(Citizenship::American);

        let stats = summarize(&records);

        assert_eq!(stats.total_records, 4);
        assert_eq!(stats.by_decision[&Decision::Accepted], 2);
        assert_eq!(stats.by_degree[&Degree::PhD], 2);
        assert_eq!(stats.by_term["Fall 2026"], 2);
        assert_eq!(stats.mean_gpa.samples, 2);
        assert!((stats.mean_gpa.value.unwrap() - 3.6).abs() < 1e-9);
        assert_eq!(stats.mean_gre_verbal.value, None);

        // 2 accepted out of 3 with a known decision
        assert!((stats.acceptance_rate.unwrap() - 66.666).abs() < 0.01);
        assert_eq!(stats.international_share, Some(50.0));
    }

    #[test]
    fn test_summarize_empty() {
        let stats = summarize(&[]);
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.acceptance_rate, None);
        assert_eq!(stats.mean_gpa, Mean::default());
    }
}
