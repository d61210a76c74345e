//! Reference-overlap scorers for best-scored selection.

use crate::document::{Document, Report};
use std::collections::HashMap;
use std::hash::Hash;

/// Scores a report against the document it summarises. Higher is better.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, report: &Report, reference: &Document) -> f64;
}

fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn counts<T: Eq + Hash>(items: impl IntoIterator<Item = T>) -> HashMap<T, usize> {
    let mut counts = HashMap::new();
    for item in items {
        *counts.entry(item).or_insert(0) += 1;
    }
    counts
}

/// F1 over clipped n-gram counts; 0.0 when either side is empty
fn overlap_f1<T: Eq + Hash>(candidate: HashMap<T, usize>, reference: HashMap<T, usize>) -> f64 {
    let candidate_total: usize = candidate.values().sum();
    let reference_total: usize = reference.values().sum();
    if candidate_total == 0 || reference_total == 0 {
        return 0.0;
    }

    let overlap: usize = candidate
        .iter()
        .map(|(gram, n)| (*n).min(reference.get(gram).copied().unwrap_or(0)))
        .sum();
    if overlap == 0 {
        return 0.0;
    }

    let precision = overlap as f64 / candidate_total as f64;
    let recall = overlap as f64 / reference_total as f64;
    2.0 * precision * recall / (precision + recall)
}

/// ROUGE-1 F1 on lower-cased whitespace tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct UnigramOverlapScorer;

impl Scorer for UnigramOverlapScorer {
    fn name(&self) -> &str {
        "rouge-1"
    }

    fn score(&self, report: &Report, reference: &Document) -> f64 {
        overlap_f1(
            counts(tokens(&report.content)),
            counts(tokens(&reference.content)),
        )
    }
}

/// ROUGE-2 F1 on lower-cased whitespace tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct BigramOverlapScorer;

impl BigramOverlapScorer {
    fn bigrams(text: &str) -> HashMap<(String, String), usize> {
        let tokens = tokens(text);
        counts(
            tokens
                .windows(2)
                .map(|pair| (pair[0].clone(), pair[1].clone())),
        )
    }
}

impl Scorer for BigramOverlapScorer {
    fn name(&self) -> &str {
        "rouge-2"
    }

    fn score(&self, report: &Report, reference: &Document) -> f64 {
        overlap_f1(Self::bigrams(&report.content), Self::bigrams(&reference.content))
    }
}

/// The scorers used when no others are configured
pub fn default_scorers() -> Vec<Box<dyn Scorer>> {
    vec![Box::new(UnigramOverlapScorer), Box::new(BigramOverlapScorer)]
}
