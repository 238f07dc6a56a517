//! Retrieval precision/recall/F1 with alternative-label tolerance.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Precision, recall and F1 of one retrieved answer list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecRecF1 {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl PrecRecF1 {
    pub fn new(precision: f64, recall: f64) -> Self {
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
        }
    }
}

/// Compare gold answers against retrieved answers that each carry several labels.
///
/// A retrieved answer counts as correct if any of its labels matches a gold
/// answer, and a gold answer counts as found if any label of any retrieved
/// answer matches it. Matching is case-insensitive. Empty inputs score zero.
pub fn retrieval_prec_rec_f1_with_altlabels(gold: &[String], retrieved: &[Vec<String>]) -> PrecRecF1 {
    if gold.is_empty() || retrieved.is_empty() {
        return PrecRecF1::default();
    }
    let gold: HashSet<String> = gold.iter().map(|g| g.trim().to_lowercase()).collect();
    let retrieved: Vec<HashSet<String>> = retrieved
        .iter()
        .map(|labels| labels.iter().map(|l| l.trim().to_lowercase()).collect())
        .collect();

    let correct = retrieved
        .iter()
        .filter(|labels| labels.iter().any(|l| gold.contains(l)))
        .count();
    let found = gold
        .iter()
        .filter(|g| retrieved.iter().any(|labels| labels.contains(*g)))
        .count();
    PrecRecF1::new(
        correct as f64 / retrieved.len() as f64,
        found as f64 / gold.len() as f64,
    )
}
