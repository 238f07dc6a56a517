//! Candidate scoring.
//!
//! Two contracts decide which groundings survive a search step:
//!
//! - **Against gold** ([`gold`]): denotations are compared with known answers
//!   and scored by F1 ([`metric`])
//! - **Against a model** ([`model`]): a [`QaModel`](model::QaModel) scores a batch of
//!   grounded graphs, which are then filtered, sorted and cut to a beam

pub mod gold;
pub mod metric;
pub mod model;

use serde::{Deserialize, Serialize};

use crate::graph::Graph;

pub use metric::{PrecRecF1, retrieval_prec_rec_f1_with_altlabels};
pub use model::{LexicalOverlapModel, QaModel};

/// F1 below which a grounding is recorded as a negative example.
pub const NEGATIVE_F1: f64 = 0.01;

/// Maximum number of chosen candidates returned by one gold grounding pass.
pub const GOLD_CHOSEN_CAP: usize = 3;

/// Denotations larger than this also get an importance-filtered variant.
pub const IMPORTANCE_MIN_ANSWERS: usize = 3;

/// A grounded graph scored against gold answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldCandidate {
    pub graph: Graph,
    pub score: PrecRecF1,
    /// Retrieved answers, one label list per answer entity.
    pub answers: Vec<Vec<String>>,
}

impl GoldCandidate {
    /// The unscored starting point of a search.
    pub fn seed(graph: Graph) -> Self {
        Self {
            graph,
            score: PrecRecF1::default(),
            answers: Vec::new(),
        }
    }

    pub fn f1(&self) -> f64 {
        self.score.f1
    }
}

/// A grounding whose answers missed the gold answers entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedGraph {
    pub graph: Graph,
    /// Number of answers the grounding retrieved.
    pub answer_count: usize,
}

/// Result of scoring skeleton groundings against gold answers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoldScoring {
    /// Candidates whose F1 beat the caller's minimum.
    pub chosen: Vec<GoldCandidate>,
    /// Candidates with F1 below [`NEGATIVE_F1`].
    pub rejected: Vec<RejectedGraph>,
}

/// A grounded graph scored by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCandidate {
    pub graph: Graph,
    pub score: f32,
}

/// Stable descending sort by F1.
pub fn sort_by_f1_desc(candidates: &mut [GoldCandidate]) {
    candidates.sort_by(|a, b| b.f1().total_cmp(&a.f1()));
}

/// Stable descending sort by model score.
pub fn sort_by_score_desc(candidates: &mut [ModelCandidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeType};

    fn candidate(tag: &str, f1: f64) -> GoldCandidate {
        GoldCandidate {
            graph: Graph::new(vec![Edge::grounded(EdgeType::Direct, tag)]),
            score: PrecRecF1 {
                precision: f1,
                recall: f1,
                f1,
            },
            answers: vec![],
        }
    }

    #[test]
    fn f1_sort_is_stable() {
        let mut pool = vec![
            candidate("P1v", 0.2),
            candidate("P2v", 0.5),
            candidate("P3v", 0.2),
            candidate("P4v", 0.9),
        ];
        sort_by_f1_desc(&mut pool);
        let order: Vec<&str> = pool
            .iter()
            .map(|c| c.graph.edges[0].kb_id.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(order, vec!["P4v", "P2v", "P1v", "P3v"]);
    }

    #[test]
    fn seed_scores_zero() {
        let seed = GoldCandidate::seed(Graph::default());
        assert_eq!(seed.f1(), 0.0);
        assert!(seed.answers.is_empty());
    }
}
