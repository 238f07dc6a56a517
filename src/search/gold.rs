use std::collections::VecDeque;

use crate::error::KbqaResult;
use crate::graph::Graph;
use crate::score::{GoldCandidate, RejectedGraph, sort_by_f1_desc};

use super::{ACCEPT_F1, BONUS_ROUND_F1, Generator, STOP_F1};

/// Result of a gold-guided search.
#[derive(Debug, Clone, Default)]
pub struct GoldSearchOutcome {
    /// Accepted candidates in acceptance order.
    pub positives: Vec<GoldCandidate>,
    /// Groundings that retrieved none of the gold answers.
    pub negatives: Vec<RejectedGraph>,
    /// Number of candidates popped from the pool.
    pub iterations: usize,
}

impl GoldSearchOutcome {
    /// The highest-scoring accepted candidate.
    pub fn best(&self) -> Option<&GoldCandidate> {
        self.positives
            .iter()
            .reduce(|best, c| if c.f1() > best.f1() { c } else { best })
    }

    pub fn best_f1(&self) -> f64 {
        self.best().map_or(0.0, GoldCandidate::f1)
    }
}

impl Generator<'_> {
    /// Search for groundings of `graph` whose answers match `gold`.
    ///
    /// Mentions are linked first. A popped candidate with F1 below
    /// [`ACCEPT_F1`] is refined: its restrictions are grounded one at a time
    /// until one yields candidates that beat the popped F1, expanding a
    /// restriction when it yields nothing by itself. If the best newly
    /// chosen F1 is below [`BONUS_ROUND_F1`] one more restriction is tried
    /// with that F1 as the bar. Chosen candidates go back into the pool,
    /// which is re-sorted by F1. A candidate that cannot be improved, or
    /// that already reaches [`ACCEPT_F1`], is accepted.
    ///
    /// The search ends when the pool is empty or an accepted candidate
    /// reaches [`STOP_F1`].
    pub fn generate_with_gold(&self, graph: Graph, gold: &[String]) -> KbqaResult<GoldSearchOutcome> {
        let graph = self.link_entities(graph)?;
        let mut pool = VecDeque::from([GoldCandidate::seed(graph)]);
        let mut outcome = GoldSearchOutcome::default();

        while outcome.best_f1() < STOP_F1 {
            let Some(candidate) = pool.pop_front() else {
                break;
            };
            outcome.iterations += 1;
            tracing::debug!(pool = pool.len(), f1 = candidate.f1(), "popped candidate");

            let mut master_f1 = candidate.f1();
            if master_f1 >= ACCEPT_F1 {
                outcome.positives.push(candidate);
                continue;
            }

            let mut suggested: VecDeque<Graph> = self.restrict_and_label(&candidate.graph)?.into();
            let mut chosen: Vec<GoldCandidate> = Vec::new();
            let mut bonus_round = false;
            while chosen.is_empty() || bonus_round {
                let Some(skeleton) = suggested.pop_front() else {
                    break;
                };
                if bonus_round {
                    tracing::debug!("bonus round");
                }
                bonus_round = false;

                let scoring = self.ground_with_gold(std::slice::from_ref(&skeleton), gold, master_f1)?;
                chosen.extend(scoring.chosen);
                outcome.negatives.extend(scoring.rejected);
                if chosen.is_empty() {
                    let expanded = self.operators.expand(&skeleton);
                    let scoring = self.ground_with_gold(&expanded, gold, master_f1)?;
                    chosen.extend(scoring.chosen);
                    outcome.negatives.extend(scoring.rejected);
                }
                if let Some(best) = chosen.iter().map(GoldCandidate::f1).reduce(f64::max) {
                    if best < BONUS_ROUND_F1 {
                        bonus_round = true;
                        master_f1 = best;
                    }
                }
            }

            if chosen.is_empty() {
                outcome.positives.push(candidate);
            } else {
                tracing::debug!(chosen = chosen.len(), "extending the pool");
                pool.extend(chosen);
                sort_by_f1_desc(pool.make_contiguous());
            }
        }

        tracing::info!(
            iterations = outcome.iterations,
            positives = outcome.positives.len(),
            negatives = outcome.negatives.len(),
            best_f1 = outcome.best_f1(),
            "gold-guided search finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GenerationConfig;
    use crate::graph::{Entity, Graph};
    use crate::kb::memory::MemoryKb;
    use crate::link::LabelLinker;
    use crate::operators::EntityEdgeOperators;
    use crate::search::Generator;

    #[test]
    fn empty_pool_terminates_below_stop_f1() {
        let kb = MemoryKb::new();
        let linker = LabelLinker::new(&kb);
        let operators = EntityEdgeOperators;
        let generator = Generator::new(&kb, &linker, &operators, GenerationConfig::default());
        let graph = Graph::for_question(["who", "?"], vec![Entity::new(["nobody"], "NN")]);
        let outcome = generator
            .generate_with_gold(graph, &["barack obama".to_string()])
            .unwrap();
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.positives.len(), 1);
        assert_eq!(outcome.best_f1(), 0.0);
        assert!(outcome.negatives.is_empty());
    }
}
