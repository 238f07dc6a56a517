use std::collections::VecDeque;

use crate::error::KbqaResult;
use crate::graph::Graph;
use crate::score::{ModelCandidate, QaModel, sort_by_score_desc};

use super::{Generator, MODEL_SEED_SCORE};

impl Generator<'_> {
    /// Search for groundings of `graph` preferred by `model`.
    ///
    /// Every popped candidate is restricted and expanded, and the proposals
    /// are grounded and scored with the popped candidate's score as the bar
    /// (see [`Generator::ground_with_model`]). Chosen candidates are queued
    /// and collected. The search runs until the pool is empty; the collected
    /// candidates are returned best first.
    pub fn generate_with_model(&self, graph: Graph, model: &dyn QaModel) -> KbqaResult<Vec<ModelCandidate>> {
        let graph = self.link_entities(graph)?;
        let mut pool = VecDeque::from([ModelCandidate {
            graph,
            score: MODEL_SEED_SCORE,
        }]);
        let mut generated: Vec<ModelCandidate> = Vec::new();
        let mut iterations = 0usize;

        while let Some(parent) = pool.pop_front() {
            iterations += 1;
            tracing::debug!(pool = pool.len(), score = parent.score, "popped candidate");
            let mut suggested = self.restrict_and_label(&parent.graph)?;
            let expanded: Vec<Graph> = suggested
                .iter()
                .flat_map(|g| self.operators.expand(g))
                .collect();
            suggested.extend(expanded);

            let chosen = self.ground_with_model(&suggested, model, parent.score)?;
            if !chosen.is_empty() {
                tracing::debug!(chosen = chosen.len(), "extending the pool");
                pool.extend(chosen.iter().cloned());
                sort_by_score_desc(pool.make_contiguous());
                generated.extend(chosen);
            }
        }

        sort_by_score_desc(&mut generated);
        tracing::info!(
            iterations,
            generated = generated.len(),
            best_score = ?generated.first().map(|c| c.score),
            "model-guided search finished"
        );
        Ok(generated)
    }
}
