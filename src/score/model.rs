//! Scoring groundings with a question-answering model.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::error::{KbqaResult, ModelError, ModelResult};
use crate::graph::repr::{ENTITY_PLACEHOLDER, add_string_representations_to_edges, replace_entities};
use crate::graph::{EdgeType, Graph, RelationId};
use crate::ground::apply_grounding;
use crate::ground::enumerate::find_groundings;
use crate::kb::KnowledgeBase;
use crate::search::Generator;

use super::{ModelCandidate, sort_by_score_desc};

/// A model that scores grounded graphs for the question they carry.
pub trait QaModel: Send + Sync {
    /// One score per input graph, in input order.
    fn scores_for_instance(&self, graphs: &[Graph]) -> ModelResult<Vec<f32>>;
}

/// Baseline model: the share of edge-label words that occur in the question.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalOverlapModel;

impl LexicalOverlapModel {
    fn score(graph: &Graph) -> f32 {
        let question: HashSet<String> = graph.tokens.iter().map(|t| t.to_lowercase()).collect();
        let words: Vec<String> = graph
            .edges
            .iter()
            .filter_map(|e| e.label.as_deref())
            .flat_map(str::split_whitespace)
            .filter(|w| *w != ENTITY_PLACEHOLDER)
            .map(str::to_lowercase)
            .collect();
        if words.is_empty() {
            return 0.0;
        }
        let hits = words.iter().filter(|w| question.contains(*w)).count();
        hits as f32 / words.len() as f32
    }
}

impl QaModel for LexicalOverlapModel {
    fn scores_for_instance(&self, graphs: &[Graph]) -> ModelResult<Vec<f32>> {
        Ok(graphs.par_iter().map(Self::score).collect())
    }
}

/// Whether every edge uses a whitelisted relation. Time and v-structure edges always pass.
fn whitelisted(graph: &Graph, kb: &dyn KnowledgeBase) -> bool {
    graph.edges.iter().all(|e| {
        matches!(e.kind, Some(EdgeType::Time | EdgeType::VStructure))
            || e.kb_id.as_ref().is_some_and(|r| kb.is_whitelisted(r.base()))
    })
}

/// Drop qualifier groundings whose base relation some candidate already uses directly.
///
/// Only the last edge of each graph is inspected.
fn prune_redundant_qualifiers(graphs: Vec<Graph>) -> Vec<Graph> {
    let direct: HashSet<String> = graphs
        .iter()
        .filter_map(Graph::last_edge)
        .filter(|e| e.kind.is_some_and(EdgeType::is_first_order))
        .filter_map(|e| e.kb_id.as_ref())
        .filter(|r| !r.is_qualifier())
        .map(|r| r.base().to_string())
        .collect();
    graphs
        .into_iter()
        .filter(|g| match g.last_edge().and_then(|e| e.kb_id.as_ref()) {
            Some(r) if r.is_qualifier() => !direct.contains(r.base()),
            _ => true,
        })
        .collect()
}

/// Drop hop groundings whose hop relation repeats a first-order relation of another candidate.
///
/// A hop is redundant when some candidate's last edge already uses the hop
/// relation as its main relation with the same edge type.
fn prune_redundant_hops(graphs: Vec<Graph>) -> Vec<Graph> {
    let first_order: HashSet<(RelationId, EdgeType)> = graphs
        .iter()
        .filter_map(Graph::last_edge)
        .filter_map(|e| match (e.kind, e.kb_id.as_ref()) {
            (Some(kind), Some(r)) if kind.is_first_order() => Some((r.clone(), kind)),
            _ => None,
        })
        .collect();
    graphs
        .into_iter()
        .filter(|g| {
            let Some(edge) = g.last_edge() else {
                return true;
            };
            match (edge.hop_relation(), edge.kind) {
                (Some(hop), Some(kind)) => !first_order.contains(&(hop.clone(), kind)),
                _ => true,
            }
        })
        .collect()
}

impl Generator<'_> {
    /// Ground skeletons and keep the model's favourites.
    ///
    /// Groundings are optionally restricted to the relation whitelist, given
    /// string representations and pruned of redundant qualifiers and hops.
    /// The survivors are scored in one batch; those scoring above `min_score`
    /// are returned best first, at most `beam_size` of them.
    pub fn ground_with_model(
        &self,
        skeletons: &[Graph],
        model: &dyn QaModel,
        min_score: f32,
    ) -> KbqaResult<Vec<ModelCandidate>> {
        let kb = self.kb.kb();
        let markers = &self.config.v_structure_markers;
        let mut grounded: Vec<Graph> = Vec::new();
        for skeleton in skeletons {
            grounded.extend(
                find_groundings(&self.kb, skeleton, markers)?
                    .iter()
                    .map(|p| apply_grounding(skeleton, p)),
            );
        }
        if self.config.use_whitelist {
            grounded.retain(|g| whitelisted(g, kb));
        }
        tracing::debug!(groundings = grounded.len(), "grounded for model scoring");

        let replace = self.config.replace_entities;
        let property_label = |p: &str| kb.property_label(p);
        let grounded: Vec<Graph> = grounded
            .into_iter()
            .map(|g| add_string_representations_to_edges(g, &property_label, replace))
            .map(|g| if replace { replace_entities(g) } else { g })
            .collect();

        let grounded = prune_redundant_qualifiers(grounded);
        let grounded = prune_redundant_hops(grounded);
        tracing::debug!(groundings = grounded.len(), "after qualifier and hop pruning");
        if grounded.is_empty() {
            return Ok(Vec::new());
        }

        let scores = model.scores_for_instance(&grounded)?;
        if scores.len() != grounded.len() {
            return Err(ModelError::ScoreCountMismatch {
                expected: grounded.len(),
                actual: scores.len(),
            }
            .into());
        }
        let mut chosen: Vec<ModelCandidate> = grounded
            .into_iter()
            .zip(scores)
            .filter(|(_, score)| *score > min_score)
            .map(|(graph, score)| ModelCandidate { graph, score })
            .collect();
        sort_by_score_desc(&mut chosen);
        chosen.truncate(self.config.beam_size);
        tracing::debug!(chosen = chosen.len(), min_score, "model grounding pass");
        Ok(chosen)
    }
}
