//! Scoring groundings against gold answers.

use rayon::prelude::*;

use crate::enrich::post_process_answers_given_graph;
use crate::error::KbResult;
use crate::graph::{Graph, GraphFilter, KbId};
use crate::ground::apply_grounding;
use crate::ground::enumerate::find_groundings;
use crate::search::Generator;

use super::{
    GOLD_CHOSEN_CAP, GoldCandidate, GoldScoring, IMPORTANCE_MIN_ANSWERS, NEGATIVE_F1, RejectedGraph,
    retrieval_prec_rec_f1_with_altlabels, sort_by_f1_desc,
};

impl Generator<'_> {
    /// Ground one skeleton and score every grounding against `gold`.
    ///
    /// A grounding with more than [`IMPORTANCE_MIN_ANSWERS`] answers also
    /// yields an `importance`-filtered variant, scored as its own candidate.
    /// Candidates with F1 above `min_f1` are chosen; candidates with F1 below
    /// [`NEGATIVE_F1`] are rejected. Anything in between is dropped.
    pub fn ground_one_with_gold(
        &self,
        skeleton: &Graph,
        gold: &[String],
        min_f1: f64,
    ) -> KbResult<GoldScoring> {
        let kb = self.kb.kb();
        let mut grounded: Vec<Graph> =
            find_groundings(&self.kb, skeleton, &self.config.v_structure_markers)?
                .iter()
                .map(|p| apply_grounding(skeleton, p))
                .collect();
        let mut denotations = grounded
            .par_iter()
            .map(|g| kb.query_graph_denotations(g))
            .collect::<KbResult<Vec<Vec<KbId>>>>()?;

        for i in 0..grounded.len() {
            if denotations[i].len() > IMPORTANCE_MIN_ANSWERS {
                let mut variant = grounded[i].clone();
                variant.filter = Some(GraphFilter::Importance);
                let important = kb.filter_denotation_by_importance(&denotations[i])?;
                grounded.push(variant);
                denotations.push(important);
            }
        }

        let label_results = self.config.label_query_results;
        let answers = grounded
            .par_iter()
            .zip(denotations.par_iter())
            .map(|(g, ids)| -> KbResult<Vec<Vec<String>>> {
                let labels = if label_results {
                    kb.label_query_results(ids)?
                } else {
                    kb.map_query_results(ids)
                };
                post_process_answers_given_graph(labels, g, kb)
            })
            .collect::<KbResult<Vec<Vec<Vec<String>>>>>()?;
        tracing::debug!(groundings = grounded.len(), "scoring against gold");

        let mut scoring = GoldScoring::default();
        for (graph, answers) in grounded.into_iter().zip(answers) {
            let score = retrieval_prec_rec_f1_with_altlabels(gold, &answers);
            if score.f1 < NEGATIVE_F1 {
                scoring.rejected.push(RejectedGraph {
                    graph: graph.clone(),
                    answer_count: answers.len(),
                });
            }
            if score.f1 > min_f1 {
                scoring.chosen.push(GoldCandidate {
                    graph,
                    score,
                    answers,
                });
            }
        }
        Ok(scoring)
    }

    /// Score skeletons in order, stopping at the first one with chosen candidates.
    ///
    /// Rejections from every skeleton tried are kept. The chosen candidates are
    /// sorted by F1, best first, and capped at [`GOLD_CHOSEN_CAP`].
    pub fn ground_with_gold(
        &self,
        skeletons: &[Graph],
        gold: &[String],
        min_f1: f64,
    ) -> KbResult<GoldScoring> {
        let mut all = GoldScoring::default();
        for skeleton in skeletons {
            if !all.chosen.is_empty() {
                break;
            }
            let scoring = self.ground_one_with_gold(skeleton, gold, min_f1)?;
            all.chosen.extend(scoring.chosen);
            all.rejected.extend(scoring.rejected);
        }
        sort_by_f1_desc(&mut all.chosen);
        all.chosen.truncate(GOLD_CHOSEN_CAP);
        tracing::debug!(chosen = all.chosen.len(), rejected = all.rejected.len(), "gold grounding pass");
        Ok(all)
    }
}
