use std::collections::VecDeque;

use rayon::prelude::*;

use crate::enrich::add_canonical_labels_to_entities;
use crate::error::{KbResult, KbqaResult};
use crate::graph::Graph;
use crate::ground::enumerate::{find_groundings_with_gold, verify_grounding};

use super::Generator;

impl Generator<'_> {
    /// Enumerate every skeleton reachable from `graph` and ground it against
    /// the relation whitelist.
    ///
    /// Each popped graph is restricted and its restrictions expanded; all
    /// proposals are queued, labelled and kept together with their
    /// non-linking variants. Once the pool is exhausted, skeletons the
    /// knowledge base cannot confirm are dropped, mentions are stripped and
    /// the rest are grounded by [`Generator::ground_without_gold`].
    pub fn generate_without_gold(&self, graph: Graph) -> KbqaResult<Vec<Graph>> {
        let graph = self.link_entities(graph)?;
        let mut pool = VecDeque::from([graph]);
        let mut generated: Vec<Graph> = Vec::new();
        let mut iterations = 0usize;

        while let Some(g) = pool.pop_front() {
            if iterations % 10 == 0 {
                tracing::debug!(pool = pool.len(), generated = generated.len(), "whitelist search");
            }
            iterations += 1;
            let mut suggested = self.operators.restrict(&g);
            let expanded: Vec<Graph> = suggested
                .iter()
                .flat_map(|s| self.operators.expand(s))
                .collect();
            suggested.extend(expanded);
            pool.extend(suggested.iter().cloned());

            let mut labelled = suggested
                .into_iter()
                .map(|s| add_canonical_labels_to_entities(s, self.kb.kb()))
                .collect::<KbResult<Vec<Graph>>>()?;
            let variants: Vec<Graph> = labelled
                .iter()
                .flat_map(|s| self.operators.non_linking(s))
                .collect();
            labelled.extend(variants);
            generated.extend(labelled);
        }

        let kb = self.kb.kb();
        let confirmed = generated
            .par_iter()
            .map(|g| verify_grounding(kb, g))
            .collect::<KbResult<Vec<bool>>>()?;
        let skeletons: Vec<Graph> = generated
            .into_iter()
            .zip(confirmed)
            .filter_map(|(g, ok)| ok.then_some(g))
            .map(|mut g| {
                g.entities.clear();
                g
            })
            .collect();
        tracing::debug!(iterations, skeletons = skeletons.len(), "verified skeletons");

        let grounded = self.ground_without_gold(&skeletons)?;
        tracing::info!(iterations, grounded = grounded.len(), "whitelist-only search finished");
        Ok(grounded)
    }

    /// Ground `skeletons` and keep the groundings whose every edge uses a
    /// whitelisted relation.
    ///
    /// The grounding cache is cleared afterwards, also when grounding fails.
    pub fn ground_without_gold(&self, skeletons: &[Graph]) -> KbResult<Vec<Graph>> {
        let kb = self.kb.kb();
        let grounded = skeletons
            .iter()
            .map(|s| find_groundings_with_gold(&self.kb, s))
            .collect::<KbResult<Vec<Vec<Graph>>>>();
        self.kb.clear_cache();

        let mut grounded: Vec<Graph> = grounded?.into_iter().flatten().collect();
        tracing::debug!(groundings = grounded.len(), "possible groundings");
        grounded.retain(|g| {
            g.edges
                .iter()
                .all(|e| e.kb_id.as_ref().is_some_and(|r| kb.is_whitelisted(r.base())))
        });
        tracing::debug!(groundings = grounded.len(), "whitelisted groundings");
        Ok(grounded)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GenerationConfig;
    use crate::graph::{Edge, Graph};
    use crate::kb::memory::MemoryKb;
    use crate::link::LabelLinker;
    use crate::operators::EntityEdgeOperators;
    use crate::search::Generator;

    #[test]
    fn grounding_pass_filters_by_whitelist_and_clears_cache() {
        let kb = MemoryKb::new().with_max_joint_edges(1);
        kb.insert_triple("Q76", "P166", "Q35637");
        kb.insert_triple("Q35637", "P17", "Q20");
        kb.insert_triple("Q76", "P27", "Q30");
        kb.whitelist_property("P166");
        kb.whitelist_property("P27");
        let linker = LabelLinker::new(&kb);
        let operators = EntityEdgeOperators;
        let generator = Generator::new(&kb, &linker, &operators, GenerationConfig::default());

        let single = Graph::new(vec![Edge::free(vec![], Some("Q35637".into()))]);
        let pair = Graph::new(vec![
            Edge::free(vec![], Some("Q35637".into())),
            Edge::free(vec![], Some("Q30".into())),
        ]);
        let grounded = generator.ground_without_gold(&[single, pair]).unwrap();
        let relations: Vec<Vec<&str>> = grounded
            .iter()
            .map(|g| g.edges.iter().map(|e| e.kb_id.as_ref().unwrap().as_str()).collect())
            .collect();
        assert_eq!(relations, vec![vec!["P166v"], vec!["P166v", "P27v"]]);
        assert_eq!(generator.session().cached_queries(), 0);
    }
}
