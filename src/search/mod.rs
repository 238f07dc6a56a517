//! Best-first search over candidate logical forms.
//!
//! A [`Generator`] owns the grounding cache for one search and drives one of
//! three policies over a pool of candidates:
//!
//! - **Gold-guided** ([`Generator::generate_with_gold`]): F1 against known answers
//! - **Model-guided** ([`Generator::generate_with_model`]): scores from a [`QaModel`](crate::score::QaModel)
//! - **Whitelist-only** ([`Generator::generate_without_gold`]): no scoring, whitelist filter
//!
//! All three pop from the front of the pool. The scored policies keep the pool
//! sorted best first with a stable sort, so ties keep insertion order.

mod gold;
mod model;
mod whitelist;

pub use gold::GoldSearchOutcome;

use crate::config::GenerationConfig;
use crate::enrich::{add_canonical_labels_to_entities, link_entities_in_graph};
use crate::error::KbResult;
use crate::graph::Graph;
use crate::kb::{KbSession, KnowledgeBase};
use crate::link::EntityLinker;
use crate::operators::GraphOperators;

/// A popped candidate below this F1 is refined further; at or above it, it is accepted.
pub const ACCEPT_F1: f64 = 0.7;

/// Gold-guided search stops once an accepted candidate reaches this F1.
pub const STOP_F1: f64 = 0.9;

/// When the best newly chosen F1 is below this, another skeleton is tried.
pub const BONUS_ROUND_F1: f64 = 0.05;

/// Initial score of the model-guided seed.
pub const MODEL_SEED_SCORE: f32 = -1.0;

/// Search driver bound to one knowledge base, linker and operator set.
pub struct Generator<'a> {
    pub(crate) kb: KbSession<'a>,
    pub(crate) linker: &'a dyn EntityLinker,
    pub(crate) operators: &'a dyn GraphOperators,
    pub(crate) config: GenerationConfig,
}

impl<'a> Generator<'a> {
    pub fn new(
        kb: &'a dyn KnowledgeBase,
        linker: &'a dyn EntityLinker,
        operators: &'a dyn GraphOperators,
        config: GenerationConfig,
    ) -> Self {
        Self {
            kb: KbSession::new(kb),
            linker,
            operators,
            config,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// The grounding cache and query service used by this generator.
    pub fn session(&self) -> &KbSession<'a> {
        &self.kb
    }

    /// Link the question mentions of `graph`.
    pub fn link_entities(&self, graph: Graph) -> KbResult<Graph> {
        link_entities_in_graph(graph, self.linker, self.kb.kb(), &self.config.v_structure_markers)
    }

    /// Restrict `graph` and label the right-hand entities of each proposal.
    fn restrict_and_label(&self, graph: &Graph) -> KbResult<Vec<Graph>> {
        self.operators
            .restrict(graph)
            .into_iter()
            .map(|g| add_canonical_labels_to_entities(g, self.kb.kb()))
            .collect()
    }
}

impl std::fmt::Debug for Generator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("kb", &self.kb)
            .field("config", &self.config)
            .finish()
    }
}
