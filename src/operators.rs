//! Graph operators proposing refined skeletons.

use crate::graph::{Edge, Graph, Hop, HopDirection};

/// Proposal functions over a graph. Implementations must be pure.
pub trait GraphOperators: Send + Sync {
    /// Skeletons that add a constraint to `graph`.
    fn restrict(&self, graph: &Graph) -> Vec<Graph>;

    /// Skeletons that lengthen the path of `graph`'s newest edge.
    fn expand(&self, graph: &Graph) -> Vec<Graph>;

    /// Variants that need no knowledge-base check.
    fn non_linking(&self, _graph: &Graph) -> Vec<Graph> {
        Vec::new()
    }
}

/// Restrict by attaching a linked mention as a new free edge; expand by
/// asking for a hop on that edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityEdgeOperators;

impl GraphOperators for EntityEdgeOperators {
    /// One skeleton per (mention, candidate id) pair, in mention then rank
    /// order. The mention is consumed: it no longer appears in the skeleton's
    /// entities. Numerals and mentions without candidates are never attached.
    fn restrict(&self, graph: &Graph) -> Vec<Graph> {
        let mut restricted = Vec::new();
        for (i, entity) in graph.entities.iter().enumerate() {
            if entity.is_numeral() {
                continue;
            }
            for id in entity.linkings.iter().flatten() {
                let mut g = graph.clone();
                g.entities.remove(i);
                g.edges.push(Edge::free(entity.tokens.clone(), Some(id.clone())));
                restricted.push(g);
            }
        }
        restricted
    }

    fn expand(&self, graph: &Graph) -> Vec<Graph> {
        match graph.last_edge() {
            Some(edge) if edge.is_free() && edge.hop.is_none() => {
                let mut g = graph.clone();
                if let Some(last) = g.edges.last_mut() {
                    last.hop = Some(Hop::marker(HopDirection::Up));
                }
                vec![g]
            }
            _ => Vec::new(),
        }
    }
}
