//! Knowledge-base boundary.
//!
//! [`KnowledgeBase`] is the contract the generator consumes: grounding queries,
//! denotations, labels and the handful of typed lookups the enrichment step
//! needs. [`KbSession`] scopes a read-through grounding cache to one generator
//! so that cached results never leak between unrelated questions.
//!
//! [`memory::MemoryKb`] is an in-memory triple store answering every query.

pub mod memory;

use dashmap::DashMap;

use crate::error::KbResult;
use crate::ground::Grounding;
use crate::graph::{Graph, KbId};

/// Outcome of a joint grounding query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroundingQuery {
    /// The service resolved the skeleton; possibly to zero groundings.
    Resolved(Vec<Grounding>),
    /// The skeleton is too complex for one joint query.
    TooComplex,
}

impl GroundingQuery {
    /// Groundings, treating `TooComplex` as "no branch here".
    pub fn into_groundings(self) -> Vec<Grounding> {
        match self {
            Self::Resolved(groundings) => groundings,
            Self::TooComplex => Vec::new(),
        }
    }
}

/// Whether a grounding query may be answered from the session cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Use,
    Bypass,
}

/// A knowledge-base query service.
///
/// Implementations must be safe to call concurrently: the generator fans out
/// independent queries within one search iteration. A timeout or transport
/// failure must surface as a [`KbError`](crate::error::KbError), never as an
/// empty result.
pub trait KnowledgeBase: Send + Sync {
    /// Jointly ground every free edge of `skeleton`.
    ///
    /// Free edges that already carry a type are grounded with that type only.
    fn query_graph_groundings(&self, skeleton: &Graph) -> KbResult<GroundingQuery>;

    /// The entities a grounded graph evaluates to.
    fn query_graph_denotations(&self, graph: &Graph) -> KbResult<Vec<KbId>>;

    /// Whether a (partially) grounded graph has at least one match.
    fn graph_exists(&self, graph: &Graph) -> KbResult<bool>;

    /// Characters named `name` appearing in the work `film`.
    fn character_roles(&self, name: &str, film: &str) -> KbResult<Vec<KbId>>;

    /// The demonym for a country or region, e.g. `Q843` → "Pakistani".
    fn demonym(&self, entity: &str) -> KbResult<Option<String>>;

    /// The canonical label of an entity.
    fn label_entity(&self, entity: &str) -> KbResult<Option<String>>;

    /// Display name of a property (base id without statement suffix).
    fn property_label(&self, property: &str) -> Option<String>;

    /// Whether a property (base id) is on the relation whitelist.
    fn is_whitelisted(&self, property: &str) -> bool;

    /// Resolve each id to its lowercased labels (canonical first, then aliases).
    fn label_query_results(&self, ids: &[KbId]) -> KbResult<Vec<Vec<String>>>;

    /// Keep only the most important entities of a large denotation.
    fn filter_denotation_by_importance(&self, ids: &[KbId]) -> KbResult<Vec<KbId>>;

    /// Map each id to itself, for evaluation against raw ids.
    fn map_query_results(&self, ids: &[KbId]) -> Vec<Vec<String>> {
        ids.iter().map(|id| vec![id.to_lowercase()]).collect()
    }
}

/// A knowledge base together with a grounding cache scoped to one generator.
pub struct KbSession<'a> {
    kb: &'a dyn KnowledgeBase,
    cache: DashMap<String, GroundingQuery>,
}

impl<'a> KbSession<'a> {
    pub fn new(kb: &'a dyn KnowledgeBase) -> Self {
        Self {
            kb,
            cache: DashMap::new(),
        }
    }

    /// The underlying query service.
    pub fn kb(&self) -> &'a dyn KnowledgeBase {
        self.kb
    }

    /// Ground `skeleton`, reading through the cache when `policy` allows.
    pub fn groundings(&self, skeleton: &Graph, policy: CachePolicy) -> KbResult<GroundingQuery> {
        if policy == CachePolicy::Bypass {
            return self.kb.query_graph_groundings(skeleton);
        }
        let key = match serde_json::to_string(skeleton) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(error = %e, "skeleton not cacheable, querying directly");
                return self.kb.query_graph_groundings(skeleton);
            }
        };
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.value().clone());
        }
        let result = self.kb.query_graph_groundings(skeleton)?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    /// Number of cached grounding queries.
    pub fn cached_queries(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for KbSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KbSession")
            .field("cached_queries", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::kb::memory::{KbFixture, MemoryKb};

    fn kb() -> MemoryKb {
        MemoryKb::from_fixture(KbFixture {
            triples: vec![["Q76".into(), "P166".into(), "Q35637".into()]],
            ..Default::default()
        })
    }

    #[test]
    fn cache_reads_through_once() {
        let kb = kb();
        let session = KbSession::new(&kb);
        let skeleton = Graph::new(vec![Edge::free(vec![], Some("Q35637".into()))]);

        let first = session.groundings(&skeleton, CachePolicy::Use).unwrap();
        assert_eq!(session.cached_queries(), 1);
        let second = session.groundings(&skeleton, CachePolicy::Use).unwrap();
        assert_eq!(first, second);
        assert_eq!(session.cached_queries(), 1);

        session.clear_cache();
        assert_eq!(session.cached_queries(), 0);
    }

    #[test]
    fn bypass_does_not_populate_cache() {
        let kb = kb();
        let session = KbSession::new(&kb);
        let skeleton = Graph::new(vec![Edge::free(vec![], Some("Q35637".into()))]);
        let result = session.groundings(&skeleton, CachePolicy::Bypass).unwrap();
        assert!(matches!(result, GroundingQuery::Resolved(ref g) if !g.is_empty()));
        assert_eq!(session.cached_queries(), 0);
    }

    #[test]
    fn too_complex_means_no_groundings() {
        assert!(GroundingQuery::TooComplex.into_groundings().is_empty());
    }
}
