//! Entity linking: mapping question mentions to ranked knowledge-base ids.

use std::collections::HashSet;

use crate::error::KbResult;
use crate::graph::{Entity, KbId};
use crate::kb::memory::MemoryKb;

/// Default number of candidate ids kept per mention.
pub const DEFAULT_MAX_ENTITY_OPTIONS: usize = 3;

/// An entity-linking service.
pub trait EntityLinker: Send + Sync {
    /// Candidate ids for a mention, best first, at most [`max_entity_options`](Self::max_entity_options).
    fn link_entity(&self, entity: &Entity) -> KbResult<Vec<KbId>>;

    /// Normalize raw lookup rows into a ranked candidate list.
    fn post_process_entity_linkings(&self, rows: Vec<KbId>) -> Vec<KbId> {
        let mut seen = HashSet::new();
        rows.into_iter().filter(|id| seen.insert(id.clone())).collect()
    }

    /// Maximum number of candidates kept per mention.
    fn max_entity_options(&self) -> usize {
        DEFAULT_MAX_ENTITY_OPTIONS
    }
}

/// Links mentions by exact (case-insensitive) label match against a [`MemoryKb`].
///
/// Candidates are ranked by how many triples they take part in.
#[derive(Debug)]
pub struct LabelLinker<'a> {
    kb: &'a MemoryKb,
    max_options: usize,
}

impl<'a> LabelLinker<'a> {
    pub fn new(kb: &'a MemoryKb) -> Self {
        Self {
            kb,
            max_options: DEFAULT_MAX_ENTITY_OPTIONS,
        }
    }

    pub fn with_max_options(mut self, max_options: usize) -> Self {
        self.max_options = max_options;
        self
    }
}

impl EntityLinker for LabelLinker<'_> {
    fn link_entity(&self, entity: &Entity) -> KbResult<Vec<KbId>> {
        let mut ranked: Vec<(usize, KbId)> = self
            .kb
            .ids_with_label(&entity.surface())
            .into_iter()
            .map(|id| (self.kb.degree(&id), id))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(ranked
            .into_iter()
            .take(self.max_options)
            .map(|(_, id)| id)
            .collect())
    }

    fn max_entity_options(&self) -> usize {
        self.max_options
    }
}
