//! In-memory knowledge base backed by petgraph with dashmap side indexes.
//!
//! Triples are `(subject, property, object)` with bare property ids (`P166`).
//! Grounded edges are evaluated against a single answer variable:
//!
//! - `direct` edge with relation `P` and right entity `R`: `(answer, P, R)`
//! - `reverse` edge: `(R, P, answer)`
//! - with a hop relation `H`, the right entity is reached through an
//!   intermediate node: `(answer, P, m), (m, H, R)` resp. `(R, H, m), (m, P, answer)`
//!
//! Time and v-structure edges do not constrain the answer here, and the store
//! holds no qualifier statements.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::RwLock;

use dashmap::{DashMap, DashSet};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::error::{KbError, KbResult};
use crate::ground::{Grounding, GroundingRole};
use crate::graph::{Edge, EdgeType, Graph, KbId, RelationId};

use super::{GroundingQuery, KnowledgeBase};

/// Property linking a work to its characters.
pub const CHARACTERS_PROPERTY: &str = "P674";

/// Property linking a character to the work it appears in.
pub const PRESENT_IN_WORK_PROPERTY: &str = "P1441";

/// Denotation size kept by the importance filter.
pub const IMPORTANT_ANSWERS: usize = 3;

/// Default number of free edges a single joint query will resolve.
pub const DEFAULT_MAX_JOINT_EDGES: usize = 2;

/// Serializable contents of a [`MemoryKb`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KbFixture {
    /// `[subject, property, object]` rows.
    #[serde(default)]
    pub triples: Vec<[String; 3]>,
    /// Entity id → labels, canonical label first.
    #[serde(default)]
    pub labels: BTreeMap<KbId, Vec<String>>,
    /// Property id → display name.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Entity id → demonym.
    #[serde(default)]
    pub demonyms: BTreeMap<KbId, String>,
}

/// One way to ground a single free edge, with the answers it admits.
#[derive(Debug, Clone)]
struct EdgeOption {
    kind: EdgeType,
    relation: String,
    hop: Option<String>,
    answers: BTreeSet<KbId>,
}

/// In-memory knowledge base.
pub struct MemoryKb {
    /// Nodes are entity ids, edges carry the bare property id.
    graph: RwLock<DiGraph<KbId, String>>,
    node_index: DashMap<KbId, NodeIndex>,
    labels: DashMap<KbId, Vec<String>>,
    /// Lowercased label → entity ids carrying it.
    label_index: DashMap<String, Vec<KbId>>,
    properties: DashMap<String, String>,
    whitelist: DashSet<String>,
    demonyms: DashMap<KbId, String>,
    max_joint_edges: usize,
}

impl MemoryKb {
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
            labels: DashMap::new(),
            label_index: DashMap::new(),
            properties: DashMap::new(),
            whitelist: DashSet::new(),
            demonyms: DashMap::new(),
            max_joint_edges: DEFAULT_MAX_JOINT_EDGES,
        }
    }

    pub fn from_fixture(fixture: KbFixture) -> Self {
        let kb = Self::new();
        for [s, p, o] in &fixture.triples {
            kb.insert_triple(s, p, o);
        }
        for (id, labels) in fixture.labels {
            kb.add_labels(&id, labels);
        }
        for (property, label) in fixture.properties {
            kb.set_property_label(property, label);
        }
        for property in fixture.whitelist {
            kb.whitelist_property(property);
        }
        for (id, demonym) in fixture.demonyms {
            kb.set_demonym(id, demonym);
        }
        kb
    }

    /// Load a JSON fixture from disk.
    pub fn load(path: &Path) -> KbResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| KbError::FixtureRead {
            path: path.display().to_string(),
            source: e,
        })?;
        let fixture: KbFixture =
            serde_json::from_str(&content).map_err(|e| KbError::FixtureParse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::from_fixture(fixture))
    }

    /// Number of free edges above which grounding queries answer `TooComplex`.
    pub fn with_max_joint_edges(mut self, max: usize) -> Self {
        self.max_joint_edges = max;
        self
    }

    fn ensure_node(&self, id: &str) -> NodeIndex {
        if let Some(idx) = self.node_index.get(id) {
            return *idx.value();
        }
        let mut graph = self.graph.write().expect("graph lock poisoned");
        // Double-check after acquiring write lock
        if let Some(idx) = self.node_index.get(id) {
            return *idx.value();
        }
        let idx = graph.add_node(id.to_string());
        self.node_index.insert(id.to_string(), idx);
        idx
    }

    pub fn insert_triple(&self, subject: &str, property: &str, object: &str) {
        let s = self.ensure_node(subject);
        let o = self.ensure_node(object);
        let mut graph = self.graph.write().expect("graph lock poisoned");
        graph.add_edge(s, o, property.to_string());
    }

    /// Attach labels to an entity, canonical label first.
    pub fn add_labels(&self, id: &str, labels: impl IntoIterator<Item = impl Into<String>>) {
        let mut entry = self.labels.entry(id.to_string()).or_default();
        for label in labels {
            let label = label.into();
            self.label_index
                .entry(label.to_lowercase())
                .or_default()
                .push(id.to_string());
            entry.push(label);
        }
    }

    pub fn set_property_label(&self, property: impl Into<String>, label: impl Into<String>) {
        self.properties.insert(property.into(), label.into());
    }

    pub fn whitelist_property(&self, property: impl Into<String>) {
        self.whitelist.insert(property.into());
    }

    pub fn set_demonym(&self, id: impl Into<KbId>, demonym: impl Into<String>) {
        self.demonyms.insert(id.into(), demonym.into());
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    pub fn triple_count(&self) -> usize {
        self.graph.read().expect("graph lock poisoned").edge_count()
    }

    /// Number of triples an entity takes part in.
    pub fn degree(&self, id: &str) -> usize {
        let Some(idx) = self.node_index.get(id).map(|i| *i.value()) else {
            return 0;
        };
        let graph = self.graph.read().expect("graph lock poisoned");
        graph.edges_directed(idx, Direction::Outgoing).count()
            + graph.edges_directed(idx, Direction::Incoming).count()
    }

    /// Entities carrying `label` (case-insensitive), in insertion order.
    pub fn ids_with_label(&self, label: &str) -> Vec<KbId> {
        let mut ids = self
            .label_index
            .get(&label.to_lowercase())
            .map(|v| v.value().clone())
            .unwrap_or_default();
        let mut seen = BTreeSet::new();
        ids.retain(|id| seen.insert(id.clone()));
        ids
    }

    /// `(property, neighbour)` pairs of `id` in the given direction.
    fn neighbours(&self, id: &str, direction: Direction) -> Vec<(String, KbId)> {
        let Some(idx) = self.node_index.get(id).map(|i| *i.value()) else {
            return vec![];
        };
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .edges_directed(idx, direction)
            .filter_map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                Some((e.weight().clone(), graph.node_weight(other)?.clone()))
            })
            .collect()
    }

    /// Follow `property` from every node in `from`.
    fn step(&self, from: &BTreeSet<KbId>, property: &str, direction: Direction) -> BTreeSet<KbId> {
        from.iter()
            .flat_map(|id| self.neighbours(id, direction))
            .filter(|(p, _)| p == property)
            .map(|(_, other)| other)
            .collect()
    }

    /// Answers admitted by a grounded edge, or `None` if it does not constrain.
    fn edge_answers(&self, edge: &Edge) -> Option<BTreeSet<KbId>> {
        let kind = edge.kind?;
        let relation = edge.kb_id.as_ref()?.base().to_string();
        let right = edge.right_kb_id.as_ref()?;
        let direction = match kind {
            EdgeType::Direct => Direction::Incoming,
            EdgeType::Reverse => Direction::Outgoing,
            EdgeType::VStructure | EdgeType::Time => return None,
        };
        let mut frontier = BTreeSet::from([right.clone()]);
        if let Some(hop) = edge.hop_relation() {
            frontier = self.step(&frontier, hop.base(), direction);
        }
        Some(self.step(&frontier, &relation, direction))
    }

    /// Intersection of the answers of every constraining grounded edge.
    fn grounded_answers(&self, graph: &Graph) -> Option<BTreeSet<KbId>> {
        graph
            .edges
            .iter()
            .filter(|e| e.is_grounded())
            .filter_map(|e| self.edge_answers(e))
            .reduce(|acc, answers| acc.intersection(&answers).cloned().collect())
    }

    /// All ways to ground one free edge, in deterministic order.
    fn edge_options(&self, edge: &Edge) -> Vec<EdgeOption> {
        let Some(right) = edge.right_kb_id.as_ref() else {
            return vec![];
        };
        let kinds: &[EdgeType] = match edge.kind {
            None => &[EdgeType::Direct, EdgeType::Reverse],
            Some(EdgeType::Direct) => &[EdgeType::Direct],
            Some(EdgeType::Reverse) => &[EdgeType::Reverse],
            Some(EdgeType::VStructure | EdgeType::Time) => &[],
        };
        let mut options = Vec::new();
        for &kind in kinds {
            let direction = match kind {
                EdgeType::Direct => Direction::Incoming,
                _ => Direction::Outgoing,
            };
            let mut grouped: BTreeMap<(Option<String>, String), BTreeSet<KbId>> = BTreeMap::new();
            if edge.hop.is_some() {
                for (hop, mid) in self.neighbours(right, direction) {
                    for (relation, answer) in self.neighbours(&mid, direction) {
                        grouped
                            .entry((Some(hop.clone()), relation))
                            .or_default()
                            .insert(answer);
                    }
                }
            } else {
                for (relation, answer) in self.neighbours(right, direction) {
                    grouped.entry((None, relation)).or_default().insert(answer);
                }
            }
            options.extend(
                grouped
                    .into_iter()
                    .map(|((hop, relation), answers)| EdgeOption {
                        kind,
                        relation,
                        hop,
                        answers,
                    }),
            );
        }
        options
    }
}

impl Default for MemoryKb {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryKb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKb")
            .field("nodes", &self.node_count())
            .field("triples", &self.triple_count())
            .field("max_joint_edges", &self.max_joint_edges)
            .finish()
    }
}

impl KnowledgeBase for MemoryKb {
    fn query_graph_groundings(&self, skeleton: &Graph) -> KbResult<GroundingQuery> {
        let free: Vec<(usize, &Edge)> = skeleton.free_edges().collect();
        if free.len() > self.max_joint_edges {
            return Ok(GroundingQuery::TooComplex);
        }
        if free.is_empty() {
            return Ok(GroundingQuery::Resolved(vec![]));
        }

        // (chosen options so far, answers still admitted; None = unconstrained)
        let mut partial: Vec<(Vec<(usize, EdgeOption)>, Option<BTreeSet<KbId>>)> =
            vec![(vec![], self.grounded_answers(skeleton))];
        for (index, edge) in free {
            let options = self.edge_options(edge);
            let mut next = Vec::new();
            for (chosen, admitted) in &partial {
                for option in &options {
                    let answers: BTreeSet<KbId> = match admitted {
                        Some(a) => a.intersection(&option.answers).cloned().collect(),
                        None => option.answers.clone(),
                    };
                    if answers.is_empty() {
                        continue;
                    }
                    let mut chosen = chosen.clone();
                    chosen.push((index, option.clone()));
                    next.push((chosen, Some(answers)));
                }
            }
            partial = next;
        }

        let groundings = partial
            .into_iter()
            .map(|(chosen, _)| {
                let mut grounding = Grounding::new();
                for (index, option) in chosen {
                    if let Some(role) = GroundingRole::for_edge_type(option.kind) {
                        grounding.push(index, role, RelationId::value_of(&option.relation).to_string());
                    }
                    if let Some(hop) = option.hop {
                        grounding.push(index, GroundingRole::Hop, RelationId::value_of(&hop).to_string());
                    }
                }
                grounding
            })
            .collect();
        Ok(GroundingQuery::Resolved(groundings))
    }

    fn query_graph_denotations(&self, graph: &Graph) -> KbResult<Vec<KbId>> {
        Ok(self
            .grounded_answers(graph)
            .map(|answers| answers.into_iter().collect())
            .unwrap_or_default())
    }

    fn graph_exists(&self, graph: &Graph) -> KbResult<bool> {
        let mut constrained = false;
        for edge in &graph.edges {
            if edge.is_free() {
                if let Some(right) = &edge.right_kb_id {
                    if !self.has_node(right) {
                        return Ok(false);
                    }
                    constrained = true;
                }
            } else if self.edge_answers(edge).is_some() {
                constrained = true;
            }
        }
        let admitted = self.grounded_answers(graph);
        Ok(constrained && admitted.is_none_or(|a| !a.is_empty()))
    }

    fn character_roles(&self, name: &str, film: &str) -> KbResult<Vec<KbId>> {
        let name = name.to_lowercase();
        let mut characters: Vec<KbId> = self
            .neighbours(film, Direction::Outgoing)
            .into_iter()
            .filter(|(p, _)| p == CHARACTERS_PROPERTY)
            .chain(
                self.neighbours(film, Direction::Incoming)
                    .into_iter()
                    .filter(|(p, _)| p == PRESENT_IN_WORK_PROPERTY),
            )
            .map(|(_, character)| character)
            .collect();
        let mut seen = BTreeSet::new();
        characters.retain(|c| seen.insert(c.clone()));
        characters.retain(|c| {
            self.labels.get(c).is_some_and(|labels| {
                labels.iter().any(|l| {
                    let l = l.to_lowercase();
                    l == name || l.split_whitespace().any(|t| t == name)
                })
            })
        });
        Ok(characters)
    }

    fn demonym(&self, entity: &str) -> KbResult<Option<String>> {
        Ok(self.demonyms.get(entity).map(|d| d.value().clone()))
    }

    fn label_entity(&self, entity: &str) -> KbResult<Option<String>> {
        Ok(self
            .labels
            .get(entity)
            .and_then(|labels| labels.first().cloned()))
    }

    fn property_label(&self, property: &str) -> Option<String> {
        self.properties.get(property).map(|l| l.value().clone())
    }

    fn is_whitelisted(&self, property: &str) -> bool {
        self.whitelist.contains(property)
    }

    fn label_query_results(&self, ids: &[KbId]) -> KbResult<Vec<Vec<String>>> {
        Ok(ids
            .iter()
            .map(|id| match self.labels.get(id) {
                Some(labels) if !labels.is_empty() => {
                    labels.iter().map(|l| l.to_lowercase()).collect()
                }
                _ => vec![id.to_lowercase()],
            })
            .collect())
    }

    fn filter_denotation_by_importance(&self, ids: &[KbId]) -> KbResult<Vec<KbId>> {
        let mut ranked: Vec<(usize, &KbId)> = ids.iter().map(|id| (self.degree(id), id)).collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(ranked
            .into_iter()
            .take(IMPORTANT_ANSWERS)
            .map(|(_, id)| id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Hop, HopDirection};

    fn awards_kb() -> MemoryKb {
        let kb = MemoryKb::new();
        kb.insert_triple("Q76", "P166", "Q35637");
        kb.insert_triple("Q35637", "P17", "Q20");
        kb.insert_triple("Q76", "P27", "Q30");
        kb.insert_triple("Q30", "P36", "Q61");
        kb.add_labels("Q76", ["Barack Obama", "Obama"]);
        kb.add_labels("Q35637", ["Nobel Peace Prize"]);
        kb
    }

    fn free_edge(right: &str) -> Edge {
        Edge::free(vec![], Some(right.to_string()))
    }

    #[test]
    fn insert_and_count() {
        let kb = awards_kb();
        assert_eq!(kb.triple_count(), 4);
        assert_eq!(kb.node_count(), 5);
        assert_eq!(kb.degree("Q76"), 2);
        assert_eq!(kb.degree("Q999"), 0);
    }

    #[test]
    fn grounds_a_single_free_edge_in_both_directions() {
        let kb = awards_kb();
        let result = kb
            .query_graph_groundings(&Graph::new(vec![free_edge("Q35637")]))
            .unwrap();
        let GroundingQuery::Resolved(groundings) = result else {
            panic!("expected resolved groundings");
        };
        assert_eq!(groundings.len(), 2);
        assert_eq!(groundings[0].get(0, GroundingRole::RelationDirect), Some("P166v"));
        assert_eq!(groundings[1].get(0, GroundingRole::RelationReverse), Some("P17v"));
    }

    #[test]
    fn preset_type_restricts_options() {
        let kb = awards_kb();
        let mut edge = free_edge("Q35637");
        edge.kind = Some(EdgeType::Reverse);
        let groundings = kb
            .query_graph_groundings(&Graph::new(vec![edge]))
            .unwrap()
            .into_groundings();
        assert_eq!(groundings.len(), 1);
        assert_eq!(groundings[0].get(0, GroundingRole::RelationReverse), Some("P17v"));
    }

    #[test]
    fn hop_edges_ground_two_relations() {
        let kb = awards_kb();
        let edge = free_edge("Q61").with_hop(Hop::marker(HopDirection::Up));
        let groundings = kb
            .query_graph_groundings(&Graph::new(vec![edge]))
            .unwrap()
            .into_groundings();
        // (Q76, P27, Q30), (Q30, P36, Q61)
        assert_eq!(groundings.len(), 1);
        assert_eq!(groundings[0].get(0, GroundingRole::RelationDirect), Some("P27v"));
        assert_eq!(groundings[0].get(0, GroundingRole::Hop), Some("P36v"));
    }

    #[test]
    fn joint_grounding_requires_shared_answers() {
        let kb = awards_kb();
        let skeleton = Graph::new(vec![free_edge("Q35637"), free_edge("Q30")]);
        let groundings = kb.query_graph_groundings(&skeleton).unwrap().into_groundings();
        // Only (P166 direct, P27 direct) agree on Q76.
        assert_eq!(groundings.len(), 1);
        assert_eq!(groundings[0].get(0, GroundingRole::RelationDirect), Some("P166v"));
        assert_eq!(groundings[0].get(1, GroundingRole::RelationDirect), Some("P27v"));
    }

    #[test]
    fn too_many_free_edges_is_too_complex() {
        let kb = awards_kb().with_max_joint_edges(1);
        let skeleton = Graph::new(vec![free_edge("Q35637"), free_edge("Q30")]);
        assert_eq!(
            kb.query_graph_groundings(&skeleton).unwrap(),
            GroundingQuery::TooComplex
        );
    }

    #[test]
    fn denotations_intersect_edges() {
        let kb = awards_kb();
        let g = Graph::new(vec![
            Edge::grounded(EdgeType::Direct, "P166v").with_right(vec![], "Q35637"),
            Edge::grounded(EdgeType::Direct, "P27v").with_right(vec![], "Q30"),
        ]);
        assert_eq!(kb.query_graph_denotations(&g).unwrap(), vec!["Q76".to_string()]);
        assert!(kb.query_graph_denotations(&Graph::default()).unwrap().is_empty());
    }

    #[test]
    fn existence_checks() {
        let kb = awards_kb();
        assert!(kb.graph_exists(&Graph::new(vec![free_edge("Q35637")])).unwrap());
        assert!(!kb.graph_exists(&Graph::new(vec![free_edge("Q404")])).unwrap());
        assert!(!kb.graph_exists(&Graph::default()).unwrap());
        let wrong = Graph::new(vec![
            Edge::grounded(EdgeType::Reverse, "P166v").with_right(vec![], "Q35637"),
        ]);
        assert!(!kb.graph_exists(&wrong).unwrap());
    }

    #[test]
    fn labels_and_linking_index() {
        let kb = awards_kb();
        assert_eq!(kb.label_entity("Q76").unwrap().as_deref(), Some("Barack Obama"));
        assert_eq!(kb.ids_with_label("obama"), vec!["Q76".to_string()]);
        assert_eq!(
            kb.label_query_results(&["Q76".into(), "Q20".into()]).unwrap(),
            vec![
                vec!["barack obama".to_string(), "obama".to_string()],
                vec!["q20".to_string()],
            ]
        );
    }

    #[test]
    fn importance_keeps_best_connected() {
        let kb = MemoryKb::new();
        for (id, links) in [("Q1", 1), ("Q2", 4), ("Q3", 2), ("Q4", 3)] {
            for i in 0..links {
                kb.insert_triple(id, "P1", &format!("Q10{i}"));
            }
        }
        let ids: Vec<KbId> = ["Q1", "Q2", "Q3", "Q4"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            kb.filter_denotation_by_importance(&ids).unwrap(),
            vec!["Q2".to_string(), "Q4".to_string(), "Q3".to_string()]
        );
    }

    #[test]
    fn character_roles_match_first_names() {
        let kb = MemoryKb::new();
        kb.insert_triple("Q44523", CHARACTERS_PROPERTY, "Q223757");
        kb.insert_triple("Q9", PRESENT_IN_WORK_PROPERTY, "Q44523");
        kb.add_labels("Q223757", ["Bella Swan"]);
        kb.add_labels("Q9", ["Edward Cullen"]);
        assert_eq!(
            kb.character_roles("Bella", "Q44523").unwrap(),
            vec!["Q223757".to_string()]
        );
        assert!(kb.character_roles("Jacob", "Q44523").unwrap().is_empty());
    }

    #[test]
    fn fixture_round_trip_through_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kb.json");
        let fixture = KbFixture {
            triples: vec![["Q76".into(), "P166".into(), "Q35637".into()]],
            whitelist: vec!["P166".into()],
            properties: BTreeMap::from([("P166".to_string(), "award received".to_string())]),
            ..Default::default()
        };
        std::fs::write(&path, serde_json::to_string(&fixture).unwrap()).unwrap();
        let kb = MemoryKb::load(&path).unwrap();
        assert_eq!(kb.triple_count(), 1);
        assert!(kb.is_whitelisted("P166"));
        assert_eq!(kb.property_label("P166").as_deref(), Some("award received"));

        let missing = MemoryKb::load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(KbError::FixtureRead { .. })));
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(MemoryKb::load(&path), Err(KbError::FixtureParse { .. })));
    }
}
