//! Candidate logical forms: graphs of edges hanging off a single answer variable.
//!
//! A [`Graph`] is a value object. Every transformation in the generator returns
//! a modified copy; nothing mutates a graph that is already reachable from a pool
//! entry or a result list.
//!
//! An [`Edge`] is either *free* (no type or no relation id) or *grounded* (both
//! set). Grounded edges may additionally carry the right-hand entity id, an
//! auxiliary hop relation and a display label for the right-hand entity.

pub mod repr;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// A knowledge-base entity identifier (e.g. `Q76`).
pub type KbId = String;

/// Entity tag used by the tagger for numeral literals. Numerals are never linked.
pub const NUMERAL_TAG: &str = "CD";

/// Entity tag for person mentions, the candidates for character-role linking.
pub const PERSON_TAG: &str = "PERSON";

/// A relation identifier carrying a one-character statement suffix.
///
/// `P37v` is the value statement of property `P37`; suffixes `q` and `r` mark
/// qualifier statements. [`RelationId::base`] strips the suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(String);

impl RelationId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build the value-statement id for a bare property (`P31` → `P31v`).
    pub fn value_of(property: &str) -> Self {
        Self(format!("{property}v"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The property id without its statement suffix.
    pub fn base(&self) -> &str {
        match self.0.char_indices().last() {
            Some((idx, _)) => &self.0[..idx],
            None => "",
        }
    }

    pub fn suffix(&self) -> Option<char> {
        self.0.chars().last()
    }

    /// Whether this id names a qualifier statement rather than a main value.
    pub fn is_qualifier(&self) -> bool {
        matches!(self.suffix(), Some('q') | Some('r'))
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RelationId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// How a grounded edge connects the answer variable to its right-hand entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeType {
    /// `(answer, relation, right)`.
    Direct,
    /// `(right, relation, answer)`.
    Reverse,
    /// Answer and right entity joined through an intermediate node.
    VStructure,
    /// Temporal constraint on the answer.
    Time,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Reverse => "reverse",
            Self::VStructure => "v-structure",
            Self::Time => "time",
        }
    }

    /// Direct, reverse and v-structure edges express a first-order relation.
    pub fn is_first_order(self) -> bool {
        matches!(self, Self::Direct | Self::Reverse | Self::VStructure)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = GraphError;

    fn from_str(s: &str) -> GraphResult<Self> {
        match s {
            "direct" => Ok(Self::Direct),
            "reverse" => Ok(Self::Reverse),
            "v-structure" => Ok(Self::VStructure),
            "time" => Ok(Self::Time),
            other => Err(GraphError::UnknownEdgeType {
                name: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopDirection {
    Up,
    Down,
}

/// An auxiliary relation between the right-hand entity and an intermediate node.
///
/// A hop with `relation: None` is a marker placed by the expand operator:
/// it asks the grounding query to find the hop relation too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hop {
    pub direction: HopDirection,
    #[serde(default)]
    pub relation: Option<RelationId>,
}

impl Hop {
    pub fn marker(direction: HopDirection) -> Self {
        Self {
            direction,
            relation: None,
        }
    }
}

/// Marker on a graph whose answers are narrowed by the importance heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphFilter {
    Importance,
}

/// One edge of a candidate graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Surface tokens of the right-hand entity.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub right: Vec<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<EdgeType>,
    #[serde(default, alias = "kbID", skip_serializing_if = "Option::is_none")]
    pub kb_id: Option<RelationId>,
    #[serde(default, alias = "rightkbID", skip_serializing_if = "Option::is_none")]
    pub right_kb_id: Option<KbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hop: Option<Hop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_right: Option<String>,
    /// String representation consumed by scoring models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    /// A free edge pointing at a (possibly linked) right-hand entity.
    pub fn free(right: Vec<String>, right_kb_id: Option<KbId>) -> Self {
        Self {
            right,
            right_kb_id,
            ..Default::default()
        }
    }

    /// A grounded edge with no right-hand entity.
    pub fn grounded(kind: EdgeType, kb_id: impl Into<RelationId>) -> Self {
        Self {
            kind: Some(kind),
            kb_id: Some(kb_id.into()),
            ..Default::default()
        }
    }

    pub fn with_right(mut self, right: Vec<String>, right_kb_id: impl Into<KbId>) -> Self {
        self.right = right;
        self.right_kb_id = Some(right_kb_id.into());
        self
    }

    pub fn with_hop(mut self, hop: Hop) -> Self {
        self.hop = Some(hop);
        self
    }

    pub fn is_grounded(&self) -> bool {
        self.kind.is_some() && self.kb_id.is_some()
    }

    pub fn is_free(&self) -> bool {
        !self.is_grounded()
    }

    /// The hop relation, if one has been grounded.
    pub fn hop_relation(&self) -> Option<&RelationId> {
        self.hop.as_ref().and_then(|h| h.relation.as_ref())
    }

    pub fn right_surface(&self) -> String {
        self.right.join(" ")
    }
}

/// A mention in the question, optionally linked to ranked knowledge-base ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub tokens: Vec<String>,
    pub tag: String,
    /// Candidate ids ranked by linker confidence. `None` until linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkings: Option<Vec<KbId>>,
}

impl Entity {
    pub fn new<S: Into<String>>(tokens: impl IntoIterator<Item = S>, tag: impl Into<String>) -> Self {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            tag: tag.into(),
            linkings: None,
        }
    }

    pub fn with_linkings(mut self, linkings: Vec<KbId>) -> Self {
        self.linkings = Some(linkings);
        self
    }

    pub fn is_linked(&self) -> bool {
        self.linkings.is_some()
    }

    pub fn is_numeral(&self) -> bool {
        self.tag == NUMERAL_TAG
    }

    pub fn surface(&self) -> String {
        self.tokens.join(" ")
    }
}

/// A candidate logical form for a question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default, alias = "edgeSet")]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// The question tokens. Read-only for every transformation.
    #[serde(default)]
    pub tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<GraphFilter>,
}

impl Graph {
    pub fn new(edges: Vec<Edge>) -> Self {
        Self {
            edges,
            ..Default::default()
        }
    }

    /// A skeleton for a question: no edges yet, only tokens and mentions.
    pub fn for_question<S: Into<String>>(
        tokens: impl IntoIterator<Item = S>,
        entities: Vec<Entity>,
    ) -> Self {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            entities,
            ..Default::default()
        }
    }

    /// Indices and references of all free edges, in edge order.
    pub fn free_edges(&self) -> impl Iterator<Item = (usize, &Edge)> {
        self.edges.iter().enumerate().filter(|(_, e)| e.is_free())
    }

    pub fn free_edge_count(&self) -> usize {
        self.free_edges().count()
    }

    pub fn last_edge(&self) -> Option<&Edge> {
        self.edges.last()
    }

    /// Whether the question contains any of the given marker words.
    pub fn mentions_any(&self, markers: &[String]) -> bool {
        self.tokens.iter().any(|t| markers.iter().any(|m| m == t))
    }

    /// Check the field combinations of an input graph.
    ///
    /// A relation id requires a type, and a type requires a relation id.
    pub fn validate(&self) -> GraphResult<()> {
        for (i, edge) in self.edges.iter().enumerate() {
            match (&edge.kind, &edge.kb_id) {
                (None, Some(_)) => return Err(GraphError::KbIdWithoutType { edge: i }),
                (Some(kind), None) => {
                    return Err(GraphError::TypeWithoutKbId {
                        edge: i,
                        kind: kind.to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_base_strips_suffix() {
        let rel = RelationId::new("P37v");
        assert_eq!(rel.base(), "P37");
        assert_eq!(rel.suffix(), Some('v'));
        assert!(!rel.is_qualifier());
        assert!(RelationId::new("P580q").is_qualifier());
        assert!(RelationId::new("P580r").is_qualifier());
        assert_eq!(RelationId::new("").base(), "");
        assert_eq!(RelationId::value_of("P31").as_str(), "P31v");
    }

    #[test]
    fn edge_type_parses_and_displays() {
        for kind in [
            EdgeType::Direct,
            EdgeType::Reverse,
            EdgeType::VStructure,
            EdgeType::Time,
        ] {
            assert_eq!(kind.as_str().parse::<EdgeType>().unwrap(), kind);
        }
        assert!(matches!(
            "sideways".parse::<EdgeType>(),
            Err(GraphError::UnknownEdgeType { .. })
        ));
        assert!(!EdgeType::Time.is_first_order());
    }

    #[test]
    fn free_and_grounded_edges() {
        let g = Graph::new(vec![
            Edge::grounded(EdgeType::Direct, "P31v"),
            Edge::free(vec!["Norway".into()], Some("Q20".into())),
            Edge {
                kind: Some(EdgeType::Reverse),
                ..Default::default()
            },
        ]);
        let free: Vec<usize> = g.free_edges().map(|(i, _)| i).collect();
        assert_eq!(free, vec![1, 2]);
        assert_eq!(g.free_edge_count(), 2);
    }

    #[test]
    fn validate_rejects_half_grounded_edges() {
        let g = Graph::new(vec![Edge {
            kb_id: Some("P31v".into()),
            ..Default::default()
        }]);
        assert!(matches!(g.validate(), Err(GraphError::KbIdWithoutType { edge: 0 })));

        let g = Graph::new(vec![
            Edge::default(),
            Edge {
                kind: Some(EdgeType::Direct),
                ..Default::default()
            },
        ]);
        assert!(matches!(g.validate(), Err(GraphError::TypeWithoutKbId { edge: 1, .. })));

        let ok = Graph::new(vec![Edge::grounded(EdgeType::Time, "P585v"), Edge::default()]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn deserializes_legacy_keys() {
        let json = r#"{"edgeSet": [{"type": "direct", "kbID": "P31v", "rightkbID": "Q5"}],
                       "tokens": ["who", "?"]}"#;
        let g: Graph = serde_json::from_str(json).unwrap();
        assert_eq!(g.edges[0].kind, Some(EdgeType::Direct));
        assert_eq!(g.edges[0].kb_id.as_ref().unwrap().as_str(), "P31v");
        assert_eq!(g.edges[0].right_kb_id.as_deref(), Some("Q5"));
        assert!(g.entities.is_empty());
    }

    #[test]
    fn mentions_any_marker() {
        let g = Graph::for_question(["who", "plays", "bella", "?"], vec![]);
        assert!(g.mentions_any(&["plays".to_string()]));
        assert!(!g.mentions_any(&["starring".to_string()]));
    }

    #[test]
    fn numeral_entities_are_recognized() {
        assert!(Entity::new(["2009"], "CD").is_numeral());
        assert!(!Entity::new(["Norway"], "LOCATION").is_numeral());
        assert_eq!(Entity::new(["the", "winner"], "NN").surface(), "the winner");
    }
}
