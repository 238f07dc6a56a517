//! Groundings: assignments of concrete identifiers to a skeleton's edges.
//!
//! Query services report groundings as flat variable maps whose names encode
//! structure (`r0d` = direct relation of edge 0, `hop1v` = hop relation of
//! edge 1, `e20` = right entity of edge 0). [`Grounding::from_variables`]
//! decodes those names once at the boundary; everything downstream works with
//! the structured [`GroundingAssignment`].

pub mod enumerate;

use std::fmt;

use crate::error::{GraphError, GraphResult};
use crate::graph::{EdgeType, Graph, Hop, HopDirection, RelationId};

/// Which part of an edge an assignment binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroundingRole {
    RelationDirect,
    RelationReverse,
    RelationVStructure,
    Hop,
    RightEntity,
}

impl GroundingRole {
    /// The edge type a relation role implies, if it is a relation role.
    pub fn edge_type(self) -> Option<EdgeType> {
        match self {
            Self::RelationDirect => Some(EdgeType::Direct),
            Self::RelationReverse => Some(EdgeType::Reverse),
            Self::RelationVStructure => Some(EdgeType::VStructure),
            Self::Hop | Self::RightEntity => None,
        }
    }

    /// The relation role for an edge type. Time edges are never grounded by query.
    pub fn for_edge_type(kind: EdgeType) -> Option<Self> {
        match kind {
            EdgeType::Direct => Some(Self::RelationDirect),
            EdgeType::Reverse => Some(Self::RelationReverse),
            EdgeType::VStructure => Some(Self::RelationVStructure),
            EdgeType::Time => None,
        }
    }
}

/// One bound variable: `value` for `role` of the edge at position `edge`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroundingAssignment {
    pub edge: usize,
    pub role: GroundingRole,
    pub value: String,
}

impl GroundingAssignment {
    /// Decode a service variable name such as `r0d`, `hop2v` or `e21`.
    pub fn parse(name: &str, value: impl Into<String>) -> GraphResult<Self> {
        let unknown = || GraphError::UnknownVariable {
            name: name.to_string(),
        };
        let (edge, role) = if let Some(rest) = name.strip_prefix("hop") {
            let digits = rest.strip_suffix('v').ok_or_else(unknown)?;
            (digits, GroundingRole::Hop)
        } else if let Some(digits) = name.strip_prefix("e2") {
            (digits, GroundingRole::RightEntity)
        } else if let Some(rest) = name.strip_prefix('r') {
            let role = match rest.chars().last() {
                Some('d') => GroundingRole::RelationDirect,
                Some('r') => GroundingRole::RelationReverse,
                Some('v') => GroundingRole::RelationVStructure,
                _ => return Err(unknown()),
            };
            (&rest[..rest.len() - 1], role)
        } else {
            return Err(unknown());
        };
        if edge.is_empty() || !edge.bytes().all(|b| b.is_ascii_digit()) {
            return Err(unknown());
        }
        let edge = edge.parse().map_err(|_| unknown())?;
        Ok(Self {
            edge,
            role,
            value: value.into(),
        })
    }

    /// The service variable name this assignment decodes from.
    pub fn variable_name(&self) -> String {
        let i = self.edge;
        match self.role {
            GroundingRole::RelationDirect => format!("r{i}d"),
            GroundingRole::RelationReverse => format!("r{i}r"),
            GroundingRole::RelationVStructure => format!("r{i}v"),
            GroundingRole::Hop => format!("hop{i}v"),
            GroundingRole::RightEntity => format!("e2{i}"),
        }
    }
}

impl fmt::Display for GroundingAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.variable_name(), self.value)
    }
}

/// A complete grounding of one skeleton.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Grounding {
    assignments: Vec<GroundingAssignment>,
}

impl Grounding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of one assignment.
    pub fn with(mut self, edge: usize, role: GroundingRole, value: impl Into<String>) -> Self {
        self.push(edge, role, value);
        self
    }

    pub fn push(&mut self, edge: usize, role: GroundingRole, value: impl Into<String>) {
        self.assignments.push(GroundingAssignment {
            edge,
            role,
            value: value.into(),
        });
    }

    /// Decode a variable map as returned by a query service.
    pub fn from_variables<K, V, I>(variables: I) -> GraphResult<Self>
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let assignments = variables
            .into_iter()
            .map(|(name, value)| GroundingAssignment::parse(name.as_ref(), value))
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(Self { assignments })
    }

    pub fn assignments(&self) -> &[GroundingAssignment] {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// The value bound to `role` of edge `edge`, if any.
    pub fn get(&self, edge: usize, role: GroundingRole) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.edge == edge && a.role == role)
            .map(|a| a.value.as_str())
    }
}

/// Apply a grounding to a copy of `graph`.
///
/// For each edge `i`: a right-entity assignment sets `right_kb_id`; a hop
/// assignment fills the edge's `Up` hop marker if it declares one and sets a
/// `Down` hop otherwise; a relation assignment sets `kb_id` and the matching
/// type, preferring direct over reverse over v-structure when several are
/// present. Edges the grounding does not mention are copied unchanged.
pub fn apply_grounding(graph: &Graph, grounding: &Grounding) -> Graph {
    let mut grounded = graph.clone();
    for (i, edge) in grounded.edges.iter_mut().enumerate() {
        if let Some(entity) = grounding.get(i, GroundingRole::RightEntity) {
            edge.right_kb_id = Some(entity.to_string());
        }
        if let Some(hop) = grounding.get(i, GroundingRole::Hop) {
            let direction = match &edge.hop {
                Some(Hop {
                    direction: HopDirection::Up,
                    ..
                }) => HopDirection::Up,
                _ => HopDirection::Down,
            };
            edge.hop = Some(Hop {
                direction,
                relation: Some(RelationId::new(hop)),
            });
        }
        let relation = [
            GroundingRole::RelationDirect,
            GroundingRole::RelationReverse,
            GroundingRole::RelationVStructure,
        ]
        .into_iter()
        .find_map(|role| grounding.get(i, role).map(|value| (role, value)));
        if let Some((role, value)) = relation {
            edge.kb_id = Some(RelationId::new(value));
            edge.kind = role.edge_type();
        }
    }
    grounded
}
