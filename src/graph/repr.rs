//! String representations of grounded edges for scoring models.

use super::{EdgeType, Graph};

/// Placeholder standing for the right-hand entity in an edge label.
pub const ENTITY_PLACEHOLDER: &str = "<e>";

/// Attach a human-readable label to every grounded edge.
///
/// The label is the relation's display name (falling back to the raw id),
/// followed by the hop relation's name when present, followed by the right-hand
/// entity: either [`ENTITY_PLACEHOLDER`] (when `mark_entities` is set, to be
/// filled by [`replace_entities`]) or its surface tokens.
pub fn add_string_representations_to_edges(
    mut graph: Graph,
    property_label: &dyn Fn(&str) -> Option<String>,
    mark_entities: bool,
) -> Graph {
    for edge in graph.edges.iter_mut() {
        let Some(kb_id) = edge.kb_id.as_ref() else {
            continue;
        };
        let mut parts = Vec::with_capacity(3);
        let relation = property_label(kb_id.base()).unwrap_or_else(|| kb_id.to_string());
        parts.push(match edge.kind {
            Some(EdgeType::Reverse) => format!("{relation} of"),
            _ => relation,
        });
        if let Some(hop) = edge.hop_relation() {
            parts.push(property_label(hop.base()).unwrap_or_else(|| hop.to_string()));
        }
        if edge.right_kb_id.is_some() || !edge.right.is_empty() {
            if mark_entities {
                parts.push(ENTITY_PLACEHOLDER.to_string());
            } else {
                parts.push(edge.right_surface());
            }
        }
        edge.label = Some(parts.join(" "));
    }
    graph
}

/// Substitute entity placeholders in edge labels with canonical entity labels.
///
/// Edges without a canonical label fall back to the surface tokens.
pub fn replace_entities(mut graph: Graph) -> Graph {
    for edge in graph.edges.iter_mut() {
        let replacement = edge
            .canonical_right
            .clone()
            .unwrap_or_else(|| edge.right_surface());
        if let Some(label) = edge.label.as_mut() {
            if label.contains(ENTITY_PLACEHOLDER) {
                *label = label.replace(ENTITY_PLACEHOLDER, &replacement);
            }
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Hop, HopDirection, RelationId};

    fn labels(property: &str) -> Option<String> {
        match property {
            "P166" => Some("award received".into()),
            "P131" => Some("located in".into()),
            _ => None,
        }
    }

    #[test]
    fn labels_use_property_names() {
        let g = Graph::new(vec![
            Edge::grounded(EdgeType::Direct, "P166v").with_right(
                vec!["Nobel".into(), "Peace".into(), "Prize".into()],
                "Q35637",
            ),
            Edge::grounded(EdgeType::Reverse, "P999v"),
        ]);
        let g = add_string_representations_to_edges(g, &labels, false);
        assert_eq!(
            g.edges[0].label.as_deref(),
            Some("award received Nobel Peace Prize")
        );
        assert_eq!(g.edges[1].label.as_deref(), Some("P999v of"));
    }

    #[test]
    fn placeholders_are_replaced_by_canonical_labels() {
        let mut edge = Edge::grounded(EdgeType::Direct, "P166v")
            .with_right(vec!["nobel".into()], "Q35637")
            .with_hop(Hop {
                direction: HopDirection::Up,
                relation: Some(RelationId::new("P131v")),
            });
        edge.canonical_right = Some("Nobel Peace Prize".into());
        let g = add_string_representations_to_edges(Graph::new(vec![edge]), &labels, true);
        assert_eq!(
            g.edges[0].label.as_deref(),
            Some("award received located in <e>")
        );
        let g = replace_entities(g);
        assert_eq!(
            g.edges[0].label.as_deref(),
            Some("award received located in Nobel Peace Prize")
        );
    }

    #[test]
    fn free_edges_stay_unlabelled() {
        let g = Graph::new(vec![Edge::free(vec!["oil".into()], None)]);
        let g = add_string_representations_to_edges(g, &labels, true);
        assert!(g.edges[0].label.is_none());
    }
}
