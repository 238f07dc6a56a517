//! Grounding enumeration: expanding a skeleton into its concrete groundings.
//!
//! A skeleton without hop markers is grounded with one joint query, so the
//! service constrains relation choices across edges together. Hop markers
//! make the joint query ambiguous in direction, so every free edge is then
//! tagged with each of `direct`/`reverse` (2^k combinations) and each
//! combination is queried separately. Results are concatenated in
//! combination order regardless of how the queries were scheduled.

use rayon::prelude::*;

use crate::error::KbResult;
use crate::graph::{Edge, EdgeType, Graph};
use crate::kb::{CachePolicy, GroundingQuery, KbSession, KnowledgeBase};

use super::{Grounding, apply_grounding};

/// Copies of `skeleton` with every free edge tagged `direct` or `reverse`.
///
/// The first free edge varies slowest. A skeleton without free edges yields
/// one unchanged copy.
pub fn type_combinations(skeleton: &Graph) -> Vec<Graph> {
    let free: Vec<usize> = skeleton.free_edges().map(|(i, _)| i).collect();
    let mut combinations = vec![skeleton.clone()];
    for index in free {
        combinations = combinations
            .into_iter()
            .flat_map(|g| {
                [EdgeType::Direct, EdgeType::Reverse].map(|kind| {
                    let mut t = g.clone();
                    t.edges[index].kind = Some(kind);
                    t
                })
            })
            .collect();
    }
    combinations
}

/// All groundings of `skeleton`, for application with [`apply_grounding`].
///
/// Queries go through the session cache and a skeleton the service cannot
/// resolve contributes nothing. When the question contains a v-structure
/// marker and exactly one edge is free, that edge is also queried as a
/// v-structure and the results are appended.
pub fn find_groundings(
    session: &KbSession<'_>,
    skeleton: &Graph,
    v_structure_markers: &[String],
) -> KbResult<Vec<Grounding>> {
    let free: Vec<usize> = skeleton.free_edges().map(|(i, _)| i).collect();
    let has_hop = free.iter().any(|&i| skeleton.edges[i].hop.is_some());

    let mut groundings = if has_hop {
        type_combinations(skeleton)
            .par_iter()
            .map(|t| -> KbResult<Vec<Grounding>> {
                Ok(session.groundings(t, CachePolicy::Use)?.into_groundings())
            })
            .collect::<KbResult<Vec<Vec<Grounding>>>>()?
            .into_iter()
            .flatten()
            .collect()
    } else {
        session.groundings(skeleton, CachePolicy::Use)?.into_groundings()
    };

    if let [only] = free.as_slice() {
        if skeleton.mentions_any(v_structure_markers) {
            let mut t = skeleton.clone();
            t.edges[*only].kind = Some(EdgeType::VStructure);
            groundings.extend(session.groundings(&t, CachePolicy::Use)?.into_groundings());
        }
    }
    tracing::debug!(free_edges = free.len(), groundings = groundings.len(), "enumerated groundings");
    Ok(groundings)
}

/// Grounded graphs for every type combination of `skeleton`, bypassing the cache.
///
/// A combination too complex for one joint query is approximated edge by edge
/// and each approximate candidate is kept only if the knowledge base confirms it.
pub fn find_groundings_with_gold(session: &KbSession<'_>, skeleton: &Graph) -> KbResult<Vec<Graph>> {
    let per_combination = type_combinations(skeleton)
        .par_iter()
        .map(|t| -> KbResult<Vec<Graph>> {
            match session.groundings(t, CachePolicy::Bypass)? {
                GroundingQuery::Resolved(groundings) => {
                    Ok(groundings.iter().map(|p| apply_grounding(t, p)).collect())
                }
                GroundingQuery::TooComplex => {
                    let candidates = approximate_groundings(session, t)?;
                    let confirmed = candidates
                        .par_iter()
                        .map(|g| verify_grounding(session.kb(), g))
                        .collect::<KbResult<Vec<bool>>>()?;
                    Ok(candidates
                        .into_iter()
                        .zip(confirmed)
                        .filter_map(|(g, ok)| ok.then_some(g))
                        .collect())
                }
            }
        })
        .collect::<KbResult<Vec<Vec<Graph>>>>()?;
    Ok(per_combination.into_iter().flatten().collect())
}

/// Ground each free edge on its own and take the product of the results.
///
/// Per-edge candidates are restricted to whitelisted relations. Grounded
/// edges are carried over as they are. The product is not checked against
/// the knowledge base; see [`verify_grounding`].
pub fn approximate_groundings(session: &KbSession<'_>, graph: &Graph) -> KbResult<Vec<Graph>> {
    tracing::debug!(edges = graph.edges.len(), "approximating graph groundings");
    let kb = session.kb();
    let mut per_edge: Vec<Vec<Edge>> = Vec::with_capacity(graph.edges.len());
    for edge in &graph.edges {
        if edge.is_grounded() {
            per_edge.push(vec![edge.clone()]);
            continue;
        }
        let single = Graph::new(vec![edge.clone()]);
        let options: Vec<Edge> = session
            .groundings(&single, CachePolicy::Use)?
            .into_groundings()
            .iter()
            .filter_map(|p| apply_grounding(&single, p).edges.into_iter().next())
            .filter(|e| e.kb_id.as_ref().is_some_and(|r| kb.is_whitelisted(r.base())))
            .collect();
        tracing::debug!(options = options.len(), "edge groundings");
        per_edge.push(options);
    }

    let mut edge_sets: Vec<Vec<Edge>> = vec![Vec::new()];
    for options in per_edge {
        edge_sets = edge_sets
            .into_iter()
            .flat_map(|prefix| {
                options.iter().map(move |option| {
                    let mut edges = prefix.clone();
                    edges.push(option.clone());
                    edges
                })
            })
            .collect();
    }
    Ok(edge_sets
        .into_iter()
        .map(|edges| Graph {
            edges,
            ..graph.clone()
        })
        .collect())
}

/// Whether the (partially) grounded graph has a match in the knowledge base.
pub fn verify_grounding(kb: &dyn KnowledgeBase, graph: &Graph) -> KbResult<bool> {
    kb.graph_exists(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Hop, HopDirection};
    use crate::ground::GroundingRole;
    use crate::kb::memory::MemoryKb;

    fn awards_kb() -> MemoryKb {
        let kb = MemoryKb::new();
        kb.insert_triple("Q76", "P166", "Q35637");
        kb.insert_triple("Q35637", "P17", "Q20");
        kb.insert_triple("Q76", "P27", "Q30");
        kb.insert_triple("Q30", "P36", "Q61");
        kb
    }

    fn free_edge(right: &str) -> Edge {
        Edge::free(vec![], Some(right.to_string()))
    }

    fn markers() -> Vec<String> {
        vec!["starring".to_string()]
    }

    #[test]
    fn type_combinations_vary_first_edge_slowest() {
        let skeleton = Graph::new(vec![
            free_edge("Q1"),
            Edge::grounded(EdgeType::Time, "P585v"),
            free_edge("Q2"),
        ]);
        let kinds: Vec<(Option<EdgeType>, Option<EdgeType>)> = type_combinations(&skeleton)
            .iter()
            .map(|g| (g.edges[0].kind, g.edges[2].kind))
            .collect();
        use EdgeType::{Direct, Reverse};
        assert_eq!(
            kinds,
            vec![
                (Some(Direct), Some(Direct)),
                (Some(Direct), Some(Reverse)),
                (Some(Reverse), Some(Direct)),
                (Some(Reverse), Some(Reverse)),
            ]
        );
        assert_eq!(type_combinations(&Graph::default()), vec![Graph::default()]);
    }

    #[test]
    fn joint_query_without_hops() {
        let kb = awards_kb();
        let session = KbSession::new(&kb);
        let skeleton = Graph::new(vec![free_edge("Q35637")]);
        let groundings = find_groundings(&session, &skeleton, &markers()).unwrap();
        assert_eq!(groundings.len(), 2);
        assert_eq!(session.cached_queries(), 1);
    }

    #[test]
    fn hop_markers_query_each_type_combination() {
        let kb = awards_kb();
        let session = KbSession::new(&kb);
        let skeleton = Graph::new(vec![free_edge("Q61").with_hop(Hop::marker(HopDirection::Up))]);
        let groundings = find_groundings(&session, &skeleton, &markers()).unwrap();
        assert_eq!(session.cached_queries(), 2);
        assert_eq!(groundings.len(), 1);
        let grounded = apply_grounding(&skeleton, &groundings[0]);
        let edge = &grounded.edges[0];
        assert_eq!(edge.kind, Some(EdgeType::Direct));
        assert_eq!(edge.kb_id.as_ref().unwrap().as_str(), "P27v");
        assert_eq!(edge.hop_relation().unwrap().as_str(), "P36v");
        assert_eq!(edge.hop.as_ref().unwrap().direction, HopDirection::Up);
    }

    #[test]
    fn v_structure_marker_adds_a_query_for_a_single_free_edge() {
        let kb = awards_kb();
        let session = KbSession::new(&kb);
        let mut skeleton = Graph::new(vec![free_edge("Q35637")]);
        skeleton.tokens = vec!["movies".into(), "starring".into(), "obama".into()];
        find_groundings(&session, &skeleton, &markers()).unwrap();
        assert_eq!(session.cached_queries(), 2);

        let session = KbSession::new(&kb);
        skeleton.edges.push(free_edge("Q30"));
        find_groundings(&session, &skeleton, &markers()).unwrap();
        assert_eq!(session.cached_queries(), 1);
    }

    #[test]
    fn gold_groundings_apply_each_combination() {
        let kb = awards_kb();
        let session = KbSession::new(&kb);
        let skeleton = Graph::new(vec![free_edge("Q35637"), free_edge("Q30")]);
        let graphs = find_groundings_with_gold(&session, &skeleton).unwrap();
        assert_eq!(session.cached_queries(), 0);
        assert_eq!(graphs.len(), 1);
        let relations: Vec<&str> = graphs[0]
            .edges
            .iter()
            .map(|e| e.kb_id.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(relations, vec!["P166v", "P27v"]);
    }

    #[test]
    fn too_complex_skeletons_are_approximated_and_verified() {
        let kb = awards_kb().with_max_joint_edges(1);
        for property in ["P166", "P17", "P27", "P36"] {
            kb.whitelist_property(property);
        }
        let session = KbSession::new(&kb);
        let skeleton = Graph::new(vec![free_edge("Q35637"), free_edge("Q30")]);
        let graphs = find_groundings_with_gold(&session, &skeleton).unwrap();
        assert_eq!(graphs.len(), 1);
        assert_eq!(graphs[0].edges[0].kb_id.as_ref().unwrap().as_str(), "P166v");
        assert_eq!(graphs[0].edges[1].kb_id.as_ref().unwrap().as_str(), "P27v");
        assert!(session.cached_queries() > 0);
    }

    #[test]
    fn approximation_respects_the_whitelist() {
        let kb = awards_kb();
        kb.whitelist_property("P166");
        let session = KbSession::new(&kb);
        let graph = Graph::new(vec![
            free_edge("Q35637"),
            Edge::grounded(EdgeType::Direct, "P27v").with_right(vec![], "Q30"),
        ]);
        let graphs = approximate_groundings(&session, &graph).unwrap();
        assert_eq!(graphs.len(), 1);
        assert_eq!(graphs[0].edges[0].kind, Some(EdgeType::Direct));
        assert_eq!(graphs[0].edges[1], graph.edges[1]);

        let groundings = session
            .groundings(&Graph::new(vec![free_edge("Q35637")]), CachePolicy::Use)
            .unwrap()
            .into_groundings();
        assert!(groundings.iter().any(|g| g.get(0, GroundingRole::RelationReverse).is_some()));
    }

    #[test]
    fn verification_uses_existence() {
        let kb = awards_kb();
        let good = Graph::new(vec![Edge::grounded(EdgeType::Direct, "P166v").with_right(vec![], "Q35637")]);
        let bad = Graph::new(vec![Edge::grounded(EdgeType::Direct, "P17v").with_right(vec![], "Q35637")]);
        assert!(verify_grounding(&kb, &good).unwrap());
        assert!(!verify_grounding(&kb, &bad).unwrap());
    }
}
