//! Entity enrichment: linking mentions, labelling grounded entities, and
//! knowledge-domain post-processing of retrieved answers.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::error::KbResult;
use crate::graph::{Graph, PERSON_TAG};
use crate::kb::KnowledgeBase;
use crate::link::EntityLinker;

/// Property for "language used" / "official language".
pub const LANGUAGE_PROPERTY: &str = "P37";

/// Properties whose answers are people playing or voicing a character.
pub const CHARACTER_PROPERTIES: [&str; 3] = ["P175", "P453", "P161"];

/// Link every unlinked, non-numeral mention in `graph`.
///
/// A graph whose mentions are all linked (numerals never are) is returned
/// unchanged. When the question contains a v-structure marker, every
/// single-token person mention linked by this call is additionally looked up
/// as a character in each work the other mentions link to; character hits
/// are ranked first, duplicates dropped and the list re-truncated.
pub fn link_entities_in_graph(
    mut graph: Graph,
    linker: &dyn EntityLinker,
    kb: &dyn KnowledgeBase,
    v_structure_markers: &[String],
) -> KbResult<Graph> {
    let pending: Vec<bool> = graph
        .entities
        .iter()
        .map(|e| !e.is_linked() && !e.is_numeral())
        .collect();
    if !pending.contains(&true) {
        return Ok(graph);
    }
    graph
        .entities
        .par_iter_mut()
        .zip(pending.par_iter())
        .filter(|(_, pending)| **pending)
        .try_for_each(|(e, _)| -> KbResult<()> {
            e.linkings = Some(linker.link_entity(e)?);
            Ok(())
        })?;

    if graph.mentions_any(v_structure_markers) {
        let max_options = linker.max_entity_options();
        for i in 0..graph.entities.len() {
            let person = &graph.entities[i];
            if !pending[i] || person.tag != PERSON_TAG || person.tokens.len() != 1 {
                continue;
            }
            let name = person.surface();
            let works: Vec<String> = graph
                .entities
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .filter_map(|(_, e)| e.linkings.as_ref())
                .flatten()
                .cloned()
                .collect();
            for work in works {
                let rows = kb.character_roles(&name, &work)?;
                let mut ranked = linker.post_process_entity_linkings(rows);
                let linkings = graph.entities[i].linkings.get_or_insert_with(Vec::new);
                ranked.append(linkings);
                let mut seen = HashSet::new();
                ranked.retain(|id| seen.insert(id.clone()));
                ranked.truncate(max_options);
                *linkings = ranked;
            }
        }
    }
    tracing::debug!(entities = graph.entities.len(), "linked question entities");
    Ok(graph)
}

/// Attach canonical labels to right-hand entities that lack one.
///
/// An entity the label service knows nothing about stays unlabelled.
pub fn add_canonical_labels_to_entities(mut graph: Graph, kb: &dyn KnowledgeBase) -> KbResult<Graph> {
    for edge in graph.edges.iter_mut() {
        if edge.canonical_right.is_some() {
            continue;
        }
        let Some(entity) = edge.right_kb_id.as_deref() else {
            continue;
        };
        if let Some(label) = kb.label_entity(entity)?.filter(|l| !l.is_empty()) {
            edge.canonical_right = Some(label);
        }
    }
    Ok(graph)
}

/// Widen retrieved answer sets to match how gold answers are usually phrased.
///
/// For language relations every answer gains a "<answer> language" variant,
/// and an "english" answer about a country adds "<demonym> english" as an
/// extra answer set. For character/cast relations each answer's first token
/// is added, so "Kristen Stewart" also matches "kristen".
pub fn post_process_answers_given_graph(
    mut answers: Vec<Vec<String>>,
    graph: &Graph,
    kb: &dyn KnowledgeBase,
) -> KbResult<Vec<Vec<String>>> {
    let language_edge = graph
        .edges
        .iter()
        .find(|e| e.kb_id.as_ref().is_some_and(|r| r.base() == LANGUAGE_PROPERTY));
    if let Some(edge) = language_edge {
        let mut extra = Vec::new();
        for answer_set in answers.iter_mut() {
            if answer_set.iter().all(|a| !a.to_lowercase().contains("language")) {
                let variants: Vec<String> = answer_set.iter().map(|a| format!("{a} language")).collect();
                answer_set.extend(variants);
            }
            if answer_set.iter().any(|a| a == "english") {
                if let Some(entity) = edge.right_kb_id.as_deref() {
                    if let Some(demonym) = kb.demonym(entity)? {
                        let demonym = demonym.to_lowercase();
                        extra.push(vec![
                            format!("{demonym} english"),
                            format!("{demonym} english language"),
                        ]);
                    }
                }
            }
        }
        answers.extend(extra);
    }

    let character_edge = graph.edges.iter().any(|e| {
        e.kb_id
            .as_ref()
            .is_some_and(|r| CHARACTER_PROPERTIES.contains(&r.base()))
    });
    if character_edge {
        for answer_set in answers.iter_mut() {
            let first_tokens: Vec<String> = answer_set
                .iter()
                .filter_map(|a| a.split_whitespace().next().map(str::to_string))
                .collect();
            answer_set.extend(first_tokens);
        }
    }
    Ok(answers)
}
