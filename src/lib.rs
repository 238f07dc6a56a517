// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # kbqa-staged
//!
//! Staged best-first search over candidate logical forms for knowledge-base
//! question answering.
//!
//! A question enters as a [`Graph`](graph::Graph) with tokens and entity
//! mentions. The [`Generator`](search::Generator) links the mentions,
//! proposes skeletons with [`GraphOperators`](operators::GraphOperators),
//! grounds them against a [`KnowledgeBase`](kb::KnowledgeBase) and keeps the
//! candidates that score best.
//!
//! ## Architecture
//!
//! - **Graphs** (`graph`): edges, mentions, string representations
//! - **Grounding** (`ground`): structured groundings and their enumeration
//! - **Scoring** (`score`): F1 against gold answers, or a [`QaModel`](score::QaModel)
//! - **Search** (`search`): gold-guided, model-guided and whitelist-only policies
//! - **Knowledge base** (`kb`): query contract, scoped cache, in-memory store
//!
//! ## Library usage
//!
//! ```no_run
//! use kbqa_staged::config::GenerationConfig;
//! use kbqa_staged::graph::{Entity, Graph};
//! use kbqa_staged::kb::memory::MemoryKb;
//! use kbqa_staged::link::LabelLinker;
//! use kbqa_staged::operators::EntityEdgeOperators;
//! use kbqa_staged::search::Generator;
//!
//! let kb = MemoryKb::load("kb.json".as_ref()).unwrap();
//! let linker = LabelLinker::new(&kb);
//! let generator = Generator::new(&kb, &linker, &EntityEdgeOperators, GenerationConfig::default());
//! let question = Graph::for_question(
//!     ["who", "won", "the", "nobel", "peace", "prize", "?"],
//!     vec![Entity::new(["Nobel", "Peace", "Prize"], "NNP")],
//! );
//! let outcome = generator
//!     .generate_with_gold(question, &["barack obama".to_string()])
//!     .unwrap();
//! println!("best F1: {}", outcome.best_f1());
//! ```

pub mod config;
pub mod enrich;
pub mod error;
pub mod graph;
pub mod ground;
pub mod kb;
pub mod link;
pub mod operators;
pub mod score;
pub mod search;
