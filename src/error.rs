//! Rich diagnostic error types for the staged generator.
//!
//! Each collaborator boundary defines its own error type with miette `#[diagnostic]`
//! derives, so a failed search tells the caller which service misbehaved and what
//! to check. Empty results are never errors: a skeleton with no groundings is a
//! normal outcome and is represented as an empty list.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the staged generator.
///
/// Each variant wraps a boundary-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum KbqaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Kb(#[from] KbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Knowledge-base errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum KbError {
    #[error("knowledge-base query timed out after {after_ms} ms: {operation}")]
    #[diagnostic(
        code(kbqa::kb::timeout),
        help(
            "The query service did not answer in time. The generator has no retry \
             logic of its own; retry or back off in the service layer, or raise its timeout."
        )
    )]
    Timeout { operation: String, after_ms: u64 },

    #[error("malformed knowledge-base response: {message}")]
    #[diagnostic(
        code(kbqa::kb::malformed),
        help("The query service returned a row the generator could not interpret. Check the endpoint version.")
    )]
    Malformed { message: String },

    #[error("knowledge base unavailable: {message}")]
    #[diagnostic(
        code(kbqa::kb::unavailable),
        help("The query service could not be reached. Check the endpoint and network access.")
    )]
    Unavailable { message: String },

    #[error("failed to read knowledge-base fixture: {path}")]
    #[diagnostic(
        code(kbqa::kb::fixture_read),
        help("Ensure the fixture file exists and is readable.")
    )]
    FixtureRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse knowledge-base fixture {path}: {message}")]
    #[diagnostic(
        code(kbqa::kb::fixture_parse),
        help(
            "A fixture is a JSON object with `triples` ([subject, property, object] rows), \
             `labels`, `properties`, `whitelist` and `demonyms`."
        )
    )]
    FixtureParse { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Scoring model errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("scoring model returned {actual} score(s) for {expected} graph(s)")]
    #[diagnostic(
        code(kbqa::model::score_count),
        help(
            "A scoring model must return exactly one score per input graph, in input order. \
             The search was aborted rather than pairing scores with the wrong graphs."
        )
    )]
    ScoreCountMismatch { expected: usize, actual: usize },

    #[error("scoring model failed: {message}")]
    #[diagnostic(code(kbqa::model::backend), help("The scoring backend reported an error."))]
    Backend { message: String },
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("unknown grounding variable: {name}")]
    #[diagnostic(
        code(kbqa::graph::unknown_variable),
        help(
            "Grounding variables are `r<i>d`, `r<i>r`, `r<i>v` (relation of edge i), \
             `hop<i>v` (auxiliary hop of edge i) and `e2<i>` (right entity of edge i)."
        )
    )]
    UnknownVariable { name: String },

    #[error("edge {edge} has a relation id but no edge type")]
    #[diagnostic(
        code(kbqa::graph::kb_id_without_type),
        help("A grounded edge needs both `kind` and `kb_id`; a free edge has neither.")
    )]
    KbIdWithoutType { edge: usize },

    #[error("edge {edge} is typed `{kind}` but has no relation id")]
    #[diagnostic(
        code(kbqa::graph::type_without_kb_id),
        help("A typed edge must also carry `kb_id`. Remove the type or add the relation id.")
    )]
    TypeWithoutKbId { edge: usize, kind: String },

    #[error("unknown edge type: {name}")]
    #[diagnostic(
        code(kbqa::graph::unknown_edge_type),
        help("Valid edge types are: direct, reverse, v-structure, time.")
    )]
    UnknownEdgeType { name: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read generation config: {path}")]
    #[diagnostic(
        code(kbqa::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse generation config {path}: {message}")]
    #[diagnostic(
        code(kbqa::config::parse),
        help("Check the TOML syntax in the generation config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write generation config: {path}")]
    #[diagnostic(
        code(kbqa::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for functions returning generator results.
pub type KbqaResult<T> = std::result::Result<T, KbqaError>;

/// Result type for knowledge-base queries.
pub type KbResult<T> = std::result::Result<T, KbError>;

/// Result type for scoring model calls.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Result type for graph validation and grounding decoding.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Result type for configuration I/O.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
