//! Shared building blocks for the Spargres engine.
//!
//! This crate defines the term model that both the storage layer and the
//! SPARQL-to-SQL translator agree on: deterministic term identity, the
//! per-space table naming scheme and the common error types.

pub mod error;
mod tables;
mod term;

pub use tables::{validate_space_id, validate_table_prefix, SpaceTables};
pub use term::{term_uuid, TermKind, TermValue, TERM_UUID_NAMESPACE};

/// IRI of the reserved graph that holds quads asserted without an explicit
/// graph. Queries that do not constrain the graph position see the union of
/// this graph and all named graphs.
pub const GLOBAL_GRAPH_IRI: &str = "urn:___GLOBAL";
