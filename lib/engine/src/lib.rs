//! SPARQL query execution for Spargres.
//!
//! The engine glues the translator to the storage layer: it parses SPARQL,
//! compiles it to SQL, runs the SQL through a server-side portal with row
//! and memory caps, and shapes the rows back into SPARQL results (JSON
//! bindings, triples, or a boolean). Updates are lowered to batch steps and
//! applied inside a single transaction.

mod engine;
mod error;
mod executor;
mod limits;
mod results;
mod update;

pub use engine::{EngineOptions, SparqlEngine};
pub use error::EngineError;
pub use limits::ExecutionLimits;
pub use results::{QueryOutcome, QueryResults};
