use oxrdf::NamedNode;
use spargres_common::error::{CorruptionError, StorageError};
use spargres_translator::TranslationError;
use std::fmt;

/// An error raised while evaluating a SPARQL query or update.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The SPARQL text could not be parsed; surfaced verbatim.
    #[error(transparent)]
    Parsing(#[from] spargebra::SparqlSyntaxError),
    /// The algebra could not be compiled to SQL.
    #[error(transparent)]
    Translation(#[from] TranslationError),
    /// An error from the storage layer.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Stored data failed to decode.
    #[error(transparent)]
    Corruption(#[from] CorruptionError),
    /// The generated SQL failed to execute. The SQL text is attached when
    /// diagnostics are enabled so the translator can be debugged.
    #[error("{0}")]
    Database(DatabaseFailure),
    /// `CREATE GRAPH` on an existing graph without SILENT.
    #[error("The graph {0} already exists")]
    GraphAlreadyExists(NamedNode),
    /// `LOAD` could not fetch or parse the remote document.
    #[error("LOAD of <{url}> failed: {reason}")]
    Load { url: String, reason: String },
}

/// A failed SQL execution, optionally carrying the statement text.
#[derive(Debug)]
pub struct DatabaseFailure {
    pub source: tokio_postgres::Error,
    pub sql: Option<String>,
}

impl fmt::Display for DatabaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql {
            Some(sql) => write!(f, "SQL execution failed: {} (statement: {sql})", self.source),
            None => write!(f, "SQL execution failed: {}", self.source),
        }
    }
}

impl std::error::Error for DatabaseFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl EngineError {
    /// Wraps a database error, attaching the SQL text when diagnostics ask
    /// for it.
    pub(crate) fn database(
        source: tokio_postgres::Error,
        sql: &str,
        include_sql: bool,
    ) -> Self {
        Self::Database(DatabaseFailure {
            source,
            sql: include_sql.then(|| sql.to_owned()),
        })
    }
}
