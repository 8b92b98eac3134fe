//! SPARQL 1.1 over PostgreSQL.
//!
//! Spargres stores RDF quads in a normalized PostgreSQL schema with a
//! deduplicated, deterministically keyed term dictionary, and compiles
//! SPARQL queries into single SQL statements executed server-side.
//!
//! The entry point is [`SpaceStore`], a handle to one named dataset:
//!
//! ```no_run
//! use spargres::model::{GraphName, Literal, NamedNode, Quad};
//! use spargres::SpaceStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = SpaceStore::connect("postgresql://localhost/rdf", "demo").await?;
//!
//! let alice = NamedNode::new("http://example.com/alice")?;
//! let name = NamedNode::new("http://example.com/name")?;
//! store
//!     .insert_quads(&[Quad::new(
//!         alice,
//!         name,
//!         Literal::new_simple_literal("Alice"),
//!         GraphName::DefaultGraph,
//!     )])
//!     .await?;
//!
//! let outcome = store
//!     .query("SELECT ?name WHERE { ?s <http://example.com/name> ?name }")
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod store;

pub use store::SpaceStore;

pub mod error {
    pub use spargres_common::error::{CorruptionError, StorageError};
    pub use spargres_engine::EngineError;
    pub use spargres_translator::TranslationError;
}

pub mod model {
    pub use oxrdf::*;
}

pub mod engine {
    pub use spargres_engine::*;
}

pub mod storage {
    pub use spargres_storage::*;
}

pub mod translator {
    pub use spargres_translator::*;
}

pub use spargres_common::GLOBAL_GRAPH_IRI;
