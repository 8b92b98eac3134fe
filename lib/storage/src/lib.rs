//! PostgreSQL storage layer for Spargres.
//!
//! A *space* is a named dataset backed by four tables (`term`, `rdf_quad`,
//! `namespace`, `graph`). Terms are interned into a deduplicated dictionary
//! keyed by deterministic v5 UUIDs, quads reference terms by UUID only, and
//! referential integrity is kept by insertion order instead of foreign keys
//! so that bulk loads stay append-only.

pub mod catalog;
mod pattern;
mod pool;
pub mod quads;
pub mod schema;
mod space;
mod term_cache;
pub mod terms;

pub use catalog::{GraphRecord, NamespaceRecord};
pub use pattern::{PatternValue, QuadPatternScan, QuadScanSpec};
pub use pool::{PoolSettings, StoragePools};
pub use schema::SchemaOptions;
pub use space::SpaceStorage;
pub use term_cache::{TermCache, TermCacheStats};
pub use terms::TermDeletion;

pub use spargres_common::error::{CorruptionError, StorageError};
