use oxrdf::Quad;
use serde_json::Value;
use spargres_engine::{EngineError, EngineOptions, ExecutionLimits, QueryOutcome, SparqlEngine};
use spargres_storage::{PoolSettings, QuadScanSpec, SpaceStorage, StoragePools};
use std::sync::Arc;

/// A handle to one space (named dataset).
///
/// Connecting creates the space's tables if they do not exist yet. The
/// handle wraps the process-wide [`SparqlEngine`] and pools; cloning is
/// cheap and clones share connections and the term cache.
#[derive(Clone)]
pub struct SpaceStore {
    engine: SparqlEngine,
    storage: SpaceStorage,
    space_id: String,
}

impl SpaceStore {
    /// Connects to the database and opens (creating if needed) a space.
    pub async fn connect(url: &str, space_id: &str) -> Result<Self, EngineError> {
        Self::connect_with_options(url, space_id, EngineOptions::default()).await
    }

    /// Connects with explicit engine options.
    pub async fn connect_with_options(
        url: &str,
        space_id: &str,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        let pools = Arc::new(StoragePools::connect(&PoolSettings::new(url))?);
        let engine = SparqlEngine::new(pools, options)?;
        Self::open(engine, space_id).await
    }

    /// Opens a space on an existing engine.
    pub async fn open(engine: SparqlEngine, space_id: &str) -> Result<Self, EngineError> {
        let storage = engine.space(space_id)?;
        storage.ensure_created().await?;
        Ok(Self {
            engine,
            storage,
            space_id: space_id.to_owned(),
        })
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    pub fn engine(&self) -> &SparqlEngine {
        &self.engine
    }

    /// Direct access to the storage layer of this space.
    pub fn storage(&self) -> &SpaceStorage {
        &self.storage
    }

    /// Bulk-inserts quads; quads without a graph land in the reserved
    /// global graph. Returns the number of stored rows.
    pub async fn insert_quads(&self, quads: &[Quad]) -> Result<u64, EngineError> {
        Ok(self.storage.add_rdf_quads_batch(quads).await?)
    }

    /// Removes quads, one stored row per input occurrence.
    pub async fn remove_quads(&self, quads: &[Quad]) -> Result<u64, EngineError> {
        Ok(self.storage.remove_rdf_quads_batch(quads).await?)
    }

    /// Enumerates quads matching a pattern.
    pub async fn quads_matching(&self, spec: &QuadScanSpec) -> Result<Vec<Quad>, EngineError> {
        Ok(self.storage.quads_matching(spec).await?)
    }

    /// Number of quads in the space, across all graphs.
    pub async fn len(&self) -> Result<usize, EngineError> {
        Ok(usize::try_from(self.storage.quad_count().await?).unwrap_or(0))
    }

    pub async fn is_empty(&self) -> Result<bool, EngineError> {
        Ok(self.len().await? == 0)
    }

    /// Executes a SPARQL query with the default execution limits.
    pub async fn query(&self, sparql: &str) -> Result<QueryOutcome, EngineError> {
        self.query_with_limits(sparql, ExecutionLimits::default())
            .await
    }

    pub async fn query_with_limits(
        &self,
        sparql: &str,
        limits: ExecutionLimits,
    ) -> Result<QueryOutcome, EngineError> {
        self.engine
            .execute_sparql_query(&self.space_id, sparql, limits)
            .await
    }

    /// Executes a SPARQL update; the whole request applies atomically.
    pub async fn update(&self, sparql: &str) -> Result<bool, EngineError> {
        self.engine
            .execute_sparql_update(&self.space_id, sparql)
            .await
    }

    /// Raw SQL escape hatch for diagnostics and tests.
    pub async fn sql(&self, sql: &str) -> Result<(Vec<Value>, bool), EngineError> {
        self.engine
            .execute_sql_query(&self.space_id, sql, ExecutionLimits::default())
            .await
    }

    /// Builds the post-bulk-load indexes and clusters the tables.
    pub async fn optimize(&self) -> Result<(), EngineError> {
        self.storage.create_performance_indexes().await?;
        self.storage.cluster().await?;
        Ok(())
    }

    /// Drops the space's tables.
    pub async fn drop_space(self) -> Result<(), EngineError> {
        Ok(self.storage.drop_tables().await?)
    }
}
