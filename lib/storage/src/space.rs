use crate::catalog::{self, GraphRecord, NamespaceRecord};
use crate::pattern::{QuadPatternScan, QuadScanSpec};
use crate::pool::StoragePools;
use crate::quads;
use crate::schema::{self, SchemaOptions};
use crate::term_cache::TermCache;
use crate::terms::{self, TermDeletion};
use oxrdf::Quad;
use rustc_hash::FxHashMap;
use spargres_common::error::StorageError;
use spargres_common::{SpaceTables, TermValue};
use std::sync::Arc;
use uuid::Uuid;

/// Handle to the tables of one space.
///
/// All batch mutations run inside a transaction on a connection from the
/// ingest pool; reads use the query pool. The handle is cheap to clone.
#[derive(Clone)]
pub struct SpaceStorage {
    pools: Arc<StoragePools>,
    cache: Arc<TermCache>,
    tables: SpaceTables,
    options: SchemaOptions,
}

impl SpaceStorage {
    pub fn new(
        pools: Arc<StoragePools>,
        cache: Arc<TermCache>,
        prefix: &str,
        space_id: &str,
        options: SchemaOptions,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            pools,
            cache,
            tables: SpaceTables::new(prefix, space_id)?,
            options,
        })
    }

    pub fn tables(&self) -> &SpaceTables {
        &self.tables
    }

    pub fn pools(&self) -> &Arc<StoragePools> {
        &self.pools
    }

    pub fn term_cache(&self) -> &Arc<TermCache> {
        &self.cache
    }

    //
    // Schema lifecycle
    //

    pub async fn ensure_created(&self) -> Result<(), StorageError> {
        let client = self.pools.ingest().await?;
        schema::create_space_tables(&client, &self.tables, self.options).await
    }

    pub async fn create_performance_indexes(&self) -> Result<(), StorageError> {
        let client = self.pools.ingest().await?;
        schema::create_performance_indexes(&client, &self.tables).await
    }

    /// Physically clusters the tables; meant to run once after a bulk load.
    pub async fn cluster(&self) -> Result<(), StorageError> {
        let client = self.pools.ingest().await?;
        schema::cluster_tables(&client, &self.tables).await
    }

    pub async fn drop_tables(&self) -> Result<(), StorageError> {
        let client = self.pools.ingest().await?;
        schema::drop_space_tables(&client, &self.tables).await
    }

    pub async fn exists(&self) -> Result<bool, StorageError> {
        let client = self.pools.query().await?;
        schema::space_exists(&client, &self.tables).await
    }

    //
    // Term dictionary
    //

    pub async fn add_term(&self, term: &TermValue) -> Result<Uuid, StorageError> {
        let client = self.pools.ingest().await?;
        terms::add_term(&**client, &self.tables, &self.cache, term).await
    }

    pub async fn get_term_uuid(&self, term: &TermValue) -> Result<Option<Uuid>, StorageError> {
        let client = self.pools.query().await?;
        terms::get_term_uuid(&**client, &self.tables, term).await
    }

    pub async fn delete_term(&self, term: &TermValue) -> Result<TermDeletion, StorageError> {
        let client = self.pools.ingest().await?;
        terms::delete_term(&**client, &self.tables, &self.cache, term).await
    }

    pub async fn resolve_terms(
        &self,
        uuids: &[Uuid],
    ) -> Result<FxHashMap<Uuid, TermValue>, StorageError> {
        let client = self.pools.query().await?;
        terms::resolve_terms(&**client, &self.tables, uuids).await
    }

    //
    // Quads
    //

    /// Inserts a batch of quads atomically.
    pub async fn add_rdf_quads_batch(&self, batch: &[Quad]) -> Result<u64, StorageError> {
        let mut client = self.pools.ingest().await?;
        let transaction = client.transaction().await?;
        let outcome = async {
            let inserted =
                quads::add_rdf_quads_batch(&*transaction, &self.tables, &self.cache, batch)
                    .await?;
            transaction.commit().await?;
            Ok(inserted)
        }
        .await;
        if outcome.is_err() {
            // The cache may have learned terms from the rolled-back
            // transaction.
            self.cache.clear();
        }
        outcome
    }

    /// Removes a batch of quads atomically, one stored row per occurrence.
    pub async fn remove_rdf_quads_batch(&self, batch: &[Quad]) -> Result<u64, StorageError> {
        let mut client = self.pools.ingest().await?;
        let transaction = client.transaction().await?;
        let removed = quads::remove_rdf_quads_batch(&*transaction, &self.tables, batch).await?;
        transaction.commit().await?;
        Ok(removed)
    }

    pub async fn remove_quads_by_subject(&self, subject_iri: &str) -> Result<u64, StorageError> {
        let client = self.pools.ingest().await?;
        quads::remove_quads_by_subject(&**client, &self.tables, subject_iri).await
    }

    pub async fn quad_count(&self) -> Result<i64, StorageError> {
        let client = self.pools.query().await?;
        quads::quad_count(&**client, &self.tables).await
    }

    pub async fn graph_quad_count(&self, graph: &TermValue) -> Result<i64, StorageError> {
        let client = self.pools.query().await?;
        quads::graph_quad_count(&**client, &self.tables, graph).await
    }

    /// Materializes every quad matching the pattern. Streaming callers can
    /// hold their own connection and drive [`QuadPatternScan`] directly.
    pub async fn quads_matching(&self, spec: &QuadScanSpec) -> Result<Vec<Quad>, StorageError> {
        let mut client = self.pools.query().await?;
        let scan = QuadPatternScan::start(&mut client, &self.tables, spec).await?;
        scan.collect_remaining().await
    }

    //
    // Namespaces and the graph registry
    //

    pub async fn set_namespace(
        &self,
        prefix: &str,
        namespace_uri: &str,
    ) -> Result<(), StorageError> {
        let client = self.pools.ingest().await?;
        catalog::set_namespace(&**client, &self.tables, prefix, namespace_uri).await
    }

    pub async fn get_namespace_uri(&self, prefix: &str) -> Result<Option<String>, StorageError> {
        let client = self.pools.query().await?;
        catalog::get_namespace_uri(&**client, &self.tables, prefix).await
    }

    pub async fn list_namespaces(&self) -> Result<Vec<NamespaceRecord>, StorageError> {
        let client = self.pools.query().await?;
        catalog::list_namespaces(&**client, &self.tables).await
    }

    pub async fn delete_namespace(&self, prefix: &str) -> Result<bool, StorageError> {
        let client = self.pools.ingest().await?;
        catalog::delete_namespace(&**client, &self.tables, prefix).await
    }

    pub async fn create_graph(
        &self,
        graph_uri: &str,
        graph_name: Option<&str>,
    ) -> Result<bool, StorageError> {
        let client = self.pools.ingest().await?;
        catalog::create_graph(&**client, &self.tables, graph_uri, graph_name).await
    }

    pub async fn get_graph(&self, graph_uri: &str) -> Result<Option<GraphRecord>, StorageError> {
        let client = self.pools.query().await?;
        catalog::get_graph(&**client, &self.tables, graph_uri).await
    }

    pub async fn list_graphs(&self) -> Result<Vec<GraphRecord>, StorageError> {
        let client = self.pools.query().await?;
        catalog::list_graphs(&**client, &self.tables).await
    }

    pub async fn delete_graph(&self, graph_uri: &str) -> Result<bool, StorageError> {
        let client = self.pools.ingest().await?;
        catalog::delete_graph(&**client, &self.tables, graph_uri).await
    }

    pub async fn refresh_graph_triple_count(&self, graph_uri: &str) -> Result<i64, StorageError> {
        let context_uuid = TermValue::uri(graph_uri).uuid();
        let client = self.pools.ingest().await?;
        catalog::refresh_graph_triple_count(&**client, &self.tables, graph_uri, context_uuid).await
    }
}
