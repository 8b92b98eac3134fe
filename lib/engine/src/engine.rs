use crate::error::EngineError;
use crate::executor::fetch_all_paged;
use crate::limits::ExecutionLimits;
use crate::results::{
    construct_triples, describe_triples, solutions_from_rows, QueryOutcome, QueryResults,
};
use crate::update::apply_update;
use serde_json::Value;
use spargebra::{Query, Update};
use spargres_storage::{SchemaOptions, SpaceStorage, StoragePools, TermCache};
use spargres_translator::{compile_query, compile_update, QueryForm};
use std::sync::Arc;
use tracing::debug;

/// Deployment-wide engine configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Prefix of all managed tables; alphanumeric and underscore, no
    /// leading digit.
    pub table_prefix: String,
    /// Attach the generated SQL to database errors. Useful while debugging
    /// the translator, off by default since statements can be large.
    pub include_sql_in_errors: bool,
    /// Options applied when creating space tables.
    pub schema: SchemaOptions,
    /// Entry bound of the process-wide term cache.
    pub term_cache_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            table_prefix: "spargres".to_owned(),
            include_sql_in_errors: false,
            schema: SchemaOptions::default(),
            term_cache_capacity: 100_000,
        }
    }
}

/// The SPARQL engine: parses, compiles, executes, and shapes results.
///
/// One engine serves many spaces; per-space state is only table names, so
/// [`SparqlEngine::space`] handles are cheap.
#[derive(Clone)]
pub struct SparqlEngine {
    pools: Arc<StoragePools>,
    cache: Arc<TermCache>,
    options: Arc<EngineOptions>,
}

impl SparqlEngine {
    pub fn new(pools: Arc<StoragePools>, options: EngineOptions) -> Result<Self, EngineError> {
        spargres_common::validate_table_prefix(&options.table_prefix)?;
        let cache = Arc::new(TermCache::new(options.term_cache_capacity));
        Ok(Self {
            pools,
            cache,
            options: Arc::new(options),
        })
    }

    /// The storage handle for one space.
    pub fn space(&self, space_id: &str) -> Result<SpaceStorage, EngineError> {
        Ok(SpaceStorage::new(
            Arc::clone(&self.pools),
            Arc::clone(&self.cache),
            &self.options.table_prefix,
            space_id,
            self.options.schema,
        )?)
    }

    pub fn term_cache(&self) -> &Arc<TermCache> {
        &self.cache
    }

    /// Parses and executes a SPARQL query, returning shaped results.
    pub async fn execute_sparql_query(
        &self,
        space_id: &str,
        sparql: &str,
        limits: ExecutionLimits,
    ) -> Result<QueryOutcome, EngineError> {
        let space = self.space(space_id)?;
        let query = Query::parse(sparql, None)?;
        let compiled = compile_query(space.tables(), &query)?;
        debug!(space = space_id, sql = %compiled.sql, "compiled SPARQL query");

        let mut client = self.pools.query().await?;
        let (rows, truncated) = fetch_all_paged(
            &mut client,
            &compiled.sql,
            &limits,
            self.options.include_sql_in_errors,
        )
        .await?;

        let results = match compiled.form {
            QueryForm::Select => QueryResults::Solutions(solutions_from_rows(&rows, &compiled)?),
            QueryForm::Ask => QueryResults::Boolean(!rows.is_empty()),
            QueryForm::Construct => QueryResults::Triples(construct_triples(&rows, &compiled)?),
            QueryForm::Describe => QueryResults::Triples(describe_triples(&rows)?),
        };
        Ok(QueryOutcome { results, truncated })
    }

    /// Parses and executes a SPARQL update. All operations of the request
    /// apply atomically.
    pub async fn execute_sparql_update(
        &self,
        space_id: &str,
        sparql: &str,
    ) -> Result<bool, EngineError> {
        let space = self.space(space_id)?;
        let update = Update::parse(sparql, None)?;
        let plan = compile_update(space.tables(), &update)?;
        debug!(space = space_id, steps = plan.steps.len(), "compiled SPARQL update");
        apply_update(&space, &plan, self.options.include_sql_in_errors).await
    }

    /// Diagnostics escape hatch: runs raw SQL with the same paging and
    /// limits as query execution, returning one JSON object per row.
    pub async fn execute_sql_query(
        &self,
        space_id: &str,
        sql: &str,
        limits: ExecutionLimits,
    ) -> Result<(Vec<Value>, bool), EngineError> {
        debug!(space = space_id, "executing raw SQL");
        let wrapped = format!("SELECT to_jsonb(t) AS row FROM ({sql}) t");
        let mut client = self.pools.query().await?;
        let (rows, truncated) = fetch_all_paged(
            &mut client,
            &wrapped,
            &limits,
            self.options.include_sql_in_errors,
        )
        .await?;
        let mut shaped = Vec::with_capacity(rows.len());
        for row in rows {
            let value: Value = row.try_get(0).map_err(|e| {
                EngineError::Database(crate::error::DatabaseFailure { source: e, sql: None })
            })?;
            shaped.push(value);
        }
        Ok((shaped, truncated))
    }
}
