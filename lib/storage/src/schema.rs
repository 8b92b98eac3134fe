use spargres_common::SpaceTables;
use spargres_common::error::StorageError;
use tokio_postgres::Client;
use tracing::{debug, info};

/// Options applied when creating the tables of a space.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaOptions {
    /// Create `UNLOGGED` tables. Roughly doubles bulk-load throughput but
    /// loses the tables on a crash.
    pub unlogged: bool,
}

/// Creates the four tables of a space together with their base indexes.
///
/// The quad table has no foreign keys: terms are inserted before quads
/// within a batch, which keeps bulk loads append-only.
pub async fn create_space_tables(
    client: &Client,
    tables: &SpaceTables,
    options: SchemaOptions,
) -> Result<(), StorageError> {
    let table_type = if options.unlogged {
        "UNLOGGED TABLE"
    } else {
        "TABLE"
    };
    let idx = tables.index_prefix();

    let ddl = format!(
        r#"
        CREATE {table_type} IF NOT EXISTS {term} (
            term_uuid UUID PRIMARY KEY,
            term_text TEXT NOT NULL,
            term_type CHAR(1) NOT NULL CHECK (term_type IN ('U', 'L', 'B', 'G')),
            lang VARCHAR(20),
            datatype_uuid UUID,
            created_time TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        CREATE INDEX IF NOT EXISTS idx_{idx}_term_text ON {term} (term_text);
        CREATE INDEX IF NOT EXISTS idx_{idx}_term_type ON {term} (term_type);

        CREATE {table_type} IF NOT EXISTS {quad} (
            subject_uuid UUID NOT NULL,
            predicate_uuid UUID NOT NULL,
            object_uuid UUID NOT NULL,
            context_uuid UUID NOT NULL,
            quad_uuid UUID NOT NULL DEFAULT gen_random_uuid(),
            created_time TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (subject_uuid, predicate_uuid, object_uuid, context_uuid, quad_uuid)
        );
        CREATE INDEX IF NOT EXISTS idx_{idx}_quad_predicate ON {quad} (predicate_uuid);
        CREATE INDEX IF NOT EXISTS idx_{idx}_quad_object ON {quad} (object_uuid);
        CREATE INDEX IF NOT EXISTS idx_{idx}_quad_context ON {quad} (context_uuid);
        CREATE INDEX IF NOT EXISTS idx_{idx}_quad_uuid ON {quad} (quad_uuid);

        CREATE {table_type} IF NOT EXISTS {namespace} (
            namespace_id BIGSERIAL PRIMARY KEY,
            prefix VARCHAR(50) NOT NULL UNIQUE,
            namespace_uri TEXT NOT NULL,
            created_time TIMESTAMPTZ NOT NULL DEFAULT now()
        );

        CREATE {table_type} IF NOT EXISTS {graph} (
            graph_id BIGSERIAL PRIMARY KEY,
            graph_uri TEXT NOT NULL UNIQUE,
            graph_name VARCHAR(255),
            created_time TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_time TIMESTAMPTZ NOT NULL DEFAULT now(),
            triple_count BIGINT NOT NULL DEFAULT 0
        );
        "#,
        term = tables.term(),
        quad = tables.rdf_quad(),
        namespace = tables.namespace(),
        graph = tables.graph(),
    );

    client.batch_execute(&ddl).await?;
    info!(space = tables.space_id(), unlogged = options.unlogged, "created space tables");
    Ok(())
}

/// Creates the heavier indexes meant to be built after a bulk load: the
/// composite text/type and quad-position indexes plus trigram GIN/GiST
/// indexes that accelerate regex and substring filters.
///
/// Requires the `pg_trgm` extension.
pub async fn create_performance_indexes(
    client: &Client,
    tables: &SpaceTables,
) -> Result<(), StorageError> {
    client
        .batch_execute("CREATE EXTENSION IF NOT EXISTS pg_trgm")
        .await?;
    let idx = tables.index_prefix();
    let ddl = format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{idx}_term_text_type ON {term} (term_text, term_type);
        CREATE INDEX IF NOT EXISTS idx_{idx}_term_text_gin_trgm ON {term} USING gin (term_text gin_trgm_ops);
        CREATE INDEX IF NOT EXISTS idx_{idx}_term_text_gist_trgm ON {term} USING gist (term_text gist_trgm_ops);
        CREATE INDEX IF NOT EXISTS idx_{idx}_quad_spoc ON {quad} (subject_uuid, predicate_uuid, object_uuid, context_uuid);
        CREATE INDEX IF NOT EXISTS idx_{idx}_quad_subject ON {quad} (subject_uuid);
        "#,
        term = tables.term(),
        quad = tables.rdf_quad(),
    );
    client.batch_execute(&ddl).await?;
    debug!(space = tables.space_id(), "created performance indexes");
    Ok(())
}

/// Physically reorders the tables after a bulk load: term rows by UUID for
/// join locality with quads, quad rows by subject for subject-focused scans.
pub async fn cluster_tables(client: &Client, tables: &SpaceTables) -> Result<(), StorageError> {
    let idx = tables.index_prefix();
    let term_pkey = format!("{}_pkey", tables.term());
    let sql = format!(
        "CLUSTER {term} USING {term_pkey}; CLUSTER {quad} USING idx_{idx}_quad_subject; ANALYZE {term}; ANALYZE {quad};",
        term = tables.term(),
        quad = tables.rdf_quad(),
    );
    client.batch_execute(&sql).await?;
    info!(space = tables.space_id(), "clustered space tables");
    Ok(())
}

/// Drops all tables of the space.
pub async fn drop_space_tables(client: &Client, tables: &SpaceTables) -> Result<(), StorageError> {
    // Reverse dependency order, though nothing references across tables.
    let sql = format!(
        "DROP TABLE IF EXISTS {quad}; DROP TABLE IF EXISTS {graph}; DROP TABLE IF EXISTS {namespace}; DROP TABLE IF EXISTS {term};",
        quad = tables.rdf_quad(),
        graph = tables.graph(),
        namespace = tables.namespace(),
        term = tables.term(),
    );
    client.batch_execute(&sql).await?;
    info!(space = tables.space_id(), "dropped space tables");
    Ok(())
}

/// Checks whether the space's tables exist.
pub async fn space_exists(client: &Client, tables: &SpaceTables) -> Result<bool, StorageError> {
    let row = client
        .query_one("SELECT to_regclass($1) IS NOT NULL", &[&tables.rdf_quad()])
        .await?;
    Ok(row.get(0))
}
