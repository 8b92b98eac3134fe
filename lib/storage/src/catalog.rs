use spargres_common::error::StorageError;
use spargres_common::SpaceTables;
use tokio_postgres::GenericClient;

/// A namespace prefix mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRecord {
    pub prefix: String,
    pub namespace_uri: String,
}

/// A registered named graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphRecord {
    pub graph_uri: String,
    pub graph_name: Option<String>,
    pub triple_count: i64,
}

/// Registers or updates a namespace prefix.
pub async fn set_namespace<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    prefix: &str,
    namespace_uri: &str,
) -> Result<(), StorageError> {
    let sql = format!(
        "INSERT INTO {} (prefix, namespace_uri) VALUES ($1, $2) \
         ON CONFLICT (prefix) DO UPDATE SET namespace_uri = EXCLUDED.namespace_uri",
        tables.namespace()
    );
    client.execute(sql.as_str(), &[&prefix, &namespace_uri]).await?;
    Ok(())
}

/// Looks up the URI bound to a prefix.
pub async fn get_namespace_uri<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    prefix: &str,
) -> Result<Option<String>, StorageError> {
    let sql = format!(
        "SELECT namespace_uri FROM {} WHERE prefix = $1",
        tables.namespace()
    );
    let row = client.query_opt(sql.as_str(), &[&prefix]).await?;
    Ok(row.map(|row| row.get(0)))
}

/// Lists all namespace mappings, ordered by prefix.
pub async fn list_namespaces<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
) -> Result<Vec<NamespaceRecord>, StorageError> {
    let sql = format!(
        "SELECT prefix, namespace_uri FROM {} ORDER BY prefix",
        tables.namespace()
    );
    let rows = client.query(sql.as_str(), &[]).await?;
    Ok(rows
        .into_iter()
        .map(|row| NamespaceRecord {
            prefix: row.get(0),
            namespace_uri: row.get(1),
        })
        .collect())
}

/// Removes a namespace mapping. Returns whether a row was removed.
pub async fn delete_namespace<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    prefix: &str,
) -> Result<bool, StorageError> {
    let sql = format!("DELETE FROM {} WHERE prefix = $1", tables.namespace());
    Ok(client.execute(sql.as_str(), &[&prefix]).await? > 0)
}

/// Registers a named graph. Returns false if it already existed.
pub async fn create_graph<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    graph_uri: &str,
    graph_name: Option<&str>,
) -> Result<bool, StorageError> {
    let sql = format!(
        "INSERT INTO {} (graph_uri, graph_name) VALUES ($1, $2) ON CONFLICT (graph_uri) DO NOTHING",
        tables.graph()
    );
    Ok(client.execute(sql.as_str(), &[&graph_uri, &graph_name]).await? > 0)
}

/// Looks up one graph registration.
pub async fn get_graph<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    graph_uri: &str,
) -> Result<Option<GraphRecord>, StorageError> {
    let sql = format!(
        "SELECT graph_uri, graph_name, triple_count FROM {} WHERE graph_uri = $1",
        tables.graph()
    );
    let row = client.query_opt(sql.as_str(), &[&graph_uri]).await?;
    Ok(row.map(|row| GraphRecord {
        graph_uri: row.get(0),
        graph_name: row.get(1),
        triple_count: row.get(2),
    }))
}

/// Lists registered graphs, ordered by URI.
pub async fn list_graphs<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
) -> Result<Vec<GraphRecord>, StorageError> {
    let sql = format!(
        "SELECT graph_uri, graph_name, triple_count FROM {} ORDER BY graph_uri",
        tables.graph()
    );
    let rows = client.query(sql.as_str(), &[]).await?;
    Ok(rows
        .into_iter()
        .map(|row| GraphRecord {
            graph_uri: row.get(0),
            graph_name: row.get(1),
            triple_count: row.get(2),
        })
        .collect())
}

/// Unregisters a graph. Quads are not touched; see the quad-level clear.
pub async fn delete_graph<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    graph_uri: &str,
) -> Result<bool, StorageError> {
    let sql = format!("DELETE FROM {} WHERE graph_uri = $1", tables.graph());
    Ok(client.execute(sql.as_str(), &[&graph_uri]).await? > 0)
}

/// Empties the graph registry.
pub async fn clear_graph_registry<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
) -> Result<u64, StorageError> {
    let sql = format!("DELETE FROM {}", tables.graph());
    Ok(client.execute(sql.as_str(), &[]).await?)
}

/// Recomputes the stored triple count of a graph from the quad table.
pub async fn refresh_graph_triple_count<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    graph_uri: &str,
    context_uuid: uuid::Uuid,
) -> Result<i64, StorageError> {
    let sql = format!(
        "UPDATE {graph} SET triple_count = (SELECT count(*) FROM {quad} WHERE context_uuid = $2), updated_time = now() \
         WHERE graph_uri = $1 RETURNING triple_count",
        graph = tables.graph(),
        quad = tables.rdf_quad()
    );
    let row = client.query_opt(sql.as_str(), &[&graph_uri, &context_uuid]).await?;
    Ok(row.map_or(0, |row| row.get(0)))
}
