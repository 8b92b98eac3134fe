use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use spargres_common::error::StorageError;
use tokio_postgres::NoTls;

/// Connection settings for the two storage pools.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// A `postgresql://` connection string.
    pub url: String,
    /// Maximum connections of the ingest pool.
    pub max_ingest_connections: usize,
    /// Maximum connections of the query pool.
    pub max_query_connections: usize,
}

impl PoolSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_ingest_connections: 4,
            max_query_connections: 16,
        }
    }
}

/// The process-wide connection pools.
///
/// Ingest and query traffic are segregated so that a long bulk load cannot
/// starve result shaping and vice versa. Both pools are constructed at
/// startup and closed at shutdown.
pub struct StoragePools {
    ingest: Pool,
    query: Pool,
}

impl StoragePools {
    pub fn connect(settings: &PoolSettings) -> Result<Self, StorageError> {
        let config: tokio_postgres::Config =
            settings.url.parse().map_err(StorageError::Database)?;
        Ok(Self {
            ingest: build_pool(config.clone(), settings.max_ingest_connections)?,
            query: build_pool(config, settings.max_query_connections)?,
        })
    }

    /// Acquires a connection from the ingest pool.
    pub async fn ingest(&self) -> Result<Object, StorageError> {
        self.ingest.get().await.map_err(StorageError::pool)
    }

    /// Acquires a connection from the query pool.
    pub async fn query(&self) -> Result<Object, StorageError> {
        self.query.get().await.map_err(StorageError::pool)
    }

    /// Closes both pools. Outstanding connections are dropped when returned.
    pub fn close(&self) {
        self.ingest.close();
        self.query.close();
    }
}

fn build_pool(config: tokio_postgres::Config, max_size: usize) -> Result<Pool, StorageError> {
    let manager = Manager::from_config(
        config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Pool::builder(manager)
        .max_size(max_size)
        .build()
        .map_err(StorageError::pool)
}
