use crate::error::EngineError;
use crate::limits::{estimate_row_bytes, ExecutionLimits};
use tokio_postgres::{Client, Row};
use tracing::{debug, warn};

/// Rows fetched per portal round-trip.
const FETCH_PAGE_SIZE: i32 = 1000;

/// Runs a SELECT through a server-side portal, fetching in pages and
/// enforcing the row and memory caps.
///
/// Returns the rows plus a flag indicating truncation. The portal lives in
/// a read transaction that is rolled back on every exit path, so no cursor
/// survives this function and the connection goes back to the pool clean;
/// an early drop of the future leaves the transaction guard to issue the
/// rollback.
pub(crate) async fn fetch_all_paged(
    client: &mut Client,
    sql: &str,
    limits: &ExecutionLimits,
    include_sql_in_errors: bool,
) -> Result<(Vec<Row>, bool), EngineError> {
    let transaction = client
        .transaction()
        .await
        .map_err(|e| EngineError::database(e, sql, include_sql_in_errors))?;
    let portal = transaction
        .bind(sql, &[])
        .await
        .map_err(|e| EngineError::database(e, sql, include_sql_in_errors))?;

    let mut rows: Vec<Row> = Vec::new();
    let mut estimated_bytes = 0usize;
    let mut truncated = false;
    let max_bytes = limits.max_memory_bytes();

    loop {
        let page = transaction
            .query_portal(&portal, FETCH_PAGE_SIZE)
            .await
            .map_err(|e| EngineError::database(e, sql, include_sql_in_errors))?;
        let exhausted = (page.len() as i32) < FETCH_PAGE_SIZE;

        for row in page {
            estimated_bytes += estimate_row_bytes(&row);
            rows.push(row);
            if rows.len() >= limits.max_rows {
                truncated = true;
                break;
            }
            if estimated_bytes > max_bytes {
                truncated = true;
                break;
            }
        }
        if truncated || exhausted {
            break;
        }
    }

    if truncated {
        warn!(
            rows = rows.len(),
            estimated_bytes, "query result truncated by execution limits"
        );
    } else {
        debug!(rows = rows.len(), estimated_bytes, "query executed");
    }

    transaction
        .rollback()
        .await
        .map_err(|e| EngineError::database(e, sql, include_sql_in_errors))?;
    Ok((rows, truncated))
}
