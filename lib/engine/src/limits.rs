use tokio_postgres::types::Type;
use tokio_postgres::Row;

/// Row and memory caps applied to query execution.
///
/// Rows are fetched in pages; after each page the estimated memory is
/// recomputed, and whichever cap trips first truncates the result with a
/// warning instead of letting an unbounded query take the process down.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    pub max_rows: usize,
    pub max_memory_mb: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_rows: 100_000,
            max_memory_mb: 500,
        }
    }
}

impl ExecutionLimits {
    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_mb.saturating_mul(1024 * 1024)
    }
}

/// Best-effort per-row memory estimate: measured text payloads plus a fixed
/// overhead per column.
pub(crate) fn estimate_row_bytes(row: &Row) -> usize {
    let mut bytes = 24 * row.len();
    for (index, column) in row.columns().iter().enumerate() {
        match *column.type_() {
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
                if let Ok(Some(value)) = row.try_get::<_, Option<&str>>(index) {
                    bytes += value.len();
                }
            }
            _ => bytes += 16,
        }
    }
    bytes
}
