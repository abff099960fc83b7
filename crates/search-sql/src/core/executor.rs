//! Execution seam for compiled queries.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::types::{ResourceRow, SqlQuery};

/// Runs compiled statements against a store.
///
/// Each method expects a statement of the matching shape: row queries
/// select [`ROW_COLUMNS`](crate::types::ROW_COLUMNS), id queries select the
/// resource id first, string queries select a single text column and count
/// queries a single integer.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Returns a short identifier for logs and errors.
    fn backend_name(&self) -> &'static str;

    /// Executes a data query and materialises its rows.
    async fn search_rows(&self, query: &SqlQuery) -> StorageResult<Vec<ResourceRow>>;

    /// Executes a query whose first column is `RESOURCE_ID`.
    async fn search_resource_ids(&self, query: &SqlQuery) -> StorageResult<Vec<i64>>;

    /// Executes a query returning one string column.
    async fn search_string_values(&self, query: &SqlQuery) -> StorageResult<Vec<String>>;

    /// Executes a count query.
    async fn count(&self, query: &SqlQuery) -> StorageResult<u64>;
}
