//! [`QueryExecutor`] for the SQLite backend.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::trace;

use crate::core::QueryExecutor;
use crate::error::{BackendError, StorageError, StorageResult};
use crate::types::{ResourceRow, SqlParam, SqlQuery};

use super::SqliteBackend;
use super::backend::{BACKEND_NAME, internal_error};

/// Formats a timestamp the way `LAST_UPDATED` and date columns store it.
///
/// Fixed precision and a `Z` suffix keep text comparison chronological.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_failed(message: String) -> StorageError {
    StorageError::Backend(BackendError::QueryFailed { message })
}

pub(crate) fn to_sql_params(binds: &[SqlParam]) -> Vec<Box<dyn rusqlite::ToSql>> {
    binds
        .iter()
        .map(|param| -> Box<dyn rusqlite::ToSql> {
            match param {
                SqlParam::String(s) => Box::new(s.clone()),
                SqlParam::Integer(i) => Box::new(*i),
                SqlParam::Float(f) => Box::new(*f),
                SqlParam::Timestamp(ts) => Box::new(format_timestamp(ts)),
                SqlParam::Null => Box::new(Option::<String>::None),
            }
        })
        .collect()
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(ResourceRowParts, Vec<u8>, String)> {
    Ok((
        ResourceRowParts {
            resource_id: row.get(0)?,
            logical_resource_id: row.get(1)?,
            version_id: row.get(2)?,
            last_updated: row.get(3)?,
            is_deleted: row.get(4)?,
        },
        row.get(5)?,
        row.get(6)?,
    ))
}

struct ResourceRowParts {
    resource_id: i64,
    logical_resource_id: i64,
    version_id: i64,
    last_updated: String,
    is_deleted: String,
}

impl SqliteBackend {
    fn query_column<T: rusqlite::types::FromSql>(&self, query: &SqlQuery) -> StorageResult<Vec<T>> {
        trace!(sql = %query.sql, binds = query.binds.len(), "executing");
        let conn = self.get_connection()?;
        let mut stmt = conn
            .prepare(&query.sql)
            .map_err(|e| query_failed(format!("Failed to prepare query: {}", e)))?;

        let params = to_sql_params(&query.binds);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| row.get::<_, T>(0))
            .map_err(|e| query_failed(format!("Failed to execute query: {}", e)))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| internal_error(format!("Failed to read row: {}", e)))
    }
}

#[async_trait]
impl QueryExecutor for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn search_rows(&self, query: &SqlQuery) -> StorageResult<Vec<ResourceRow>> {
        trace!(sql = %query.sql, binds = query.binds.len(), "executing");
        let raw_rows = {
            let conn = self.get_connection()?;
            let mut stmt = conn
                .prepare(&query.sql)
                .map_err(|e| query_failed(format!("Failed to prepare search: {}", e)))?;

            let params = to_sql_params(&query.binds);
            let param_refs: Vec<&dyn rusqlite::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();

            let rows = stmt
                .query_map(param_refs.as_slice(), read_row)
                .map_err(|e| query_failed(format!("Failed to execute search: {}", e)))?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| internal_error(format!("Failed to read row: {}", e)))?
        };

        let mut resources = Vec::with_capacity(raw_rows.len());
        for (parts, data, logical_id) in raw_rows {
            let last_updated = DateTime::parse_from_rfc3339(&parts.last_updated)
                .map_err(|e| internal_error(format!("Failed to parse LAST_UPDATED: {}", e)))?
                .with_timezone(&Utc);

            resources.push(ResourceRow {
                resource_id: parts.resource_id,
                logical_resource_id: parts.logical_resource_id,
                version_id: parts.version_id,
                last_updated,
                is_deleted: parts.is_deleted == "Y",
                data,
                logical_id,
            });
        }
        Ok(resources)
    }

    async fn search_resource_ids(&self, query: &SqlQuery) -> StorageResult<Vec<i64>> {
        self.query_column(query)
    }

    async fn search_string_values(&self, query: &SqlQuery) -> StorageResult<Vec<String>> {
        let values: Vec<Option<String>> = self.query_column(query)?;
        Ok(values.into_iter().flatten().collect())
    }

    async fn count(&self, query: &SqlQuery) -> StorageResult<u64> {
        let counts: Vec<i64> = self.query_column(query)?;
        let count = counts
            .first()
            .copied()
            .ok_or_else(|| internal_error("Count query returned no rows".to_string()))?;
        Ok(count.max(0) as u64)
    }
}
