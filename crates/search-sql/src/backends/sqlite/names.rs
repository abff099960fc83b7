//! SQLite-backed parameter-name and code-system stores.

use std::collections::HashMap;

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

use crate::error::StorageResult;
use crate::names::{CodeSystemStore, ParameterNameStore};

use super::backend::internal_error;

/// A shared `key -> id` table such as `PARAMETER_NAMES`.
struct IdTable {
    what: &'static str,
    select_id: &'static str,
    insert: &'static str,
    select_all: &'static str,
}

const PARAMETER_NAMES: IdTable = IdTable {
    what: "parameter name",
    select_id: "SELECT PARAMETER_NAME_ID FROM PARAMETER_NAMES WHERE PARAMETER_NAME = ?1",
    insert: "INSERT OR IGNORE INTO PARAMETER_NAMES (PARAMETER_NAME) VALUES (?1)",
    select_all: "SELECT PARAMETER_NAME, PARAMETER_NAME_ID FROM PARAMETER_NAMES",
};

const CODE_SYSTEMS: IdTable = IdTable {
    what: "code system",
    select_id: "SELECT CODE_SYSTEM_ID FROM CODE_SYSTEMS WHERE CODE_SYSTEM_NAME = ?1",
    insert: "INSERT OR IGNORE INTO CODE_SYSTEMS (CODE_SYSTEM_NAME) VALUES (?1)",
    select_all: "SELECT CODE_SYSTEM_NAME, CODE_SYSTEM_ID FROM CODE_SYSTEMS",
};

impl IdTable {
    fn read(&self, pool: &Pool<SqliteConnectionManager>, key: &str) -> StorageResult<Option<i64>> {
        let conn = pool.get()?;
        conn.query_row(self.select_id, [key], |row| row.get(0))
            .optional()
            .map_err(|e| internal_error(format!("Failed to read {} '{}': {}", self.what, key, e)))
    }

    fn read_or_add(&self, pool: &Pool<SqliteConnectionManager>, key: &str) -> StorageResult<i64> {
        let conn = pool.get()?;
        conn.execute(self.insert, params![key])
            .map_err(|e| internal_error(format!("Failed to add {} '{}': {}", self.what, key, e)))?;
        conn.query_row(self.select_id, [key], |row| row.get(0))
            .map_err(|e| internal_error(format!("Failed to read {} '{}': {}", self.what, key, e)))
    }

    fn read_all(&self, pool: &Pool<SqliteConnectionManager>) -> StorageResult<HashMap<String, i64>> {
        let conn = pool.get()?;
        let mut stmt = conn
            .prepare(self.select_all)
            .map_err(|e| internal_error(format!("Failed to prepare {} query: {}", self.what, e)))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| internal_error(format!("Failed to read {}s: {}", self.what, e)))?;
        rows.collect::<Result<HashMap<_, _>, _>>()
            .map_err(|e| internal_error(format!("Failed to read row: {}", e)))
    }
}

/// Reads and creates rows of `PARAMETER_NAMES`.
///
/// Holds its own handle to the backend's pool so a directory can own the
/// store without owning the backend.
#[derive(Clone)]
pub struct SqliteParameterNameStore {
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for SqliteParameterNameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteParameterNameStore").finish_non_exhaustive()
    }
}

impl SqliteParameterNameStore {
    pub(crate) fn new(pool: Pool<SqliteConnectionManager>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParameterNameStore for SqliteParameterNameStore {
    async fn read_parameter_name_id(&self, name: &str) -> StorageResult<Option<i64>> {
        PARAMETER_NAMES.read(&self.pool, name)
    }

    async fn read_or_add_parameter_name(&self, name: &str) -> StorageResult<i64> {
        PARAMETER_NAMES.read_or_add(&self.pool, name)
    }

    async fn read_all_parameter_names(&self) -> StorageResult<HashMap<String, i64>> {
        PARAMETER_NAMES.read_all(&self.pool)
    }
}

/// Reads and creates rows of `CODE_SYSTEMS`.
#[derive(Clone)]
pub struct SqliteCodeSystemStore {
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for SqliteCodeSystemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCodeSystemStore").finish_non_exhaustive()
    }
}

impl SqliteCodeSystemStore {
    pub(crate) fn new(pool: Pool<SqliteConnectionManager>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CodeSystemStore for SqliteCodeSystemStore {
    async fn read_code_system_id(&self, system: &str) -> StorageResult<Option<i64>> {
        CODE_SYSTEMS.read(&self.pool, system)
    }

    async fn read_or_add_code_system(&self, system: &str) -> StorageResult<i64> {
        CODE_SYSTEMS.read_or_add(&self.pool, system)
    }

    async fn read_all_code_systems(&self) -> StorageResult<HashMap<String, i64>> {
        CODE_SYSTEMS.read_all(&self.pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sqlite::SqliteBackend;
    use crate::types::ResourceTypeCatalog;

    fn backend() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema(&ResourceTypeCatalog::new()).unwrap();
        backend
    }

    #[tokio::test]
    async fn test_read_or_add_is_stable() {
        let backend = backend();
        let store = backend.parameter_name_store();

        assert_eq!(store.read_parameter_name_id("family").await.unwrap(), None);
        let id = store.read_or_add_parameter_name("family").await.unwrap();
        assert_eq!(store.read_or_add_parameter_name("family").await.unwrap(), id);
        assert_eq!(store.read_parameter_name_id("family").await.unwrap(), Some(id));

        let other = store.read_or_add_parameter_name("given").await.unwrap();
        assert_ne!(id, other);
        let all = store.read_all_parameter_names().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["given"], other);
    }

    #[tokio::test]
    async fn test_code_systems_are_separate_from_names() {
        let backend = backend();
        let names = backend.parameter_name_store();
        let systems = backend.code_system_store();

        assert_eq!(systems.read_code_system_id("http://loinc.org").await.unwrap(), None);
        let loinc = systems.read_or_add_code_system("http://loinc.org").await.unwrap();
        assert_eq!(systems.read_or_add_code_system("http://loinc.org").await.unwrap(), loinc);
        assert_eq!(systems.read_code_system_id("http://loinc.org").await.unwrap(), Some(loinc));

        let snomed = systems.read_or_add_code_system("http://snomed.info/sct").await.unwrap();
        assert_ne!(loinc, snomed);
        assert_eq!(systems.read_all_code_systems().await.unwrap().len(), 2);
        assert!(names.read_all_parameter_names().await.unwrap().is_empty());
    }
}
