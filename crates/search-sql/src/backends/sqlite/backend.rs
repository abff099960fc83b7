//! Connection pool and lifecycle of the SQLite reference store.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BackendError, ConfigError, StorageError, StorageResult};
use crate::types::ResourceTypeCatalog;

use super::names::{SqliteCodeSystemStore, SqliteParameterNameStore};
use super::schema;

pub(crate) const BACKEND_NAME: &str = "sqlite";

const MEMORY_PATH: &str = ":memory:";

pub(crate) fn internal_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: BACKEND_NAME.to_string(),
        message,
        source: None,
    })
}

fn connection_failed(e: r2d2::Error) -> StorageError {
    StorageError::Backend(BackendError::ConnectionFailed {
        backend_name: BACKEND_NAME.to_string(),
        message: e.to_string(),
    })
}

/// Pool and pragma settings of a [`SqliteBackend`].
///
/// Missing JSON fields take their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteBackendConfig {
    /// Largest number of pooled connections for file databases.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_idle_connections: u32,
    /// How long a checkout waits for a free connection, in milliseconds.
    pub checkout_timeout_ms: u64,
    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u32,
    /// Use write-ahead logging for file databases.
    pub write_ahead_log: bool,
    /// Enforce foreign keys on every connection.
    pub foreign_keys: bool,
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_idle_connections: 1,
            checkout_timeout_ms: 30_000,
            busy_timeout_ms: 5_000,
            write_ahead_log: true,
            foreign_keys: true,
        }
    }
}

impl SqliteBackendConfig {
    /// Checks pool sizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_connections".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.min_idle_connections > self.max_connections {
            return Err(ConfigError::InvalidValue {
                field: "min_idle_connections".to_string(),
                message: format!("must not exceed max_connections ({})", self.max_connections),
            });
        }
        Ok(())
    }

    fn checkout_timeout(&self) -> Duration {
        Duration::from_millis(self.checkout_timeout_ms)
    }

    fn busy_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.busy_timeout_ms))
    }
}

/// SQLite store holding the resource-type-partitioned search schema.
///
/// Cheap handles onto the same pool are handed out by
/// [`parameter_name_store`](Self::parameter_name_store) and
/// [`code_system_store`](Self::code_system_store).
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
}

impl fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("is_memory", &self.is_memory)
            .field("pool_size", &self.pool.state().connections)
            .field("config", &self.config)
            .finish()
    }
}

impl SqliteBackend {
    /// Creates a private in-memory database.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(MEMORY_PATH, SqliteBackendConfig::default())
    }

    /// Opens or creates a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Opens a database with explicit pool settings.
    ///
    /// The path `:memory:` creates a private in-memory database. Such a
    /// database lives as long as its single pooled connection, so that pool
    /// never grows, expires or idles out its connection.
    pub fn with_config<P: AsRef<Path>>(path: P, config: SqliteBackendConfig) -> StorageResult<Self> {
        config.validate()?;
        let is_memory = path.as_ref().as_os_str() == MEMORY_PATH;

        let busy_timeout = config.busy_timeout();
        let foreign_keys = config.foreign_keys;
        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path.as_ref())
        }
        .with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            }
            Ok(())
        });

        let builder = Pool::builder().connection_timeout(config.checkout_timeout());
        let builder = if is_memory {
            builder
                .max_size(1)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            builder
                .max_size(config.max_connections)
                .min_idle(Some(config.min_idle_connections))
        };
        let pool = builder.build(manager).map_err(connection_failed)?;

        let backend = Self {
            pool,
            config,
            is_memory,
        };
        backend.apply_database_settings()?;

        debug!(
            path = %path.as_ref().display(),
            is_memory,
            "opened SQLite search store"
        );
        Ok(backend)
    }

    /// Creates shared tables and the tables of every type in `catalog`.
    ///
    /// Safe to call again after registering more types.
    pub fn init_schema(&self, catalog: &ResourceTypeCatalog) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn, catalog)
    }

    /// Checks a connection out of the pool.
    ///
    /// In-memory backends have exactly one connection: callers must drop it
    /// before anything else checks one out.
    pub(crate) fn get_connection(&self) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Settings stored in the database file rather than per connection.
    fn apply_database_settings(&self) -> StorageResult<()> {
        if self.is_memory || !self.config.write_ahead_log {
            return Ok(());
        }
        let conn = self.get_connection()?;
        let mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| internal_error(format!("Failed to enable WAL mode: {}", e)))?;
        debug!(journal_mode = %mode, "SQLite journal mode set");
        Ok(())
    }

    /// Returns a parameter-name store sharing this backend's pool.
    pub fn parameter_name_store(&self) -> SqliteParameterNameStore {
        SqliteParameterNameStore::new(self.pool.clone())
    }

    /// Returns a code-system store sharing this backend's pool.
    pub fn code_system_store(&self) -> SqliteCodeSystemStore {
        SqliteCodeSystemStore::new(self.pool.clone())
    }

    /// Whether the database lives in memory.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// The pool and pragma settings.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_pool_shares_one_database() {
        let backend = SqliteBackend::in_memory().unwrap();
        let catalog = ResourceTypeCatalog::from_names(["Patient"]).unwrap();
        backend.init_schema(&catalog).unwrap();

        // A fresh checkout must see the tables created above.
        let conn = backend.get_connection().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM Patient_RESOURCES", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert!(backend.is_memory());
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: SqliteBackendConfig = serde_json::from_str(r#"{"max_connections": 4}"#).unwrap();
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(config.write_ahead_log);
    }

    #[test]
    fn test_invalid_pool_sizes_are_rejected() {
        let config = SqliteBackendConfig {
            max_connections: 2,
            min_idle_connections: 3,
            ..Default::default()
        };
        assert!(matches!(
            SqliteBackend::with_config(MEMORY_PATH, config),
            Err(StorageError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_file_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::open(dir.path().join("wal.db")).unwrap();
        assert!(!backend.is_memory());

        let conn = backend.get_connection().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
