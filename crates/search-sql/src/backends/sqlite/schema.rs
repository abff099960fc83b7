//! SQLite schema definitions.
//!
//! Shared tables are versioned through `schema_version`; per-type tables
//! are created for every type in the catalog and are safe to re-create, so
//! registering a new type only requires another `initialize_schema` call.

use rusqlite::Connection;
use tracing::info;

use crate::error::{BackendError, StorageError, StorageResult};
use crate::types::{ResourceTypeCatalog, ValueTable};

/// Current schema version of the shared tables.
pub const SCHEMA_VERSION: i32 = 1;

fn migration_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::Schema { message })
}

/// Initialize the database schema for every registered resource type.
pub fn initialize_schema(conn: &Connection, catalog: &ResourceTypeCatalog) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_shared_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    for resource_type in catalog.names() {
        create_resource_type_tables(conn, resource_type)?;
    }

    info!(
        "SQLite schema ready for {} resource types (version {})",
        catalog.len(),
        SCHEMA_VERSION
    );
    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| migration_error(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| migration_error(format!("Failed to clear schema_version: {}", e)))?;

    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| migration_error(format!("Failed to set schema_version: {}", e)))?;

    Ok(())
}

/// Tables shared by all resource types.
fn create_shared_tables(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        -- Search parameter names
        CREATE TABLE IF NOT EXISTS PARAMETER_NAMES (
            PARAMETER_NAME_ID INTEGER PRIMARY KEY AUTOINCREMENT,
            PARAMETER_NAME TEXT NOT NULL UNIQUE
        );

        -- Token and quantity code systems
        CREATE TABLE IF NOT EXISTS CODE_SYSTEMS (
            CODE_SYSTEM_ID INTEGER PRIMARY KEY AUTOINCREMENT,
            CODE_SYSTEM_NAME TEXT NOT NULL UNIQUE
        );

        -- Logical resource and version ids, unique across all types
        CREATE TABLE IF NOT EXISTS ID_SEQUENCE (
            ID INTEGER PRIMARY KEY AUTOINCREMENT
        );
        ",
    )
    .map_err(|e| migration_error(format!("Failed to create shared tables: {}", e)))
}

fn value_table_ddl(resource_type: &str, table: ValueTable) -> String {
    let name = table.table_name(resource_type);
    let columns = match table {
        ValueTable::Str => "STR_VALUE TEXT,\n            STR_VALUE_LCASE TEXT,",
        ValueTable::Token => "CODE_SYSTEM_ID INTEGER,\n            TOKEN_VALUE TEXT,",
        ValueTable::Date => "DATE_VALUE TEXT,\n            DATE_START TEXT,\n            DATE_END TEXT,",
        ValueTable::Number => "NUMBER_VALUE REAL,",
        ValueTable::Quantity => {
            "CODE TEXT,\n            QUANTITY_VALUE REAL,\n            QUANTITY_VALUE_LOW REAL,\n            QUANTITY_VALUE_HIGH REAL,\n            CODE_SYSTEM_ID INTEGER,"
        }
    };
    let lead = table.sort_columns()[0];
    format!(
        "
        CREATE TABLE IF NOT EXISTS {name} (
            PARAMETER_NAME_ID INTEGER NOT NULL,
            {columns}
            RESOURCE_ID INTEGER NOT NULL REFERENCES {rt}_RESOURCES(RESOURCE_ID)
        );
        CREATE INDEX IF NOT EXISTS IDX_{name}_RPS ON {name}(RESOURCE_ID, PARAMETER_NAME_ID);
        CREATE INDEX IF NOT EXISTS IDX_{name}_PSR ON {name}(PARAMETER_NAME_ID, {lead}, RESOURCE_ID);
        ",
        rt = resource_type,
    )
}

/// Tables owned by one resource type.
fn create_resource_type_tables(conn: &Connection, resource_type: &str) -> StorageResult<()> {
    let mut ddl = format!(
        "
        CREATE TABLE IF NOT EXISTS {rt}_LOGICAL_RESOURCES (
            LOGICAL_RESOURCE_ID INTEGER PRIMARY KEY,
            LOGICAL_ID TEXT NOT NULL UNIQUE,
            CURRENT_RESOURCE_ID INTEGER
        );

        CREATE TABLE IF NOT EXISTS {rt}_RESOURCES (
            RESOURCE_ID INTEGER PRIMARY KEY,
            LOGICAL_RESOURCE_ID INTEGER NOT NULL REFERENCES {rt}_LOGICAL_RESOURCES(LOGICAL_RESOURCE_ID),
            VERSION_ID INTEGER NOT NULL,
            LAST_UPDATED TEXT NOT NULL,
            IS_DELETED TEXT NOT NULL DEFAULT 'N' CHECK (IS_DELETED IN ('Y', 'N')),
            DATA BLOB NOT NULL,
            UNIQUE (LOGICAL_RESOURCE_ID, VERSION_ID)
        );
        CREATE INDEX IF NOT EXISTS IDX_{rt}_RESOURCES_LR ON {rt}_RESOURCES(LOGICAL_RESOURCE_ID);
        CREATE INDEX IF NOT EXISTS IDX_{rt}_RESOURCES_UPDATED ON {rt}_RESOURCES(LAST_UPDATED);
        ",
        rt = resource_type,
    );
    for table in ValueTable::ALL {
        ddl.push_str(&value_table_ddl(resource_type, table));
    }

    conn.execute_batch(&ddl).map_err(|e| {
        migration_error(format!(
            "Failed to create tables for {}: {}",
            resource_type, e
        ))
    })
}
