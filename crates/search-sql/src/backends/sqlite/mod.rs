//! SQLite reference store.
//!
//! Holds the resource-type-partitioned search schema, executes compiled
//! queries and stores parameter names and code systems. `:memory:` databases
//! live on a single pooled connection; file databases use a regular pool in
//! WAL mode.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use helios_search_sql::backends::sqlite::SqliteBackend;
//! use helios_search_sql::names::{CodeSystemDirectory, ParameterNameDirectory};
//! use helios_search_sql::types::ResourceTypeCatalog;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = ResourceTypeCatalog::from_names(["Patient", "Organization"])?;
//!
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema(&catalog)?;
//!
//! let names = ParameterNameDirectory::new(Arc::new(backend.parameter_name_store()));
//! let code_systems = CodeSystemDirectory::new(Arc::new(backend.code_system_store()));
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE Patient_LOGICAL_RESOURCES (
//!     LOGICAL_RESOURCE_ID INTEGER PRIMARY KEY,
//!     LOGICAL_ID TEXT NOT NULL UNIQUE,
//!     CURRENT_RESOURCE_ID INTEGER
//! );
//!
//! CREATE TABLE Patient_RESOURCES (
//!     RESOURCE_ID INTEGER PRIMARY KEY,
//!     LOGICAL_RESOURCE_ID INTEGER NOT NULL,
//!     VERSION_ID INTEGER NOT NULL,
//!     LAST_UPDATED TEXT NOT NULL,
//!     IS_DELETED TEXT NOT NULL DEFAULT 'N',
//!     DATA BLOB NOT NULL
//! );
//!
//! -- plus Patient_{STR,TOKEN,DATE,NUMBER,QUANTITY}_VALUES
//! ```

mod backend;
mod executor;
mod ingest;
mod names;
mod schema;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use ingest::{IndexValue, IndexedResource, IndexedValue, IngestedVersion};
pub use names::{SqliteCodeSystemStore, SqliteParameterNameStore};
pub use schema::SCHEMA_VERSION;
