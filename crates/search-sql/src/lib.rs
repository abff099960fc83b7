//! Helios FHIR Server Search-to-SQL Compiler
//!
//! This crate turns resolved FHIR search requests into parameterized SQL
//! against a resource-type-partitioned, attribute-indexed schema. Each
//! generated statement keeps an exact left-to-right correspondence between
//! its `?` placeholders and its bind values.
//!
//! # Features
//!
//! - **Three query shapes**: plain filtered search, multi-key sort with
//!   nulls last, and `_include`/`_revinclude` expansion via `UNION ALL`
//! - **Name directories**: process-wide caches of parameter-name and
//!   code-system ids with staged candidates and background reconciliation
//! - **Two dialects**: standard `OFFSET ... FETCH NEXT` and SQLite `LIMIT`
//! - **SQLite reference store** (feature `sqlite`, default): schema, write
//!   path and query execution
//!
//! # Architecture
//!
//! - [`types`] - Segments, sort and inclusion parameters, resource types, rows
//! - [`names`] - Parameter-name and code-system directories and stores
//! - [`query`] - Aggregators, clause objects, SQL writer, request and runner
//! - [`core`] - Executor trait and compilation context
//! - [`config`] - Settings loaded from JSON
//! - [`error`] - Error types for all operations
//! - [`backends`] - Backend implementations
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use helios_search_sql::backends::sqlite::{IndexedResource, SqliteBackend};
//! use helios_search_sql::config::{SearchSqlConfig, SqlDialect};
//! use helios_search_sql::core::QueryContext;
//! use helios_search_sql::names::{CodeSystemDirectory, ParameterNameDirectory};
//! use helios_search_sql::query::{SearchRequest, SearchRunner};
//! use helios_search_sql::types::{SearchParamType, SortParameter};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SearchSqlConfig::default()
//!     .with_dialect(SqlDialect::Sqlite)
//!     .with_resource_types(["Patient"]);
//!
//! let backend = Arc::new(SqliteBackend::in_memory()?);
//! backend.init_schema(&config.catalog()?)?;
//!
//! let names = Arc::new(ParameterNameDirectory::with_config(
//!     Arc::new(backend.parameter_name_store()),
//!     &config,
//! ));
//! let code_systems = Arc::new(CodeSystemDirectory::with_config(
//!     Arc::new(backend.code_system_store()),
//!     &config,
//! ));
//! let ctx = QueryContext::new(config, names, code_systems, backend.clone())?;
//!
//! backend
//!     .ingest(
//!         &ctx,
//!         &IndexedResource::new("Patient", "p1", json!({"resourceType": "Patient"}))
//!             .string("family", "Smith"),
//!     )
//!     .await?;
//!
//! let request = SearchRequest::new("Patient")
//!     .with_sort(SortParameter::parse("family", SearchParamType::String));
//! let outcome = SearchRunner::new(ctx).search(&request).await?;
//! assert_eq!(outcome.total, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod core;
pub mod error;
pub mod names;
pub mod query;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{ReconcileMode, SearchSqlConfig, SqlDialect};
pub use error::{StorageError, StorageResult};
pub use types::{QuerySegment, SqlParam, SqlQuery};

// Re-export core traits
pub use crate::core::{QueryContext, QueryExecutor};
pub use names::{CodeSystemDirectory, CodeSystemStore, ParameterNameDirectory, ParameterNameStore};
pub use query::{QueryAggregator, SearchRequest, SearchRunner};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
