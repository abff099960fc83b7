//! SQLite search harness.

use std::path::Path;
use std::sync::Arc;

use helios_search_sql::backends::sqlite::{IndexedResource, IngestedVersion, SqliteBackend};
use helios_search_sql::config::{ReconcileMode, SearchSqlConfig, SqlDialect};
use helios_search_sql::names::{CodeSystemDirectory, ParameterNameDirectory};
use helios_search_sql::query::{SearchOutcome, SearchRequest, SearchRunner};
use helios_search_sql::{QueryContext, StorageResult};

/// Resource types every harness registers.
pub const RESOURCE_TYPES: [&str; 3] = ["Patient", "Organization", "Observation"];

/// A backend, directories over its stores, and a runner sharing them.
pub struct SearchHarness {
    pub backend: Arc<SqliteBackend>,
    pub names: Arc<ParameterNameDirectory>,
    pub code_systems: Arc<CodeSystemDirectory>,
    pub runner: SearchRunner,
}

impl SearchHarness {
    /// Creates a harness over a fresh in-memory database.
    pub fn in_memory() -> Self {
        let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
        Self::with_backend(backend, ReconcileMode::Eager)
    }

    /// Creates a harness over a database file, creating it if needed.
    pub fn open(path: &Path) -> Self {
        let backend = SqliteBackend::open(path).expect("Failed to open SQLite database");
        Self::with_backend(backend, ReconcileMode::Eager)
    }

    /// Creates a harness over `backend` with the given reconcile mode.
    pub fn with_backend(backend: SqliteBackend, mode: ReconcileMode) -> Self {
        let config = SearchSqlConfig::default()
            .with_dialect(SqlDialect::Sqlite)
            .with_reconcile_mode(mode)
            .with_resource_types(RESOURCE_TYPES);

        let catalog = config.catalog().expect("Failed to build catalog");
        backend
            .init_schema(&catalog)
            .expect("Failed to initialize schema");

        let backend = Arc::new(backend);
        let names = Arc::new(ParameterNameDirectory::with_config(
            Arc::new(backend.parameter_name_store()),
            &config,
        ));
        let code_systems = Arc::new(CodeSystemDirectory::with_config(
            Arc::new(backend.code_system_store()),
            &config,
        ));
        let ctx = QueryContext::new(config, names.clone(), code_systems.clone(), backend.clone())
            .expect("Failed to create query context");

        Self {
            backend,
            names,
            code_systems,
            runner: SearchRunner::new(ctx),
        }
    }

    /// The compilation context.
    pub fn ctx(&self) -> &QueryContext {
        self.runner.context()
    }

    /// Stores one resource version.
    pub async fn ingest(&self, resource: IndexedResource) -> IngestedVersion {
        self.backend
            .ingest(self.ctx(), &resource)
            .await
            .expect("Failed to ingest resource")
    }

    /// Stores several resource versions in order.
    pub async fn ingest_all(&self, resources: impl IntoIterator<Item = IndexedResource>) {
        for resource in resources {
            self.ingest(resource).await;
        }
    }

    /// Runs a search.
    pub async fn search(&self, request: &SearchRequest) -> StorageResult<SearchOutcome> {
        self.runner.search(request).await
    }
}

/// Returns the logical ids of the outcome's rows, in result order.
pub fn logical_ids(outcome: &SearchOutcome) -> Vec<String> {
    outcome.rows.iter().map(|r| r.logical_id.clone()).collect()
}

/// Returns `(resourceType, logical id)` of the outcome's rows, in result order.
pub fn typed_ids(outcome: &SearchOutcome) -> Vec<(String, String)> {
    outcome
        .rows
        .iter()
        .map(|r| {
            (
                r.resource_type().unwrap_or_default(),
                r.logical_id.clone(),
            )
        })
        .collect()
}
