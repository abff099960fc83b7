//! Per-process compilation context.

use std::sync::Arc;

use crate::config::SearchSqlConfig;
use crate::error::{SearchError, StorageResult};
use crate::names::{CodeSystemDirectory, ParameterNameDirectory};
use crate::types::{QuerySegment, ResourceTypeCatalog, SearchParamType, SqlParam};

use super::executor::QueryExecutor;

/// Everything an aggregator needs besides its own request inputs.
///
/// Cheap to clone; all members are shared.
#[derive(Clone)]
pub struct QueryContext {
    catalog: Arc<ResourceTypeCatalog>,
    names: Arc<ParameterNameDirectory>,
    code_systems: Arc<CodeSystemDirectory>,
    executor: Arc<dyn QueryExecutor>,
    config: Arc<SearchSqlConfig>,
}

impl QueryContext {
    /// Creates a context, building the catalog from `config.resource_types`.
    pub fn new(
        config: SearchSqlConfig,
        names: Arc<ParameterNameDirectory>,
        code_systems: Arc<CodeSystemDirectory>,
        executor: Arc<dyn QueryExecutor>,
    ) -> StorageResult<Self> {
        config.validate()?;
        let catalog = Arc::new(config.catalog()?);
        Ok(Self {
            catalog,
            names,
            code_systems,
            executor,
            config: Arc::new(config),
        })
    }

    /// The registered resource types.
    pub fn catalog(&self) -> &ResourceTypeCatalog {
        &self.catalog
    }

    /// The parameter-name directory.
    pub fn names(&self) -> &Arc<ParameterNameDirectory> {
        &self.names
    }

    /// The code-system directory.
    pub fn code_systems(&self) -> &Arc<CodeSystemDirectory> {
        &self.code_systems
    }

    /// The executor used for phase-1 lookups and by the runner.
    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.executor
    }

    /// The active configuration.
    pub fn config(&self) -> &SearchSqlConfig {
        &self.config
    }

    /// Builds a segment matching resources of `resource_type` that have a
    /// value for parameter `name` satisfying `value_predicate`.
    ///
    /// The name is resolved through the directory; unknown names produce a
    /// segment that matches nothing.
    pub async fn parameter_segment(
        &self,
        resource_type: &str,
        name: &str,
        param_type: SearchParamType,
        value_predicate: &str,
        binds: Vec<SqlParam>,
    ) -> StorageResult<QuerySegment> {
        let tables = self.catalog.tables(resource_type)?;
        let value_table =
            param_type
                .value_table()
                .ok_or_else(|| SearchError::UnsupportedParameterType {
                    param_type: param_type.to_string(),
                })?;
        let id = self.names.resolve(name).await?;
        Ok(QuerySegment::parameter_match(
            &tables.values(value_table),
            id,
            value_predicate,
            binds,
        ))
    }

    /// Builds a token segment for `[system|]code`.
    ///
    /// With a system the row must carry that system's id and the code; an
    /// unknown system resolves to the sentinel id and matches nothing.
    /// Without one the code matches under any system.
    pub async fn token_segment(
        &self,
        resource_type: &str,
        name: &str,
        system: Option<&str>,
        code: &str,
    ) -> StorageResult<QuerySegment> {
        let (predicate, binds) = match system {
            Some(system) => {
                let system_id = self.code_systems.resolve(system).await?;
                (
                    "P.CODE_SYSTEM_ID = ? AND P.TOKEN_VALUE = ?",
                    vec![SqlParam::integer(system_id), SqlParam::string(code)],
                )
            }
            None => ("P.TOKEN_VALUE = ?", vec![SqlParam::string(code)]),
        };
        self.parameter_segment(resource_type, name, SearchParamType::Token, predicate, binds)
            .await
    }
}

impl std::fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("catalog", &self.catalog)
            .field("names", &self.names)
            .field("code_systems", &self.code_systems)
            .field("executor", &self.executor.backend_name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::testing::{RecordingExecutor, test_context};

    #[tokio::test]
    async fn test_token_segment_with_system() {
        let ctx = test_context(Arc::new(RecordingExecutor::default()));
        let segment = ctx
            .token_segment("Observation", "code", Some("http://loinc.org"), "8867-4")
            .await
            .unwrap();

        assert!(segment.predicate().starts_with("EXISTS (SELECT 1 FROM Observation_TOKEN_VALUES P"));
        assert!(segment.predicate().contains("P.PARAMETER_NAME_ID = 5"));
        assert!(segment.predicate().contains("(P.CODE_SYSTEM_ID = ? AND P.TOKEN_VALUE = ?)"));
        assert_eq!(
            segment.binds(),
            &[SqlParam::integer(1), SqlParam::string("8867-4")]
        );
    }

    #[tokio::test]
    async fn test_token_segment_unknown_system_binds_sentinel() {
        let ctx = test_context(Arc::new(RecordingExecutor::default()));
        let segment = ctx
            .token_segment("Observation", "code", Some("http://example.org/codes"), "x")
            .await
            .unwrap();

        assert_eq!(segment.binds()[0], SqlParam::integer(ctx.code_systems().unknown_id()));
        assert_eq!(ctx.code_systems().cached_id("http://example.org/codes"), None);
    }

    #[tokio::test]
    async fn test_token_segment_without_system() {
        let ctx = test_context(Arc::new(RecordingExecutor::default()));
        let segment = ctx.token_segment("Observation", "code", None, "8867-4").await.unwrap();

        assert!(segment.predicate().contains("(P.TOKEN_VALUE = ?)"));
        assert!(!segment.predicate().contains("CODE_SYSTEM_ID"));
        assert_eq!(segment.binds(), &[SqlParam::string("8867-4")]);
    }

    #[tokio::test]
    async fn test_unregistered_type_is_rejected() {
        let ctx = test_context(Arc::new(RecordingExecutor::default()));
        assert!(ctx.token_segment("Device", "type", None, "x").await.is_err());
    }
}
