//! Inclusion query aggregation (`_include` / `_revinclude`).
//!
//! Compilation runs in two phases. Phase 1 resolves parameter-name ids and,
//! for every forward include, executes a lookup of the reference values
//! held by the primary matches. Phase 2 is synchronous and assembles the
//! combined statement from those results:
//!
//! ```text
//! SELECT <cols> FROM (
//!     SELECT <cols> FROM (<primary> ORDER BY R.LOGICAL_RESOURCE_ID ASC) RESULT
//!     UNION ALL <include branch> ...
//!     UNION ALL <revinclude branch> ...
//! ) COMBINED_RESULTS ORDER BY LOGICAL_RESOURCE_ID ASC, RESOURCE_ID ASC <page>
//! ```

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::debug;

use crate::core::QueryContext;
use crate::error::{SearchError, StorageResult};
use crate::types::{IncludeType, InclusionParameter, ROW_COLUMNS, SqlQuery, ValueTable};

use super::base::{BaseQueryAggregator, ROW_SELECT, current_versions};
use super::clause::{Join, OrderKey, Predicate, SelectStatement, Source, Statement};
use super::writer::{SqlWriter, encode_literal};
use super::{AggregatorKind, QueryAggregator, log_compiled};

/// The phase-1 result for one inclusion parameter.
#[derive(Debug, Clone, PartialEq)]
enum Branch {
    Include {
        target_type: String,
        /// Encoded, sorted `'{Target}/{id}'` literals.
        literals: Vec<String>,
    },
    Revinclude {
        join_type: String,
        name_id: i64,
    },
}

/// Turns looked-up reference values into SQL literals for an include branch.
///
/// Keeps values pointing at `target_type`, deduplicates and sorts them.
fn include_literals(target_type: &str, values: Vec<String>) -> Vec<String> {
    let prefix = format!("{}/", target_type);
    values
        .into_iter()
        .filter(|v| v.starts_with(&prefix) && v.len() > prefix.len())
        .collect::<BTreeSet<_>>()
        .iter()
        .map(|v| encode_literal(v))
        .collect()
}

/// Expands base-query matches with referenced and referencing resources.
///
/// Sorting is not applied to inclusion searches; the combined rows are
/// ordered by logical resource id and paged once at the outermost level.
#[derive(Debug, Clone, PartialEq)]
pub struct InclusionQueryAggregator {
    base: BaseQueryAggregator,
    inclusions: Vec<InclusionParameter>,
}

impl InclusionQueryAggregator {
    /// Creates an inclusion aggregator.
    pub fn new(base: BaseQueryAggregator, inclusions: Vec<InclusionParameter>) -> Self {
        Self { base, inclusions }
    }

    /// The inclusion parameters.
    pub fn inclusions(&self) -> &[InclusionParameter] {
        &self.inclusions
    }

    /// `SELECT DISTINCT P1.STR_VALUE ... ` over the primary matches.
    fn include_lookup(&self, ctx: &QueryContext, name_id: i64) -> StorageResult<SqlQuery> {
        let primary = ctx.catalog().tables(self.base.resource_type_name())?;
        let matches = self.base.filtered(ctx.catalog(), ["R.RESOURCE_ID"])?;
        let lookup = SelectStatement::new(
            ["P1.STR_VALUE"],
            Source::table(primary.values(ValueTable::Str), "P1"),
        )
        .distinct()
        .filter(Predicate::raw(format!("P1.PARAMETER_NAME_ID = {}", name_id)))
        .filter(Predicate::in_subquery("P1.RESOURCE_ID", matches));
        Ok(SqlWriter::write(ctx.config().dialect, &lookup.into())?)
    }

    async fn prepare(&self, ctx: &QueryContext) -> StorageResult<Vec<Branch>> {
        self.base.validate(ctx.config().max_page_size)?;
        let primary_type = self.base.resource_type_name();
        ctx.catalog().tables(primary_type)?;

        let mut branches = Vec::with_capacity(self.inclusions.len());
        for inclusion in &self.inclusions {
            match inclusion.include_type {
                IncludeType::Include => {
                    if inclusion.source_type != primary_type {
                        return Err(SearchError::InvalidQuery {
                            message: format!(
                                "_include source type '{}' does not match searched type '{}'",
                                inclusion.source_type, primary_type
                            ),
                        }
                        .into());
                    }
                    ctx.catalog().tables(&inclusion.target_type)?;
                    let name_id = ctx.names().resolve(&inclusion.search_param).await?;
                    let lookup = self.include_lookup(ctx, name_id)?;
                    let values = ctx.executor().search_string_values(&lookup).await?;
                    let literals = include_literals(&inclusion.target_type, values);
                    debug!(
                        parameter = %inclusion.search_param,
                        target = %inclusion.target_type,
                        references = literals.len(),
                        "resolved include references"
                    );
                    branches.push(Branch::Include {
                        target_type: inclusion.target_type.clone(),
                        literals,
                    });
                }
                IncludeType::Revinclude => {
                    if inclusion.target_type != primary_type {
                        return Err(SearchError::InvalidQuery {
                            message: format!(
                                "_revinclude target type '{}' does not match searched type '{}'",
                                inclusion.target_type, primary_type
                            ),
                        }
                        .into());
                    }
                    let join_type = inclusion.selected_type().to_string();
                    ctx.catalog().tables(&join_type)?;
                    let name_id = ctx.names().resolve(&inclusion.search_param).await?;
                    branches.push(Branch::Revinclude { join_type, name_id });
                }
            }
        }
        Ok(branches)
    }

    fn branch_statement(&self, ctx: &QueryContext, branch: &Branch) -> StorageResult<Statement> {
        let catalog = ctx.catalog();
        let select = match branch {
            Branch::Include {
                target_type,
                literals,
            } => {
                let tables = catalog.tables(target_type)?;
                let list = if literals.is_empty() {
                    "''".to_string()
                } else {
                    literals.join(", ")
                };
                current_versions(&tables, ROW_SELECT).filter(Predicate::raw(format!(
                    "('{}/' || LR.LOGICAL_ID) IN ({})",
                    target_type, list
                )))
            }
            Branch::Revinclude { join_type, name_id } => {
                let tables = catalog.tables(join_type)?;
                let primary_type = self.base.resource_type_name();
                let referenced = self
                    .base
                    .filtered(catalog, [format!("'{}/' || LR.LOGICAL_ID", primary_type)])?;
                current_versions(&tables, ROW_SELECT)
                    .join(Join::inner(
                        Source::table(tables.values(ValueTable::Str), "P1"),
                        "P1.RESOURCE_ID = R.RESOURCE_ID",
                    ))
                    .filter(Predicate::raw(format!("P1.PARAMETER_NAME_ID = {}", name_id)))
                    .filter(Predicate::in_subquery("P1.STR_VALUE", referenced))
            }
        };
        Ok(select.into())
    }

    fn assemble(&self, ctx: &QueryContext, branches: &[Branch], count: bool) -> StorageResult<SqlQuery> {
        let primary_inner = self
            .base
            .filtered(ctx.catalog(), ROW_SELECT)?
            .order_by(OrderKey::asc("R.LOGICAL_RESOURCE_ID"));
        let primary = SelectStatement::new(ROW_COLUMNS, Source::subquery(primary_inner, "RESULT"));

        let mut union = Vec::with_capacity(branches.len() + 1);
        union.push(Statement::from(primary));
        for branch in branches {
            union.push(self.branch_statement(ctx, branch)?);
        }
        let combined = Source::subquery(Statement::UnionAll(union), "COMBINED_RESULTS");

        let outer = if count {
            SelectStatement::new(["COUNT(RESOURCE_ID)"], combined)
        } else {
            SelectStatement::new(ROW_COLUMNS, combined)
                .order_by(OrderKey::asc("LOGICAL_RESOURCE_ID"))
                .order_by(OrderKey::asc("RESOURCE_ID"))
                .page(self.base.page())
        };
        Ok(SqlWriter::write(ctx.config().dialect, &outer.into())?)
    }
}

#[async_trait]
impl QueryAggregator for InclusionQueryAggregator {
    fn kind(&self) -> AggregatorKind {
        AggregatorKind::Inclusion
    }

    fn resource_type(&self) -> &str {
        self.base.resource_type_name()
    }

    async fn build_query(&self, ctx: &QueryContext) -> StorageResult<SqlQuery> {
        let branches = self.prepare(ctx).await?;
        let query = self.assemble(ctx, &branches, false)?;
        log_compiled(self.kind(), "data", &query);
        Ok(query)
    }

    async fn build_count_query(&self, ctx: &QueryContext) -> StorageResult<SqlQuery> {
        let branches = self.prepare(ctx).await?;
        let query = self.assemble(ctx, &branches, true)?;
        log_compiled(self.kind(), "count", &query);
        Ok(query)
    }

    async fn build_queries(&self, ctx: &QueryContext) -> StorageResult<(SqlQuery, SqlQuery)> {
        let branches = self.prepare(ctx).await?;
        let data = self.assemble(ctx, &branches, false)?;
        let count = self.assemble(ctx, &branches, true)?;
        log_compiled(self.kind(), "data", &data);
        log_compiled(self.kind(), "count", &count);
        Ok((data, count))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SqlDialect;
    use crate::core::testing::{RecordingExecutor, test_context};
    use crate::error::{ConfigError, StorageError};
    use crate::query::writer::count_placeholders;
    use crate::types::{Page, QuerySegment, SqlParam};

    fn family_segment() -> QuerySegment {
        QuerySegment::new("LR.LOGICAL_ID <> ?", vec![SqlParam::string("x")])
    }

    #[test]
    fn test_include_literals() {
        let literals = include_literals(
            "Organization",
            vec![
                "Organization/o2".to_string(),
                "Practitioner/d1".to_string(),
                "Organization/o1".to_string(),
                "Organization/o2".to_string(),
                "Organization/".to_string(),
                "Organization/o'3".to_string(),
            ],
        );
        assert_eq!(
            literals,
            vec!["'Organization/o''3'", "'Organization/o1'", "'Organization/o2'"]
        );
    }

    #[tokio::test]
    async fn test_include_query_shape() {
        let executor = Arc::new(RecordingExecutor::with_strings([
            "Organization/o2",
            "Organization/o1",
        ]));
        let ctx = test_context(executor.clone());
        let aggregator = InclusionQueryAggregator::new(
            BaseQueryAggregator::new("Patient").with_segment(family_segment()),
            vec![InclusionParameter::include("Patient", "organization", "Organization")],
        );

        let query = aggregator.build_query(&ctx).await.unwrap();

        // Phase 1 ran one lookup over the primary matches.
        let executed = executor.executed();
        assert_eq!(executed.len(), 1);
        assert!(executed[0].sql.starts_with(
            "SELECT DISTINCT P1.STR_VALUE FROM Patient_STR_VALUES P1 \
             WHERE (P1.PARAMETER_NAME_ID = 3) AND (P1.RESOURCE_ID IN (SELECT R.RESOURCE_ID FROM Patient_RESOURCES R"
        ));
        assert_eq!(executed[0].binds, vec![SqlParam::string("x")]);

        assert!(query.sql.starts_with(
            "SELECT RESOURCE_ID, LOGICAL_RESOURCE_ID, VERSION_ID, LAST_UPDATED, IS_DELETED, DATA, LOGICAL_ID \
             FROM (SELECT RESOURCE_ID, LOGICAL_RESOURCE_ID, VERSION_ID, LAST_UPDATED, IS_DELETED, DATA, LOGICAL_ID \
             FROM (SELECT R.RESOURCE_ID"
        ));
        assert!(query.sql.contains("ORDER BY R.LOGICAL_RESOURCE_ID ASC) RESULT UNION ALL SELECT R.RESOURCE_ID"));
        assert!(query.sql.contains("FROM Organization_RESOURCES R JOIN Organization_LOGICAL_RESOURCES LR"));
        assert!(query.sql.contains(
            "(('Organization/' || LR.LOGICAL_ID) IN ('Organization/o1', 'Organization/o2'))"
        ));
        assert!(query.sql.ends_with(
            ") COMBINED_RESULTS ORDER BY LOGICAL_RESOURCE_ID ASC, RESOURCE_ID ASC \
             OFFSET 0 ROWS FETCH NEXT 20 ROWS ONLY"
        ));
        assert_eq!(query.binds, vec![SqlParam::string("x")]);
    }

    #[tokio::test]
    async fn test_include_without_references_matches_nothing() {
        let ctx = test_context(Arc::new(RecordingExecutor::default()));
        let aggregator = InclusionQueryAggregator::new(
            BaseQueryAggregator::new("Patient"),
            vec![InclusionParameter::include("Patient", "organization", "Organization")],
        );
        let query = aggregator.build_query(&ctx).await.unwrap();
        assert!(query.sql.contains("(('Organization/' || LR.LOGICAL_ID) IN (''))"));
    }

    #[tokio::test]
    async fn test_revinclude_reappends_primary_binds() {
        let executor = Arc::new(RecordingExecutor::default());
        let ctx = test_context(executor.clone());
        let aggregator = InclusionQueryAggregator::new(
            BaseQueryAggregator::new("Patient")
                .with_logical_ids(["p1", "p2"])
                .with_segment(family_segment()),
            vec![InclusionParameter::revinclude("Observation", "subject", "Patient")],
        );

        let query = aggregator.build_query(&ctx).await.unwrap();

        assert!(executor.executed().is_empty());
        assert!(query.sql.contains(
            "FROM Observation_RESOURCES R JOIN Observation_LOGICAL_RESOURCES LR \
             ON R.LOGICAL_RESOURCE_ID = LR.LOGICAL_RESOURCE_ID AND R.RESOURCE_ID = LR.CURRENT_RESOURCE_ID \
             JOIN Observation_STR_VALUES P1 ON P1.RESOURCE_ID = R.RESOURCE_ID \
             WHERE (R.IS_DELETED <> 'Y') AND (P1.PARAMETER_NAME_ID = 4) \
             AND (P1.STR_VALUE IN (SELECT 'Patient/' || LR.LOGICAL_ID FROM Patient_RESOURCES R"
        ));
        let primary = vec![
            SqlParam::string("p1"),
            SqlParam::string("p2"),
            SqlParam::string("x"),
        ];
        let expected: Vec<_> = primary.iter().chain(primary.iter()).cloned().collect();
        assert_eq!(query.binds, expected);
        assert_eq!(count_placeholders(&query.sql), query.binds.len());
    }

    #[tokio::test]
    async fn test_count_query_has_no_page() {
        let ctx = test_context(Arc::new(RecordingExecutor::with_strings(["Organization/o1"])));
        let aggregator = InclusionQueryAggregator::new(
            BaseQueryAggregator::new("Patient").with_page(Page::new(10, 5)),
            vec![
                InclusionParameter::include("Patient", "organization", "Organization"),
                InclusionParameter::revinclude("Observation", "subject", "Patient"),
            ],
        );
        let (data, count) = aggregator.build_queries(&ctx).await.unwrap();

        assert!(count.sql.starts_with("SELECT COUNT(RESOURCE_ID) FROM (SELECT RESOURCE_ID"));
        assert!(count.sql.ends_with(") COMBINED_RESULTS"));
        assert_eq!(count.binds, data.binds);
        assert_eq!(data.sql.matches(" UNION ALL ").count(), 2);
        assert_eq!(data.sql.matches("FETCH NEXT").count(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_dialect_pages_outermost() {
        let executor = Arc::new(RecordingExecutor::default());
        let mut ctx = test_context(executor);
        ctx = QueryContext::new(
            ctx.config().clone().with_dialect(SqlDialect::Sqlite),
            ctx.names().clone(),
            ctx.code_systems().clone(),
            ctx.executor().clone(),
        )
        .unwrap();
        let aggregator = InclusionQueryAggregator::new(
            BaseQueryAggregator::new("Patient").with_page(Page::new(0, 3)),
            vec![InclusionParameter::revinclude("Observation", "subject", "Patient")],
        );
        let query = aggregator.build_query(&ctx).await.unwrap();
        assert!(query.sql.ends_with("RESOURCE_ID ASC LIMIT 3 OFFSET 0"));
        assert_eq!(query.sql.matches("LIMIT").count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_directives() {
        let ctx = test_context(Arc::new(RecordingExecutor::default()));

        let wrong_source = InclusionQueryAggregator::new(
            BaseQueryAggregator::new("Patient"),
            vec![InclusionParameter::include("Observation", "subject", "Patient")],
        );
        assert!(matches!(
            wrong_source.build_query(&ctx).await,
            Err(StorageError::Search(SearchError::InvalidQuery { .. }))
        ));

        let unregistered = InclusionQueryAggregator::new(
            BaseQueryAggregator::new("Patient"),
            vec![InclusionParameter::revinclude("Encounter", "subject", "Patient")],
        );
        assert!(matches!(
            unregistered.build_query(&ctx).await,
            Err(StorageError::Config(ConfigError::UnregisteredResourceType { .. }))
        ));
    }

    #[tokio::test]
    async fn test_compiling_twice_is_identical() {
        let ctx = test_context(Arc::new(RecordingExecutor::with_strings(["Organization/o1"])));
        let aggregator = InclusionQueryAggregator::new(
            BaseQueryAggregator::new("Patient").with_segment(family_segment()),
            vec![InclusionParameter::include("Patient", "organization", "Organization")],
        );
        assert_eq!(
            aggregator.build_query(&ctx).await.unwrap(),
            aggregator.build_query(&ctx).await.unwrap()
        );
    }
}
