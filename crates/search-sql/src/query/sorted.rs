//! Sorted query aggregation.

use async_trait::async_trait;

use crate::core::QueryContext;
use crate::error::{SearchError, StorageResult};
use crate::types::{SortParameter, SqlQuery, ValueTable};

use super::base::BaseQueryAggregator;
use super::clause::{Join, OrderKey, SelectStatement, Source};
use super::writer::SqlWriter;
use super::{AggregatorKind, QueryAggregator, log_compiled};

/// A sort key with its value table and parameter-name id resolved.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedSort<'a> {
    sort: &'a SortParameter,
    table: ValueTable,
    name_id: i64,
}

/// Orders base-query matches by one or more search parameter values.
///
/// Each key joins its value table with a LEFT OUTER JOIN so resources
/// without a value still match; the per-resource representative value is
/// `MIN` for ascending and `MAX` for descending keys, and missing values
/// sort last in either direction. The data query returns `RESOURCE_ID`
/// first, followed by the aggregated sort values.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedQueryAggregator {
    base: BaseQueryAggregator,
    sorts: Vec<SortParameter>,
}

impl SortedQueryAggregator {
    /// Creates a sorted aggregator. Key order is ORDER BY precedence.
    pub fn new(base: BaseQueryAggregator, sorts: Vec<SortParameter>) -> Self {
        Self { base, sorts }
    }

    /// The sort keys.
    pub fn sorts(&self) -> &[SortParameter] {
        &self.sorts
    }

    /// Maps every key to its value table, rejecting an empty key list.
    fn value_tables(&self) -> Result<Vec<ValueTable>, SearchError> {
        if self.sorts.is_empty() {
            return Err(SearchError::InvalidQuery {
                message: "sorted query requires at least one sort parameter".to_string(),
            });
        }
        self.sorts.iter().map(SortParameter::value_table).collect()
    }

    async fn resolve(&self, ctx: &QueryContext) -> StorageResult<Vec<ResolvedSort<'_>>> {
        let tables = self.value_tables()?;

        let mut resolved = Vec::with_capacity(self.sorts.len());
        for (sort, table) in self.sorts.iter().zip(tables) {
            let name_id = ctx.names().resolve(&sort.name).await?;
            resolved.push(ResolvedSort {
                sort,
                table,
                name_id,
            });
        }
        Ok(resolved)
    }

    fn assemble(&self, ctx: &QueryContext, resolved: &[ResolvedSort<'_>]) -> StorageResult<SqlQuery> {
        let tables = ctx.catalog().tables(self.base.resource_type_name())?;
        let mut select: SelectStatement = self.base.filtered(ctx.catalog(), ["R.RESOURCE_ID"])?;
        let mut order = Vec::new();

        for (i, key) in resolved.iter().enumerate() {
            let alias = format!("S{}", i + 1);
            select = select.join(Join::left_outer(
                Source::table(tables.values(key.table), alias.as_str()),
                format!(
                    "({alias}.PARAMETER_NAME_ID = {} AND {alias}.RESOURCE_ID = R.RESOURCE_ID)",
                    key.name_id
                ),
            ));
            for column in key.table.sort_columns() {
                let aggregate = format!("{}({alias}.{column})", key.sort.direction.aggregate());
                select.columns.push(aggregate.clone());
                order.push(OrderKey::nulls_last(aggregate, key.sort.direction));
            }
        }

        select.group_by.push("R.RESOURCE_ID".to_string());
        select.order_by = order;
        select = select.order_by(OrderKey::asc("R.RESOURCE_ID")).page(self.base.page());

        Ok(SqlWriter::write(ctx.config().dialect, &select.into())?)
    }
}

#[async_trait]
impl QueryAggregator for SortedQueryAggregator {
    fn kind(&self) -> AggregatorKind {
        AggregatorKind::Sorted
    }

    fn resource_type(&self) -> &str {
        self.base.resource_type_name()
    }

    async fn build_query(&self, ctx: &QueryContext) -> StorageResult<SqlQuery> {
        self.base.validate(ctx.config().max_page_size)?;
        let resolved = self.resolve(ctx).await?;
        let query = self.assemble(ctx, &resolved)?;
        log_compiled(self.kind(), "data", &query);
        Ok(query)
    }

    async fn build_count_query(&self, ctx: &QueryContext) -> StorageResult<SqlQuery> {
        self.value_tables()?;
        self.base.build_count_query(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::testing::{RecordingExecutor, test_context};
    use crate::error::StorageError;
    use crate::types::{QuerySegment, SearchParamType, SortDirection, SqlParam};

    fn ctx() -> QueryContext {
        test_context(Arc::new(RecordingExecutor::default()))
    }

    #[tokio::test]
    async fn test_single_string_key() {
        let aggregator = SortedQueryAggregator::new(
            BaseQueryAggregator::new("Patient"),
            vec![SortParameter::parse("name", SearchParamType::String)],
        );
        let query = aggregator.build_query(&ctx()).await.unwrap();

        assert!(query.sql.starts_with("SELECT R.RESOURCE_ID, MIN(S1.STR_VALUE) FROM Patient_RESOURCES R"));
        assert!(query.sql.contains(
            "LEFT OUTER JOIN Patient_STR_VALUES S1 ON (S1.PARAMETER_NAME_ID = 1 AND S1.RESOURCE_ID = R.RESOURCE_ID)"
        ));
        assert!(query.sql.contains(
            "GROUP BY R.RESOURCE_ID ORDER BY MIN(S1.STR_VALUE) ASC NULLS LAST, R.RESOURCE_ID ASC OFFSET 0"
        ));
    }

    #[tokio::test]
    async fn test_multi_key_with_token_and_descending_date() {
        let aggregator = SortedQueryAggregator::new(
            BaseQueryAggregator::new("Observation")
                .with_segment(QuerySegment::new("X = ?", vec![SqlParam::string("x")])),
            vec![
                SortParameter::parse("code", SearchParamType::Token),
                SortParameter::new("birthdate", SearchParamType::Date, SortDirection::Descending),
            ],
        );
        let query = aggregator.build_query(&ctx()).await.unwrap();

        assert!(query.sql.starts_with(
            "SELECT R.RESOURCE_ID, MIN(S1.CODE_SYSTEM_ID), MIN(S1.TOKEN_VALUE), MAX(S2.DATE_VALUE) FROM"
        ));
        assert!(query.sql.contains("LEFT OUTER JOIN Observation_TOKEN_VALUES S1 ON (S1.PARAMETER_NAME_ID = 5"));
        assert!(query.sql.contains("LEFT OUTER JOIN Observation_DATE_VALUES S2 ON (S2.PARAMETER_NAME_ID = 2"));
        assert!(query.sql.contains(
            "ORDER BY MIN(S1.CODE_SYSTEM_ID) ASC NULLS LAST, MIN(S1.TOKEN_VALUE) ASC NULLS LAST, \
             MAX(S2.DATE_VALUE) DESC NULLS LAST, R.RESOURCE_ID ASC"
        ));
        // Joins come before WHERE, so segment binds are the only binds.
        assert_eq!(query.binds, vec![SqlParam::string("x")]);
    }

    #[tokio::test]
    async fn test_unknown_sort_name_uses_sentinel() {
        let aggregator = SortedQueryAggregator::new(
            BaseQueryAggregator::new("Patient"),
            vec![SortParameter::parse("-nickname", SearchParamType::String)],
        );
        let query = aggregator.build_query(&ctx()).await.unwrap();
        assert!(query.sql.contains("S1.PARAMETER_NAME_ID = -1"));
    }

    #[tokio::test]
    async fn test_unsupported_and_empty_keys() {
        let ctx = ctx();
        let composite = SortedQueryAggregator::new(
            BaseQueryAggregator::new("Patient"),
            vec![SortParameter::parse("code-value", SearchParamType::Composite)],
        );
        assert!(matches!(
            composite.build_query(&ctx).await,
            Err(StorageError::Search(SearchError::UnsupportedSortType { .. }))
        ));

        let empty = SortedQueryAggregator::new(BaseQueryAggregator::new("Patient"), Vec::new());
        assert!(matches!(
            empty.build_query(&ctx).await,
            Err(StorageError::Search(SearchError::InvalidQuery { .. }))
        ));
    }

    #[tokio::test]
    async fn test_count_rejects_unsupported_and_empty_keys() {
        let executor = Arc::new(RecordingExecutor::default());
        let ctx = test_context(executor.clone());

        let empty = SortedQueryAggregator::new(BaseQueryAggregator::new("Patient"), Vec::new());
        assert!(matches!(
            empty.build_count_query(&ctx).await,
            Err(StorageError::Search(SearchError::InvalidQuery { .. }))
        ));

        let composite = SortedQueryAggregator::new(
            BaseQueryAggregator::new("Patient"),
            vec![
                SortParameter::parse("name", SearchParamType::String),
                SortParameter::parse("code-value", SearchParamType::Composite),
            ],
        );
        assert!(matches!(
            composite.build_count_query(&ctx).await,
            Err(StorageError::Search(SearchError::UnsupportedSortType { .. }))
        ));
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_count_is_base_count() {
        let base = BaseQueryAggregator::new("Patient")
            .with_segment(QuerySegment::new("X = ?", vec![SqlParam::string("x")]));
        let aggregator = SortedQueryAggregator::new(
            base.clone(),
            vec![SortParameter::parse("name", SearchParamType::String)],
        );
        let ctx = ctx();
        assert_eq!(
            aggregator.build_count_query(&ctx).await.unwrap(),
            base.build_count_query(&ctx).await.unwrap()
        );
    }
}
