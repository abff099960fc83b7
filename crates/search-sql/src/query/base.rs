//! Base query aggregation: FROM/WHERE over one resource type.

use async_trait::async_trait;

use crate::core::QueryContext;
use crate::error::{SearchError, SearchResult, StorageResult};
use crate::types::{Page, QuerySegment, ResourceTables, ResourceTypeCatalog, SqlParam, SqlQuery};

use super::clause::{Join, Predicate, SelectStatement, Source};
use super::writer::SqlWriter;
use super::{AggregatorKind, QueryAggregator, log_compiled};

/// Row projection of a data query, qualified by the `R`/`LR` aliases.
pub const ROW_SELECT: [&str; 7] = [
    "R.RESOURCE_ID",
    "R.LOGICAL_RESOURCE_ID",
    "R.VERSION_ID",
    "R.LAST_UPDATED",
    "R.IS_DELETED",
    "R.DATA",
    "LR.LOGICAL_ID",
];

/// Selects current, non-deleted versions of one resource type.
///
/// `FROM {T}_RESOURCES R JOIN {T}_LOGICAL_RESOURCES LR ON ... WHERE R.IS_DELETED <> 'Y'`
pub(crate) fn current_versions<I, S>(tables: &ResourceTables<'_>, columns: I) -> SelectStatement
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    SelectStatement::new(columns, Source::table(tables.resources(), "R"))
        .join(Join::inner(
            Source::table(tables.logical_resources(), "LR"),
            "R.LOGICAL_RESOURCE_ID = LR.LOGICAL_RESOURCE_ID AND R.RESOURCE_ID = LR.CURRENT_RESOURCE_ID",
        ))
        .filter(Predicate::raw("R.IS_DELETED <> 'Y'"))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Compiles filters on a single resource type into a paged data query and
/// a count query.
///
/// WHERE conjuncts appear in a fixed order: the deletion filter, the
/// logical-id constraint, last-updated segments, then search segments. Binds
/// follow the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseQueryAggregator {
    resource_type: String,
    logical_ids: Option<Vec<String>>,
    last_updated: Vec<QuerySegment>,
    segments: Vec<QuerySegment>,
    page: Page,
}

impl BaseQueryAggregator {
    /// Creates an aggregator with no filters and the default page.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            logical_ids: None,
            last_updated: Vec::new(),
            segments: Vec::new(),
            page: Page::default(),
        }
    }

    /// Restricts results to the given logical ids.
    pub fn with_logical_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.logical_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a last-updated segment.
    pub fn with_last_updated(mut self, segment: QuerySegment) -> Self {
        self.last_updated.push(segment);
        self
    }

    /// Adds a search segment.
    pub fn with_segment(mut self, segment: QuerySegment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Replaces the search segments.
    pub fn with_segments(mut self, segments: Vec<QuerySegment>) -> Self {
        self.segments = segments;
        self
    }

    /// Sets the page window.
    pub fn with_page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    /// The page window.
    pub fn page(&self) -> Page {
        self.page
    }

    /// The search segments.
    pub fn segments(&self) -> &[QuerySegment] {
        &self.segments
    }

    pub(crate) fn resource_type_name(&self) -> &str {
        &self.resource_type
    }

    pub(crate) fn validate(&self, max_page_size: u32) -> SearchResult<()> {
        self.page.validate(max_page_size)?;
        if matches!(&self.logical_ids, Some(ids) if ids.is_empty()) {
            return Err(SearchError::InvalidQuery {
                message: "logical id constraint is empty".to_string(),
            });
        }
        Ok(())
    }

    /// Builds the filtered SELECT with the given projection and no page.
    pub(crate) fn filtered<I, S>(
        &self,
        catalog: &ResourceTypeCatalog,
        columns: I,
    ) -> StorageResult<SelectStatement>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tables = catalog.tables(&self.resource_type)?;
        let mut select = current_versions(&tables, columns);

        if let Some(ids) = &self.logical_ids {
            select = select.filter(Predicate::with_binds(
                "logical id constraint",
                format!("LR.LOGICAL_ID IN ({})", placeholders(ids.len())),
                ids.iter().cloned().map(SqlParam::String).collect(),
            ));
        }
        for (i, segment) in self.last_updated.iter().enumerate() {
            select = select.filter(Predicate::segment(format!("last-updated segment {}", i + 1), segment));
        }
        for (i, segment) in self.segments.iter().enumerate() {
            select = select.filter(Predicate::segment(format!("segment {}", i + 1), segment));
        }
        Ok(select)
    }

    pub(crate) fn data_statement(&self, catalog: &ResourceTypeCatalog) -> StorageResult<SelectStatement> {
        Ok(self.filtered(catalog, ROW_SELECT)?.page(self.page))
    }

    pub(crate) fn count_statement(&self, catalog: &ResourceTypeCatalog) -> StorageResult<SelectStatement> {
        self.filtered(catalog, ["COUNT(R.RESOURCE_ID)"])
    }

    /// Builds the row query that materialises version rows by resource id.
    ///
    /// Used after a sorted query has produced the ordered ids of a page.
    /// The rows come back in storage order.
    pub fn fetch_by_resource_ids(
        ctx: &QueryContext,
        resource_type: &str,
        resource_ids: &[i64],
    ) -> StorageResult<SqlQuery> {
        if resource_ids.is_empty() {
            return Err(SearchError::InvalidQuery {
                message: "no resource ids to fetch".to_string(),
            }
            .into());
        }
        let tables = ctx.catalog().tables(resource_type)?;
        let select = current_versions(&tables, ROW_SELECT).filter(Predicate::with_binds(
            "resource id constraint",
            format!("R.RESOURCE_ID IN ({})", placeholders(resource_ids.len())),
            resource_ids.iter().copied().map(SqlParam::Integer).collect(),
        ));
        Ok(SqlWriter::write(ctx.config().dialect, &select.into())?)
    }
}

#[async_trait]
impl QueryAggregator for BaseQueryAggregator {
    fn kind(&self) -> AggregatorKind {
        AggregatorKind::Base
    }

    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    async fn build_query(&self, ctx: &QueryContext) -> StorageResult<SqlQuery> {
        self.validate(ctx.config().max_page_size)?;
        let statement = self.data_statement(ctx.catalog())?;
        let query = SqlWriter::write(ctx.config().dialect, &statement.into())?;
        log_compiled(self.kind(), "data", &query);
        Ok(query)
    }

    async fn build_count_query(&self, ctx: &QueryContext) -> StorageResult<SqlQuery> {
        self.validate(ctx.config().max_page_size)?;
        let statement = self.count_statement(ctx.catalog())?;
        let query = SqlWriter::write(ctx.config().dialect, &statement.into())?;
        log_compiled(self.kind(), "count", &query);
        Ok(query)
    }
}
