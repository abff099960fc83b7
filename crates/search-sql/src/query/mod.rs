//! Search-query compilation.
//!
//! A search request is compiled by exactly one aggregator:
//!
//! - [`BaseQueryAggregator`] - filters on one resource type, paged
//! - [`SortedQueryAggregator`] - base filters ordered by parameter values
//! - [`InclusionQueryAggregator`] - base matches plus `_include` and
//!   `_revinclude` branches combined with `UNION ALL`
//!
//! [`SearchRequest::aggregator`] picks the variant. Each aggregator yields a
//! data query and a count query as [`SqlQuery`] values whose `?`
//! placeholders line up with their binds.
//!
//! # Example
//!
//! ```ignore
//! let request = SearchRequest::new("Patient")
//!     .with_segment(ctx.parameter_segment("Patient", "family", SearchParamType::String,
//!         "P.STR_VALUE = ?", vec![SqlParam::string("Smith")]).await?)
//!     .with_sort(SortParameter::parse("-birthdate", SearchParamType::Date));
//!
//! let aggregator = request.aggregator(ctx.config());
//! let query = aggregator.build_query(&ctx).await?;
//! ```

mod base;
mod clause;
mod inclusion;
mod request;
mod runner;
mod sorted;
mod writer;

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::core::QueryContext;
use crate::error::StorageResult;
use crate::types::SqlQuery;

pub use base::{BaseQueryAggregator, ROW_SELECT};
pub use clause::{Join, JoinKind, OrderKey, Predicate, SelectStatement, Source, Statement};
pub use inclusion::InclusionQueryAggregator;
pub use request::SearchRequest;
pub use runner::{SearchOutcome, SearchRunner};
pub use sorted::SortedQueryAggregator;
pub use writer::{SqlWriter, count_placeholders, encode_literal};

/// The aggregator variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregatorKind {
    /// Unsorted, no inclusions.
    Base,
    /// Sorted by one or more parameters; the data query yields resource ids.
    Sorted,
    /// With `_include`/`_revinclude` branches.
    Inclusion,
}

impl fmt::Display for AggregatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregatorKind::Base => write!(f, "base"),
            AggregatorKind::Sorted => write!(f, "sorted"),
            AggregatorKind::Inclusion => write!(f, "inclusion"),
        }
    }
}

/// Compiles one search request into SQL.
///
/// Building never leaves partial output: either both text and binds are
/// returned, or an error.
#[async_trait]
pub trait QueryAggregator: Send + Sync + fmt::Debug {
    /// The variant.
    fn kind(&self) -> AggregatorKind;

    /// The searched resource type.
    fn resource_type(&self) -> &str;

    /// Builds the paged data query.
    async fn build_query(&self, ctx: &QueryContext) -> StorageResult<SqlQuery>;

    /// Builds the query counting all matches.
    async fn build_count_query(&self, ctx: &QueryContext) -> StorageResult<SqlQuery>;

    /// Builds the data and count queries together.
    ///
    /// Implementations with costly lookups share them between both queries.
    async fn build_queries(&self, ctx: &QueryContext) -> StorageResult<(SqlQuery, SqlQuery)> {
        let data = self.build_query(ctx).await?;
        let count = self.build_count_query(ctx).await?;
        Ok((data, count))
    }
}

pub(crate) fn log_compiled(kind: AggregatorKind, role: &str, query: &SqlQuery) {
    debug!(
        variant = %kind,
        role,
        sql_len = query.sql.len(),
        binds = query.binds.len(),
        "compiled search query"
    );
    trace!(sql = %query.sql, "compiled search query text");
}
