//! Compiles and executes searches end to end.

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::core::QueryContext;
use crate::error::StorageResult;
use crate::types::ResourceRow;

use super::base::BaseQueryAggregator;
use super::request::SearchRequest;
use super::AggregatorKind;

/// Result of an executed search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// The rows of the requested page, in result order.
    pub rows: Vec<ResourceRow>,
    /// Number of matches across all pages.
    pub total: u64,
}

/// Runs search requests through the context's executor.
#[derive(Debug, Clone)]
pub struct SearchRunner {
    ctx: QueryContext,
}

impl SearchRunner {
    /// Creates a runner.
    pub fn new(ctx: QueryContext) -> Self {
        Self { ctx }
    }

    /// The compilation context.
    pub fn context(&self) -> &QueryContext {
        &self.ctx
    }

    /// Compiles and executes a search.
    ///
    /// Sorted searches run in two steps: the sorted query yields the ordered
    /// resource ids of the page, then the rows are fetched by id and put back
    /// in that order.
    #[instrument(skip(self, request), fields(resource_type = %request.resource_type))]
    pub async fn search(&self, request: &SearchRequest) -> StorageResult<SearchOutcome> {
        let aggregator = request.aggregator(self.ctx.config());
        let (data, count) = aggregator.build_queries(&self.ctx).await?;
        let executor = self.ctx.executor();

        let total = executor.count(&count).await?;
        let rows = match aggregator.kind() {
            AggregatorKind::Sorted => {
                let ids = executor.search_resource_ids(&data).await?;
                if ids.is_empty() {
                    Vec::new()
                } else {
                    let fetch = BaseQueryAggregator::fetch_by_resource_ids(
                        &self.ctx,
                        aggregator.resource_type(),
                        &ids,
                    )?;
                    let rows = executor.search_rows(&fetch).await?;
                    order_by_ids(&ids, rows)
                }
            }
            AggregatorKind::Base | AggregatorKind::Inclusion => executor.search_rows(&data).await?,
        };

        debug!(
            variant = %aggregator.kind(),
            rows = rows.len(),
            total,
            "search executed"
        );
        Ok(SearchOutcome { rows, total })
    }
}

/// Reorders rows to follow `ids`. Rows whose id is not listed go last.
fn order_by_ids(ids: &[i64], mut rows: Vec<ResourceRow>) -> Vec<ResourceRow> {
    let position: HashMap<i64, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    rows.sort_by_key(|row| position.get(&row.resource_id).copied().unwrap_or(usize::MAX));
    rows
}
