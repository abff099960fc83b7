//! Search request inputs and aggregator selection.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SearchSqlConfig;
use crate::types::{InclusionParameter, Page, QuerySegment, SortParameter};

use super::base::BaseQueryAggregator;
use super::inclusion::InclusionQueryAggregator;
use super::sorted::SortedQueryAggregator;
use super::QueryAggregator;

/// The resolved inputs of one search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The searched resource type.
    pub resource_type: String,
    /// Optional logical-id constraint (`_id`).
    #[serde(default)]
    pub logical_ids: Option<Vec<String>>,
    /// Last-updated constraints (`_lastUpdated`).
    #[serde(default)]
    pub last_updated: Vec<QuerySegment>,
    /// Search constraints, ANDed in order.
    #[serde(default)]
    pub segments: Vec<QuerySegment>,
    /// Sort keys in precedence order.
    #[serde(default)]
    pub sorts: Vec<SortParameter>,
    /// Inclusion directives.
    #[serde(default)]
    pub inclusions: Vec<InclusionParameter>,
    /// Page window; the configured default page when absent.
    #[serde(default)]
    pub page: Option<Page>,
}

impl SearchRequest {
    /// Creates a request for a resource type.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Default::default()
        }
    }

    /// Sets the logical-id constraint.
    pub fn with_logical_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.logical_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a last-updated constraint.
    pub fn with_last_updated(mut self, segment: QuerySegment) -> Self {
        self.last_updated.push(segment);
        self
    }

    /// Adds a search constraint.
    pub fn with_segment(mut self, segment: QuerySegment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Adds a sort key.
    pub fn with_sort(mut self, sort: SortParameter) -> Self {
        self.sorts.push(sort);
        self
    }

    /// Adds an inclusion directive.
    pub fn with_inclusion(mut self, inclusion: InclusionParameter) -> Self {
        self.inclusions.push(inclusion);
        self
    }

    /// Sets the page window.
    pub fn with_page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    fn base(&self, config: &SearchSqlConfig) -> BaseQueryAggregator {
        let mut base = BaseQueryAggregator::new(self.resource_type.clone())
            .with_segments(self.segments.clone())
            .with_page(
                self.page
                    .unwrap_or_else(|| Page::new(0, config.default_page_size)),
            );
        if let Some(ids) = &self.logical_ids {
            base = base.with_logical_ids(ids.iter().cloned());
        }
        for segment in &self.last_updated {
            base = base.with_last_updated(segment.clone());
        }
        base
    }

    /// Selects the aggregator for this request.
    ///
    /// Inclusion wins over sorting: when both are present the sort keys are
    /// ignored. Otherwise any sort key selects the sorted variant.
    pub fn aggregator(&self, config: &SearchSqlConfig) -> Box<dyn QueryAggregator> {
        let base = self.base(config);
        if !self.inclusions.is_empty() {
            if !self.sorts.is_empty() {
                debug!(
                    resource_type = %self.resource_type,
                    sorts = self.sorts.len(),
                    "ignoring sort parameters on inclusion search"
                );
            }
            Box::new(InclusionQueryAggregator::new(base, self.inclusions.clone()))
        } else if !self.sorts.is_empty() {
            Box::new(SortedQueryAggregator::new(base, self.sorts.clone()))
        } else {
            Box::new(base)
        }
    }
}
