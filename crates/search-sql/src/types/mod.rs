//! Core types for search compilation.
//!
//! This module provides the fundamental types used throughout the crate:
//!
//! - [`QuerySegment`], [`SqlParam`] - Predicate fragments and their bind values
//! - [`SqlQuery`] - A compiled statement
//! - [`SortParameter`], [`InclusionParameter`] - Sort keys and include directives
//! - [`SearchParamType`], [`ValueTable`] - Semantic types and their parameter tables
//! - [`ResourceTypeCatalog`] - Registered resource types and their tables
//! - [`Page`] - Offset pagination
//! - [`ResourceRow`] - Rows returned by data queries
//!
//! # Examples
//!
//! ```
//! use helios_search_sql::types::{
//!     InclusionParameter, QuerySegment, SearchParamType, SortParameter, SqlParam,
//! };
//!
//! let segment = QuerySegment::new("R.LAST_UPDATED >= ?", vec![SqlParam::string("2024-01-01")]);
//! let sort = SortParameter::parse("-birthdate", SearchParamType::Date);
//! let include = InclusionParameter::include("Patient", "organization", "Organization");
//!
//! assert_eq!(segment.binds().len(), 1);
//! assert_eq!(sort.name, "birthdate");
//! assert_eq!(include.selected_type(), "Organization");
//! ```

mod pagination;
mod resource_type;
mod row;
mod search_params;
mod segment;

pub use pagination::{DEFAULT_PAGE_SIZE, Page};

pub use resource_type::{ResourceTables, ResourceTypeCatalog};

pub use row::{ROW_COLUMNS, ResourceRow};

pub use search_params::{
    IncludeType, InclusionParameter, SearchParamType, SortDirection, SortParameter, ValueTable,
};

pub use segment::{QuerySegment, SqlParam, SqlQuery};
