//! Collaborator seams for compilation and execution.
//!
//! - [`QueryExecutor`] - runs compiled statements against a store
//! - [`QueryContext`] - catalog, directory, executor and configuration
//!   shared by every aggregator

mod context;
mod executor;
#[cfg(test)]
pub(crate) mod testing;

pub use context::QueryContext;
pub use executor::QueryExecutor;
