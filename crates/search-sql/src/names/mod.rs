//! Parameter-name and code-system directories.
//!
//! Search parameters and token code systems are stored under integer ids in
//! the value tables. This module resolves names and system URIs to those ids:
//!
//! - [`ParameterNameStore`], [`CodeSystemStore`] - durable key/id storage
//! - [`ParameterNameDirectory`], [`CodeSystemDirectory`] - shared caches in
//!   front of a store
//! - [`CandidateReconciler`] - background merge of staged ids
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use helios_search_sql::names::{InMemoryParameterNameStore, ParameterNameDirectory};
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(InMemoryParameterNameStore::with_names(["name", "birthdate"]));
//! let directory = ParameterNameDirectory::new(store);
//!
//! assert_eq!(directory.resolve("birthdate").await.unwrap(), 2);
//! assert_eq!(directory.resolve("not-a-param").await.unwrap(), directory.unknown_id());
//! # });
//! ```

mod cache;
mod code_system;
mod directory;
mod reconciler;
mod store;

pub use code_system::CodeSystemDirectory;
pub use directory::ParameterNameDirectory;
pub use reconciler::CandidateReconciler;
pub use store::{
    CodeSystemStore, InMemoryCodeSystemStore, InMemoryParameterNameStore, ParameterNameStore,
};

/// A directory whose staged candidates can be published on demand.
///
/// Implemented by both directories so one [`CandidateReconciler`] type
/// serves either.
pub trait Reconcile: Send + Sync + 'static {
    /// Publishes staged candidates, returning how many were merged.
    fn reconcile(&self) -> usize;
}
