//! Process-wide cache of code-system ids.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::SearchSqlConfig;
use crate::error::StorageResult;

use super::Reconcile;
use super::cache::IdCache;
use super::store::CodeSystemStore;

/// Maps code-system URIs to the ids stored in CODE_SYSTEM_ID columns.
///
/// Same lookup order and cache discipline as
/// [`ParameterNameDirectory`](super::ParameterNameDirectory). Systems unknown
/// to the store resolve to a negative sentinel that matches no row.
pub struct CodeSystemDirectory {
    store: Arc<dyn CodeSystemStore>,
    cache: IdCache,
    unknown_id: i64,
}

impl CodeSystemDirectory {
    /// Creates a directory with default settings.
    pub fn new(store: Arc<dyn CodeSystemStore>) -> Self {
        Self::with_config(store, &SearchSqlConfig::default())
    }

    /// Creates a directory using the sentinel id and reconcile mode of `config`.
    pub fn with_config(store: Arc<dyn CodeSystemStore>, config: &SearchSqlConfig) -> Self {
        Self {
            store,
            cache: IdCache::new(config.reconcile_mode),
            unknown_id: config.unknown_code_system_id,
        }
    }

    /// The id substituted for unknown systems.
    pub fn unknown_id(&self) -> i64 {
        self.unknown_id
    }

    /// Returns the cached id of a system without touching the store.
    pub fn cached_id(&self, system: &str) -> Option<i64> {
        self.cache.get(system)
    }

    /// Number of cached systems.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of staged candidates awaiting reconciliation.
    pub fn pending_candidates(&self) -> usize {
        self.cache.pending()
    }

    /// Resolves a system for use in a read query. Never writes to the store.
    pub async fn resolve(&self, system: &str) -> StorageResult<i64> {
        if let Some(id) = self.cache.lookup(system) {
            return Ok(id);
        }

        match self.store.read_code_system_id(system).await? {
            Some(id) => {
                self.cache.stage(system, id);
                Ok(id)
            }
            None => {
                debug!(system, id = self.unknown_id, "unknown code system");
                Ok(self.unknown_id)
            }
        }
    }

    /// Resolves a system, creating it in the store if absent.
    pub async fn resolve_or_create(&self, system: &str) -> StorageResult<i64> {
        if let Some(id) = self.cached_id(system) {
            return Ok(id);
        }
        let id = self.store.read_or_add_code_system(system).await?;
        self.cache.stage(system, id);
        Ok(id)
    }

    /// Drops all staged candidates without publishing them.
    pub fn clear_candidates(&self) {
        self.cache.clear_candidates();
    }

    /// Publishes staged candidates into the cache.
    pub fn reconcile(&self) -> usize {
        let merged = self.cache.reconcile();
        if merged > 0 {
            debug!(merged, "reconciled code system candidates");
        }
        merged
    }

    /// Loads every stored system into the cache.
    pub async fn prefill(&self) -> StorageResult<usize> {
        let all = self.store.read_all_code_systems().await?;
        let loaded = all.len();
        self.cache.publish(all);
        info!("Loaded {} code systems into directory cache", loaded);
        Ok(loaded)
    }
}

impl Reconcile for CodeSystemDirectory {
    fn reconcile(&self) -> usize {
        CodeSystemDirectory::reconcile(self)
    }
}

impl fmt::Debug for CodeSystemDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeSystemDirectory")
            .field("cached", &self.len())
            .field("pending_candidates", &self.pending_candidates())
            .field("unknown_id", &self.unknown_id)
            .finish_non_exhaustive()
    }
}
