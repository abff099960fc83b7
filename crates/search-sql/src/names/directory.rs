//! Process-wide cache of parameter-name ids.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::SearchSqlConfig;
use crate::error::StorageResult;

use super::Reconcile;
use super::cache::IdCache;
use super::store::ParameterNameStore;

/// Maps search-parameter names to the ids stored in PARAMETER_NAME_ID columns.
///
/// Lookups go cache, then staged candidates, then the durable store. Names
/// unknown to the store resolve to a negative sentinel id that matches no
/// row, so the generated SQL stays valid and simply selects nothing.
///
/// The cache is copy-on-write: readers clone an `Arc` of the current map
/// and writers publish a new map. Ids found elsewhere are staged with
/// [`add_candidate`](Self::add_candidate) and only become visible after
/// [`reconcile`](Self::reconcile).
pub struct ParameterNameDirectory {
    store: Arc<dyn ParameterNameStore>,
    cache: IdCache,
    unknown_id: i64,
}

impl ParameterNameDirectory {
    /// Creates a directory with default settings.
    pub fn new(store: Arc<dyn ParameterNameStore>) -> Self {
        Self::with_config(store, &SearchSqlConfig::default())
    }

    /// Creates a directory using the sentinel id and reconcile mode of `config`.
    pub fn with_config(store: Arc<dyn ParameterNameStore>, config: &SearchSqlConfig) -> Self {
        Self {
            store,
            cache: IdCache::new(config.reconcile_mode),
            unknown_id: config.unknown_parameter_name_id,
        }
    }

    /// The id substituted for unknown names.
    pub fn unknown_id(&self) -> i64 {
        self.unknown_id
    }

    /// Returns the cached id of a name without touching the store.
    pub fn cached_id(&self, name: &str) -> Option<i64> {
        self.cache.get(name)
    }

    /// Returns the current cache contents.
    pub fn snapshot(&self) -> Arc<HashMap<String, i64>> {
        self.cache.snapshot()
    }

    /// Number of cached names.
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

    /// Resolves a name for use in a read query.
    ///
    /// Never writes to the store. Unknown names yield [`unknown_id`](Self::unknown_id).
    pub async fn resolve(&self, name: &str) -> StorageResult<i64> {
        if let Some(id) = self.cache.lookup(name) {
            return Ok(id);
        }

        match self.store.read_parameter_name_id(name).await? {
            Some(id) => {
                self.cache.stage(name, id);
                Ok(id)
            }
            None => {
                debug!(parameter = name, id = self.unknown_id, "unknown parameter name");
                Ok(self.unknown_id)
            }
        }
    }

    /// Resolves a name, creating it in the store if absent.
    ///
    /// Used by the write path when indexing values under a new name.
    pub async fn resolve_or_create(&self, name: &str) -> StorageResult<i64> {
        if let Some(id) = self.cached_id(name) {
            return Ok(id);
        }
        let id = self.store.read_or_add_parameter_name(name).await?;
        self.cache.stage(name, id);
        Ok(id)
    }

    /// Offers a (name, id) pair discovered elsewhere to the cache.
    ///
    /// The pair is not visible to [`cached_id`](Self::cached_id) until the
    /// next [`reconcile`](Self::reconcile).
    pub fn add_candidate(&self, name: impl Into<String>, id: i64) {
        self.cache.add_candidate(name.into(), id);
    }

    /// Drops all staged candidates without publishing them.
    pub fn clear_candidates(&self) {
        self.cache.clear_candidates();
    }

    /// Publishes staged candidates into the cache.
    ///
    /// Returns the number of candidates merged. A candidate replaces an
    /// existing entry of the same name.
    pub fn reconcile(&self) -> usize {
        let merged = self.cache.reconcile();
        if merged > 0 {
            debug!(merged, "reconciled parameter name candidates");
        }
        merged
    }

    /// Loads every stored name into the cache.
    pub async fn prefill(&self) -> StorageResult<usize> {
        let all = self.store.read_all_parameter_names().await?;
        let loaded = all.len();
        self.cache.publish(all);
        info!("Loaded {} parameter names into directory cache", loaded);
        Ok(loaded)
    }
}

impl Reconcile for ParameterNameDirectory {
    fn reconcile(&self) -> usize {
        ParameterNameDirectory::reconcile(self)
    }
}

impl fmt::Debug for ParameterNameDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterNameDirectory")
            .field("cached", &self.len())
            .field("pending_candidates", &self.pending_candidates())
            .field("unknown_id", &self.unknown_id)
            .field("mode", &self.cache.mode())
            .finish_non_exhaustive()
    }
}
