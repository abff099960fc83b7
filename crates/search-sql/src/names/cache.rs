//! Copy-on-write id cache behind the name directories.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::ReconcileMode;

/// Published `key -> id` map plus the candidates staged for it.
///
/// Readers clone an `Arc` of the current map under a read lock held only for
/// the clone. Writers build a new map and swap it in while holding `publish`,
/// so publications happen one at a time and in the order their entries were
/// taken.
pub(crate) struct IdCache {
    entries: RwLock<Arc<HashMap<String, i64>>>,
    candidates: Mutex<HashMap<String, i64>>,
    publish: Mutex<()>,
    mode: ReconcileMode,
}

impl IdCache {
    pub(crate) fn new(mode: ReconcileMode) -> Self {
        Self {
            entries: RwLock::new(Arc::new(HashMap::new())),
            candidates: Mutex::new(HashMap::new()),
            publish: Mutex::new(()),
            mode,
        }
    }

    pub(crate) fn mode(&self) -> ReconcileMode {
        self.mode
    }

    pub(crate) fn get(&self, key: &str) -> Option<i64> {
        self.snapshot().get(key).copied()
    }

    pub(crate) fn snapshot(&self) -> Arc<HashMap<String, i64>> {
        Arc::clone(&self.entries.read())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn pending(&self) -> usize {
        self.candidates.lock().len()
    }

    /// Looks a key up in the published map, then among staged candidates.
    pub(crate) fn lookup(&self, key: &str) -> Option<i64> {
        self.get(key)
            .or_else(|| self.candidates.lock().get(key).copied())
    }

    pub(crate) fn add_candidate(&self, key: String, id: i64) {
        self.candidates.lock().insert(key, id);
    }

    /// Stages a candidate and, in eager mode, publishes it right away.
    pub(crate) fn stage(&self, key: &str, id: i64) {
        self.add_candidate(key.to_string(), id);
        if self.mode == ReconcileMode::Eager {
            self.reconcile();
        }
    }

    pub(crate) fn clear_candidates(&self) {
        self.candidates.lock().clear();
    }

    /// Publishes staged candidates, returning how many were merged.
    pub(crate) fn reconcile(&self) -> usize {
        // Candidates are taken under the publish lock; otherwise a batch taken
        // earlier could be published after a newer one.
        let _guard = self.publish.lock();
        let staged = std::mem::take(&mut *self.candidates.lock());
        let merged = staged.len();
        if merged > 0 {
            self.merge_locked(staged);
        }
        merged
    }

    /// Publishes `entries` directly, bypassing the candidates.
    pub(crate) fn publish(&self, entries: HashMap<String, i64>) {
        let _guard = self.publish.lock();
        self.merge_locked(entries);
    }

    /// Caller holds `publish`.
    fn merge_locked(&self, entries: HashMap<String, i64>) {
        let mut next = HashMap::clone(&self.snapshot());
        next.extend(entries);
        *self.entries.write() = Arc::new(next);
    }
}
