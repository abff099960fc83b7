//! Durable storage for parameter-name and code-system ids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StorageResult;

/// Durable mapping from search-parameter names to ids.
///
/// Implementations perform database I/O only; caching lives in
/// [`ParameterNameDirectory`](super::ParameterNameDirectory).
#[async_trait]
pub trait ParameterNameStore: Send + Sync {
    /// Reads the id of a name, or `None` if the name was never stored.
    async fn read_parameter_name_id(&self, name: &str) -> StorageResult<Option<i64>>;

    /// Reads the id of a name, creating it if absent.
    async fn read_or_add_parameter_name(&self, name: &str) -> StorageResult<i64>;

    /// Reads every stored (name, id) pair.
    async fn read_all_parameter_names(&self) -> StorageResult<HashMap<String, i64>>;
}

/// Durable mapping from code-system URIs to the ids in CODE_SYSTEM_ID columns.
///
/// Cached by [`CodeSystemDirectory`](super::CodeSystemDirectory).
#[async_trait]
pub trait CodeSystemStore: Send + Sync {
    /// Reads the id of a system, or `None` if it was never stored.
    async fn read_code_system_id(&self, system: &str) -> StorageResult<Option<i64>>;

    /// Reads the id of a system, creating it if absent.
    async fn read_or_add_code_system(&self, system: &str) -> StorageResult<i64>;

    /// Reads every stored (system, id) pair.
    async fn read_all_code_systems(&self) -> StorageResult<HashMap<String, i64>>;
}

/// Ids assigned from 1 in creation order, with a count of single-key reads.
#[derive(Debug, Default)]
struct InMemoryIds {
    ids: Mutex<HashMap<String, i64>>,
    reads: AtomicUsize,
}

impl InMemoryIds {
    fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = Self::default();
        for key in keys {
            table.read_or_add(&key.into());
        }
        table
    }

    fn read(&self, key: &str) -> Option<i64> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.ids.lock().get(key).copied()
    }

    fn read_or_add(&self, key: &str) -> i64 {
        let mut ids = self.ids.lock();
        let next = ids.len() as i64 + 1;
        *ids.entry(key.to_string()).or_insert(next)
    }

    fn read_all(&self) -> HashMap<String, i64> {
        self.ids.lock().clone()
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

/// A [`ParameterNameStore`] held in process memory.
///
/// Ids are assigned from 1 in creation order. Counts store reads so callers
/// can observe cache effectiveness.
#[derive(Debug, Default)]
pub struct InMemoryParameterNameStore {
    names: InMemoryIds,
}

impl InMemoryParameterNameStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given names, ids assigned in order.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: InMemoryIds::with_keys(names),
        }
    }

    /// Number of single-name reads served so far.
    pub fn reads(&self) -> usize {
        self.names.reads()
    }
}

#[async_trait]
impl ParameterNameStore for InMemoryParameterNameStore {
    async fn read_parameter_name_id(&self, name: &str) -> StorageResult<Option<i64>> {
        Ok(self.names.read(name))
    }

    async fn read_or_add_parameter_name(&self, name: &str) -> StorageResult<i64> {
        Ok(self.names.read_or_add(name))
    }

    async fn read_all_parameter_names(&self) -> StorageResult<HashMap<String, i64>> {
        Ok(self.names.read_all())
    }
}

/// A [`CodeSystemStore`] held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCodeSystemStore {
    systems: InMemoryIds,
}

impl InMemoryCodeSystemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given systems, ids assigned in order.
    pub fn with_systems<I, S>(systems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            systems: InMemoryIds::with_keys(systems),
        }
    }

    /// Number of single-system reads served so far.
    pub fn reads(&self) -> usize {
        self.systems.reads()
    }
}

#[async_trait]
impl CodeSystemStore for InMemoryCodeSystemStore {
    async fn read_code_system_id(&self, system: &str) -> StorageResult<Option<i64>> {
        Ok(self.systems.read(system))
    }

    async fn read_or_add_code_system(&self, system: &str) -> StorageResult<i64> {
        Ok(self.systems.read_or_add(system))
    }

    async fn read_all_code_systems(&self) -> StorageResult<HashMap<String, i64>> {
        Ok(self.systems.read_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryParameterNameStore::with_names(["name", "birthdate"]);
        assert_eq!(store.read_parameter_name_id("birthdate").await.unwrap(), Some(2));
        assert_eq!(store.read_parameter_name_id("gender").await.unwrap(), None);
        assert_eq!(store.reads(), 2);

        assert_eq!(store.read_or_add_parameter_name("gender").await.unwrap(), 3);
        assert_eq!(store.read_or_add_parameter_name("name").await.unwrap(), 1);
        assert_eq!(store.read_all_parameter_names().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_in_memory_code_system_store() {
        let store = InMemoryCodeSystemStore::with_systems(["http://loinc.org", "http://loinc.org"]);
        assert_eq!(store.read_code_system_id("http://loinc.org").await.unwrap(), Some(1));
        assert_eq!(store.read_code_system_id("http://snomed.info/sct").await.unwrap(), None);

        assert_eq!(store.read_or_add_code_system("http://snomed.info/sct").await.unwrap(), 2);
        assert_eq!(store.read_all_code_systems().await.unwrap().len(), 2);
        assert_eq!(store.reads(), 2);
    }
}
