//! In-memory collaborators for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::SearchSqlConfig;
use crate::error::StorageResult;
use crate::names::{
    CodeSystemDirectory, InMemoryCodeSystemStore, InMemoryParameterNameStore, ParameterNameDirectory,
};
use crate::types::{ResourceRow, SqlQuery};

use super::{QueryContext, QueryExecutor};

/// Records every statement and answers string lookups from a fixed list.
#[derive(Debug, Default)]
pub(crate) struct RecordingExecutor {
    pub(crate) strings: Vec<String>,
    pub(crate) executed: Mutex<Vec<SqlQuery>>,
}

impl RecordingExecutor {
    pub(crate) fn with_strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            strings: strings.into_iter().map(Into::into).collect(),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn executed(&self) -> Vec<SqlQuery> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    fn backend_name(&self) -> &'static str {
        "recording"
    }

    async fn search_rows(&self, query: &SqlQuery) -> StorageResult<Vec<ResourceRow>> {
        self.executed.lock().push(query.clone());
        Ok(Vec::new())
    }

    async fn search_resource_ids(&self, query: &SqlQuery) -> StorageResult<Vec<i64>> {
        self.executed.lock().push(query.clone());
        Ok(Vec::new())
    }

    async fn search_string_values(&self, query: &SqlQuery) -> StorageResult<Vec<String>> {
        self.executed.lock().push(query.clone());
        Ok(self.strings.clone())
    }

    async fn count(&self, query: &SqlQuery) -> StorageResult<u64> {
        self.executed.lock().push(query.clone());
        Ok(0)
    }
}

/// Names known to the test store, ids assigned from 1 in this order.
pub(crate) const TEST_NAMES: [&str; 6] = [
    "name",
    "birthdate",
    "organization",
    "subject",
    "code",
    "value-quantity",
];

/// Code systems known to the test store, ids assigned from 1 in this order.
pub(crate) const TEST_CODE_SYSTEMS: [&str; 2] = ["http://loinc.org", "http://snomed.info/sct"];

pub(crate) fn test_context(executor: Arc<RecordingExecutor>) -> QueryContext {
    let store = Arc::new(InMemoryParameterNameStore::with_names(TEST_NAMES));
    let config = SearchSqlConfig::default().with_resource_types([
        "Patient",
        "Organization",
        "Observation",
    ]);
    let names = Arc::new(ParameterNameDirectory::with_config(store, &config));
    let code_systems = Arc::new(CodeSystemDirectory::with_config(
        Arc::new(InMemoryCodeSystemStore::with_systems(TEST_CODE_SYSTEMS)),
        &config,
    ));
    QueryContext::new(config, names, code_systems, executor).unwrap()
}
